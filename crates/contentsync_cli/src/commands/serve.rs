//! Serve command implementation.

use crate::settings::Settings;
use contentsync_core::DocumentStore;
use contentsync_server::{ContentServer, HandlerContext};
use contentsync_storage::BinaryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Serves the local stores to sinks until interrupted.
pub fn run(settings: &Settings, bind: Option<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.server_config(bind);
    if config.api_key.is_none() {
        warn!("No api_key configured; every request will be refused");
    }

    let store: Arc<dyn DocumentStore> = Arc::new(settings.store.open_documents()?);
    let binaries: Arc<dyn BinaryStore> = Arc::new(settings.store.open_binaries()?);
    let context = HandlerContext::new(config, store, binaries, Arc::new(settings.schemas.clone()));
    let server = ContentServer::new(context);

    super::runtime()?.block_on(async move {
        let listener = server.bind().await?;
        server
            .serve_with_shutdown(listener, async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down");
                }
            })
            .await
    })?;
    Ok(())
}
