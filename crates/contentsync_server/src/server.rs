//! HTTP server wiring.

use crate::context::HandlerContext;
use crate::error::{ServerError, ServerResult};
use crate::export::{channel_body, log_outcome, ExportPlan};
use crate::origin::{origin_check, OriginPolicy};
use crate::uploadfs::{uploadfs_handler, uploads_handler};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use contentsync_protocol::{
    ExportParams, CONTENT_PATH, STREAM_CONTENT_TYPE, UPLOADFS_PATH, UPLOADS_PREFIX,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// `GET /content?type&related&query&locale`
///
/// Everything that can fail cleanly is checked before the response starts;
/// later failures truncate the stream without an end marker.
async fn export_handler(
    State(ctx): State<Arc<HandlerContext>>,
    headers: HeaderMap,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> ServerResult<Response> {
    ctx.authorize(&headers)?;
    let Query(params) = params.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let plan = ExportPlan::prepare(&ctx, &params)?;
    info!(
        doc_type = params.doc_type.as_deref().unwrap_or("*"),
        related = params.related,
        locale = params.locale.as_deref(),
        collections = plan.collections().len(),
        "starting export"
    );

    let (mut sink, body) = channel_body(ctx.config.stream_buffer);
    tokio::spawn(async move {
        let result = plan.run(&ctx, &mut sink).await;
        log_outcome(&result);
    });

    Ok((
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        body,
    )
        .into_response())
}

/// Builds the router with the origin check applied to every route not in
/// the context's exempt list.
pub fn router(ctx: Arc<HandlerContext>) -> Router {
    let policy = Arc::new(OriginPolicy::new(
        ctx.config.origin_exempt.clone(),
        ctx.config.allowed_origins.clone(),
    ));
    Router::new()
        .route(CONTENT_PATH, get(export_handler))
        .route(UPLOADFS_PATH, get(uploadfs_handler))
        .route(&format!("{UPLOADS_PREFIX}/{{*path}}"), get(uploads_handler))
        .layer(middleware::from_fn_with_state(policy, origin_check))
        .with_state(ctx)
}

/// The source-side content server.
///
/// # Example
///
/// ```no_run
/// use contentsync_core::{InMemoryDocumentStore, SchemaRegistry};
/// use contentsync_server::{ContentServer, HandlerContext, ServerConfig};
/// use contentsync_storage::InMemoryBinaryStore;
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let context = HandlerContext::new(
///     ServerConfig::default().with_api_key("secret"),
///     Arc::new(InMemoryDocumentStore::new()),
///     Arc::new(InMemoryBinaryStore::new("/uploads")),
///     Arc::new(SchemaRegistry::new()),
/// );
/// let server = ContentServer::new(context);
/// let listener = server.bind().await?;
/// server.serve(listener).await?;
/// # Ok(())
/// # }
/// ```
pub struct ContentServer {
    context: Arc<HandlerContext>,
}

impl ContentServer {
    /// Creates a new content server.
    pub fn new(context: HandlerContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    /// Returns the shared handler context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Returns the router serving this context.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.context))
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address is unavailable.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        Ok(TcpListener::bind(self.context.config.bind_addr).await?)
    }

    /// Serves requests until the process ends.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener fails.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves requests until `signal` resolves.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener fails.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "content server listening");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }
}
