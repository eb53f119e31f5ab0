//! Sync command implementation.

use crate::settings::Settings;
use contentsync_core::DocumentStore;
use contentsync_engine::{Orchestrator, RunOptions, SyncRun};
use contentsync_storage::BinaryStore;
use std::sync::Arc;
use tracing::error;

/// Runs one pull into the local stores and prints its report.
pub fn run(settings: &Settings, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Validation performs no I/O; nothing is opened for a bad invocation.
    let run = SyncRun::validate(&options, &settings.environments)?;

    let documents = Arc::new(settings.store.open_documents()?);
    let binaries = Arc::new(settings.store.open_binaries()?);
    let store: Arc<dyn DocumentStore> = documents.clone();
    let files: Arc<dyn BinaryStore> = binaries;
    let orchestrator = Orchestrator::new(settings.sync_config(), store, files);

    let result = super::runtime()?.block_on(orchestrator.run(&run));

    // Records committed before a failure stay committed.
    if let Err(e) = documents.flush() {
        error!(error = %e, "Failed to persist documents");
        return Err(e.into());
    }

    let report = result?;
    println!("{report}");
    Ok(())
}
