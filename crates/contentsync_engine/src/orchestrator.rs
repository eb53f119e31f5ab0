//! Sync orchestrator.
//!
//! Validates run options, resolves the peer and sequences the three
//! phases of a pull: import, attachment reconciliation and the
//! store-wide permission fix.

use crate::config::{Environment, Peer, RunOptions, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::http::HttpTransport;
use crate::import::{ImportOptions, Importer};
use crate::reconcile::{fix_permissions, Reconciler, VisibilityRetryPolicy};
use crate::transport::PeerTransport;
use contentsync_core::DocumentStore;
use contentsync_protocol::ExportParams;
use contentsync_storage::BinaryStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Phase a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Streaming records into the sink.
    Importing,
    /// Copying attachment binaries.
    Reconciling,
    /// Recomputing attachment visibility.
    FixingPermissions,
    /// Run finished.
    Complete,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Importing => write!(f, "importing"),
            SyncPhase::Reconciling => write!(f, "reconciling"),
            SyncPhase::FixingPermissions => write!(f, "fixing permissions"),
            SyncPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records committed into the sink.
    pub imported: u64,
    /// Records removed by the purge.
    pub purged: u64,
    /// Paired-locale counterparts written.
    pub paired: u64,
    /// Records whose unique field was mutated.
    pub renamed: u64,
    /// Attachments reconciled.
    pub attachments: u64,
    /// Binary variants copied.
    pub variants_copied: u64,
    /// Binary variants that could not be copied.
    pub variants_failed: u64,
    /// Attachment records and objects whose visibility was corrected.
    pub permission_fixes: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "imported {} records ({} purged, {} paired, {} renamed); \
             {} attachments, {} variants copied, {} failed; {} permission fixes in {:.1}s",
            self.imported,
            self.purged,
            self.paired,
            self.renamed,
            self.attachments,
            self.variants_copied,
            self.variants_failed,
            self.permission_fixes,
            self.duration.as_secs_f64()
        )
    }
}

/// A validated sync run.
#[derive(Debug, Clone)]
pub struct SyncRun {
    peer: Peer,
    params: ExportParams,
    import: ImportOptions,
}

impl SyncRun {
    /// Validates `options` and resolves the peer against `environments`.
    ///
    /// Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if not exactly one of
    /// `from`/`to` is given, if `to` is given, if `related`, `keep` or
    /// `query` are used without a type, if a URL peer has no API key, or
    /// if a named peer is unknown.
    pub fn validate(
        options: &RunOptions,
        environments: &HashMap<String, Environment>,
    ) -> SyncResult<Self> {
        let from = match (&options.from, &options.to) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(SyncError::configuration(
                    "exactly one of --from or --to is required",
                ))
            }
            (None, Some(_)) => {
                return Err(SyncError::configuration("pushing content is not supported"))
            }
            (Some(from), None) => from,
        };

        if !options.is_type_scoped() {
            let scoped_only = [
                ("--related", options.related),
                ("--keep", options.keep),
                ("--query", options.query.is_some()),
            ];
            if let Some((flag, _)) = scoped_only.iter().find(|(_, set)| *set) {
                return Err(SyncError::configuration(format!("{flag} requires --type")));
            }
        }

        let peer = if from.starts_with("http://") || from.starts_with("https://") {
            let api_key = options.api_key.as_deref().ok_or_else(|| {
                SyncError::configuration("--api-key is required when --from is a URL")
            })?;
            Peer::new(from.clone(), api_key)
        } else {
            let env = environments.get(from).ok_or_else(|| {
                SyncError::configuration(format!("unknown environment: {from}"))
            })?;
            let api_key = options.api_key.clone().unwrap_or_else(|| env.api_key.clone());
            Peer::new(env.url.clone(), api_key)
        };

        Ok(Self {
            peer,
            params: ExportParams {
                doc_type: options.doc_type.clone(),
                related: options.related,
                query: options.query.clone(),
                locale: options.locale.clone(),
            },
            import: ImportOptions {
                doc_type: options.doc_type.clone(),
                keep: options.keep,
                locale: options.locale.clone(),
            },
        })
    }

    /// Returns the resolved peer.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Returns the export request this run sends.
    pub fn export_params(&self) -> &ExportParams {
        &self.params
    }
}

/// Runs pulls into a sink's document and binary stores.
pub struct Orchestrator {
    config: SyncConfig,
    store: Arc<dyn DocumentStore>,
    binaries: Arc<dyn BinaryStore>,
    policy: VisibilityRetryPolicy,
}

impl Orchestrator {
    /// Creates an orchestrator for the given sink.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn DocumentStore>,
        binaries: Arc<dyn BinaryStore>,
    ) -> Self {
        Self {
            config,
            store,
            binaries,
            policy: VisibilityRetryPolicy::default(),
        }
    }

    /// Replaces the attachment retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: VisibilityRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs `run` against its peer over HTTP.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error; see [`SyncError`].
    pub async fn run(&self, run: &SyncRun) -> SyncResult<SyncReport> {
        let transport = HttpTransport::new(run.peer(), &self.config)?;
        self.run_with(run, &transport).await
    }

    /// Runs `run` over the given transport.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error. Attachment transfer failures
    /// are counted in the report instead.
    pub async fn run_with(
        &self,
        run: &SyncRun,
        transport: &dyn PeerTransport,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        info!(peer = %run.peer.base_url, params = ?run.params, "Sync started");

        let mut phase = SyncPhase::Importing;
        let result = self.run_phases(run, transport, &mut phase).await;
        match result {
            Ok(mut report) => {
                report.duration = started.elapsed();
                info!(%report, "Sync complete");
                Ok(report)
            }
            Err(e) => {
                warn!(%phase, error = %e, "Sync failed");
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        run: &SyncRun,
        transport: &dyn PeerTransport,
        phase: &mut SyncPhase,
    ) -> SyncResult<SyncReport> {
        let stream = transport.open_export(&run.params).await?;
        let imported = Importer::new(self.store.as_ref(), &self.config, run.import.clone())
            .import(stream)
            .await?;

        *phase = SyncPhase::Reconciling;
        let reconciled = Reconciler::new(
            transport,
            self.store.as_ref(),
            Arc::clone(&self.binaries),
            &self.config,
        )
        .with_policy(self.policy)
        .reconcile(imported.attachment_scope.as_ref())
        .await?;

        *phase = SyncPhase::FixingPermissions;
        let store = Arc::clone(&self.store);
        let binaries = Arc::clone(&self.binaries);
        let config = self.config.clone();
        let permission_fixes = tokio::task::spawn_blocking(move || {
            fix_permissions(store.as_ref(), binaries.as_ref(), &config)
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;

        *phase = SyncPhase::Complete;
        Ok(SyncReport {
            imported: imported.records,
            purged: imported.purged,
            paired: imported.paired,
            renamed: imported.renamed,
            attachments: reconciled.attachments,
            variants_copied: reconciled.variants_copied,
            variants_failed: reconciled.variants_failed,
            permission_fixes,
            duration: Duration::ZERO,
        })
    }
}
