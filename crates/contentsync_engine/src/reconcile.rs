//! Attachment reconciler.
//!
//! Copies every storage variant of the imported attachments from the
//! source into the local binary store, then brings the store's visibility
//! in line with the attachment records.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::PeerTransport;
use contentsync_core::{
    Attachment, Document, DocumentStore, Filter, Variant, ATTACHMENTS_COLLECTION,
};
use contentsync_storage::BinaryStore;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Decides which visibility flags a variant fetch is attempted with.
///
/// The source's recorded visibility can disagree with where the object
/// actually lives. The default policy retries once with the flag inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityRetryPolicy {
    inversions: u32,
}

impl VisibilityRetryPolicy {
    /// One retry with the inverted flag.
    pub fn single_inversion() -> Self {
        Self { inversions: 1 }
    }

    /// No retries.
    pub fn none() -> Self {
        Self { inversions: 0 }
    }

    /// Flags to try, in order, for an object expected in state `disabled`.
    pub fn attempts(&self, disabled: bool) -> Vec<bool> {
        let mut attempts = vec![disabled];
        let mut flag = disabled;
        for _ in 0..self.inversions {
            flag = !flag;
            attempts.push(flag);
        }
        attempts
    }
}

impl Default for VisibilityRetryPolicy {
    fn default() -> Self {
        Self::single_inversion()
    }
}

/// Counters of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Attachments processed.
    pub attachments: u64,
    /// Variants copied into the sink.
    pub variants_copied: u64,
    /// Variants that failed every attempt.
    pub variants_failed: u64,
    /// Attachment records that could not be read.
    pub skipped: u64,
}

impl ReconcileReport {
    fn absorb(&mut self, other: ReconcileReport) {
        self.attachments += other.attachments;
        self.variants_copied += other.variants_copied;
        self.variants_failed += other.variants_failed;
        self.skipped += other.skipped;
    }
}

/// Copies attachment binaries from a peer into the local binary store.
pub struct Reconciler<'a> {
    transport: &'a dyn PeerTransport,
    store: &'a dyn DocumentStore,
    binaries: Arc<dyn BinaryStore>,
    config: &'a SyncConfig,
    policy: VisibilityRetryPolicy,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler with the default retry policy.
    pub fn new(
        transport: &'a dyn PeerTransport,
        store: &'a dyn DocumentStore,
        binaries: Arc<dyn BinaryStore>,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            transport,
            store,
            binaries,
            config,
            policy: VisibilityRetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: VisibilityRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reconciles every attachment in `scope`, or all of them when `None`.
    ///
    /// Transfer failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the document store cannot be scanned.
    pub async fn reconcile(&self, scope: Option<&BTreeSet<String>>) -> SyncResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let filter = match scope {
            Some(ids) if ids.is_empty() => return Ok(report),
            Some(ids) => Filter::all().with_ids(ids.iter().cloned()),
            None => Filter::all(),
        };

        let page_size = self.config.content.page_size.max(1);
        let mut after: Option<String> = None;
        loop {
            let page =
                self.store
                    .find_page(ATTACHMENTS_COLLECTION, &filter, after.as_deref(), page_size)?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id().to_string());

            for batch in page.chunks(self.config.reconcile_concurrency.max(1)) {
                let outcomes = join_all(batch.iter().map(|doc| self.reconcile_attachment(doc))).await;
                for outcome in outcomes {
                    report.absorb(outcome);
                }
            }
        }

        info!(
            attachments = report.attachments,
            copied = report.variants_copied,
            failed = report.variants_failed,
            "Attachments reconciled"
        );
        Ok(report)
    }

    async fn reconcile_attachment(&self, doc: &Document) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let attachment = match Attachment::from_document(doc) {
            Ok(attachment) => attachment,
            Err(e) => {
                warn!(id = doc.id(), error = %e, "Skipping unreadable attachment");
                report.skipped = 1;
                return report;
            }
        };
        report.attachments = 1;

        for variant in attachment.variants(&self.config.content.image_sizes) {
            match self.transfer_variant(&variant).await {
                Ok(()) => report.variants_copied += 1,
                Err(e) => {
                    warn!(id = %attachment.id, error = %e, "Variant transfer failed");
                    report.variants_failed += 1;
                }
            }
        }
        report
    }

    async fn transfer_variant(&self, variant: &Variant) -> SyncResult<()> {
        let mut last_error = String::new();
        for (attempt, disabled) in self.policy.attempts(variant.disabled).into_iter().enumerate() {
            match self.transfer_once(variant, disabled).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(path = %variant.path, disabled, attempt, error = %e, "Fetch attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(SyncError::AttachmentTransfer {
            path: variant.path.clone(),
            message: last_error,
        })
    }

    /// Fetches the variant with the given source flag and installs it in
    /// the sink with the visibility the record expects.
    async fn transfer_once(&self, variant: &Variant, source_disabled: bool) -> SyncResult<()> {
        let temp = NamedTempFile::new()?;
        self.transport
            .fetch_binary(&variant.path, source_disabled, temp.path())
            .await?;

        let binaries = Arc::clone(&self.binaries);
        let path = variant.path.clone();
        let disable = variant.disabled;
        tokio::task::spawn_blocking(move || -> SyncResult<()> {
            if let Err(e) = binaries.remove(&path) {
                if !e.is_not_found() {
                    debug!(path = %path, error = %e, "Could not remove existing object");
                }
            }
            binaries.copy_in(temp.path(), &path)?;
            if disable {
                binaries.disable(&path)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
    }
}

/// Recomputes every attachment's trash flag from its ownership sets and
/// enables or disables each stored variant to match.
///
/// Returns the number of records and objects changed.
///
/// # Errors
///
/// Returns an error if the document store cannot be read or written, or if
/// a visibility change fails on an existing object.
pub fn fix_permissions(
    store: &dyn DocumentStore,
    binaries: &dyn BinaryStore,
    config: &SyncConfig,
) -> SyncResult<u64> {
    let sizes = &config.content.image_sizes;
    let mut fixes = 0;
    let mut after: Option<String> = None;
    loop {
        let page = store.find_page(
            ATTACHMENTS_COLLECTION,
            &Filter::all(),
            after.as_deref(),
            config.content.page_size.max(1),
        )?;
        let Some(last) = page.last() else {
            break;
        };
        after = Some(last.id().to_string());

        for doc in page {
            let Ok(mut attachment) = Attachment::from_document(&doc) else {
                continue;
            };
            let trash = attachment.should_be_trash();
            if trash != attachment.trash {
                store.replace(ATTACHMENTS_COLLECTION, doc.with("trash", trash))?;
                attachment.trash = trash;
                fixes += 1;
            }

            for variant in attachment.variants(sizes) {
                match binaries.is_disabled(&variant.path) {
                    Ok(disabled) if disabled == variant.disabled => {}
                    Ok(_) => {
                        if variant.disabled {
                            binaries.disable(&variant.path)?;
                        } else {
                            binaries.enable(&variant.path)?;
                        }
                        fixes += 1;
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(path = %variant.path, "Variant missing from store");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    info!(fixes, "Permissions fixed");
    Ok(fixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use contentsync_core::InMemoryDocumentStore;
    use contentsync_storage::InMemoryBinaryStore;
    use serde_json::json;

    fn attachment(id: &str, doc_ids: &[&str], trash_doc_ids: &[&str], trash: bool) -> Document {
        Document::from_value(json!({
            "_id": id,
            "type": "attachment",
            "name": "report",
            "extension": "pdf",
            "group": "office",
            "docIds": doc_ids,
            "trashDocIds": trash_doc_ids,
            "trash": trash,
        }))
        .unwrap()
    }

    fn path(id: &str) -> String {
        format!("/attachments/{id}-report.pdf")
    }

    #[test]
    fn policy_attempts() {
        assert_eq!(VisibilityRetryPolicy::default().attempts(false), vec![false, true]);
        assert_eq!(VisibilityRetryPolicy::single_inversion().attempts(true), vec![true, false]);
        assert_eq!(VisibilityRetryPolicy::none().attempts(true), vec![true]);
    }

    #[tokio::test]
    async fn copies_original_into_sink() {
        let store = InMemoryDocumentStore::new();
        store.seed(ATTACHMENTS_COLLECTION, [attachment("a1", &["d1"], &[], false)]).unwrap();
        let binaries = Arc::new(InMemoryBinaryStore::new(""));
        binaries.put(&path("a1"), b"stale".to_vec()).unwrap();
        let transport = MockTransport::new();
        transport.add_binary(path("a1"), b"fresh".to_vec(), false);
        let config = SyncConfig::default();

        let report = Reconciler::new(&transport, &store, binaries.clone(), &config)
            .reconcile(None)
            .await
            .unwrap();

        assert_eq!(report.attachments, 1);
        assert_eq!(report.variants_copied, 1);
        assert_eq!(binaries.get(&path("a1")), Some(b"fresh".to_vec()));
        assert!(!binaries.is_disabled(&path("a1")).unwrap());
    }

    #[tokio::test]
    async fn repairs_visibility_with_one_inverted_retry() {
        let store = InMemoryDocumentStore::new();
        store.seed(ATTACHMENTS_COLLECTION, [attachment("a1", &[], &["d1"], true)]).unwrap();
        let binaries = Arc::new(InMemoryBinaryStore::new(""));
        let transport = MockTransport::new();
        transport.add_binary(path("a1"), b"data".to_vec(), false);
        let config = SyncConfig::default();

        let report = Reconciler::new(&transport, &store, binaries.clone(), &config)
            .reconcile(None)
            .await
            .unwrap();

        assert_eq!(report.variants_copied, 1);
        assert_eq!(
            transport.fetches(),
            vec![(path("a1"), true), (path("a1"), false)]
        );
        assert!(binaries.is_disabled(&path("a1")).unwrap());
    }

    #[tokio::test]
    async fn failed_transfers_are_counted_not_fatal() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                ATTACHMENTS_COLLECTION,
                [attachment("a1", &["d1"], &[], false), attachment("a2", &["d1"], &[], false)],
            )
            .unwrap();
        let binaries = Arc::new(InMemoryBinaryStore::new(""));
        let transport = MockTransport::new();
        transport.add_binary(path("a2"), b"two".to_vec(), false);
        let config = SyncConfig::default();

        let report = Reconciler::new(&transport, &store, binaries.clone(), &config)
            .with_policy(VisibilityRetryPolicy::none())
            .reconcile(None)
            .await
            .unwrap();

        assert_eq!(report.variants_failed, 1);
        assert_eq!(report.variants_copied, 1);
        assert_eq!(transport.fetches().len(), 2);
        assert_eq!(binaries.paths(), vec![path("a2")]);
    }

    #[tokio::test]
    async fn scope_restricts_attachments() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                ATTACHMENTS_COLLECTION,
                [attachment("a1", &["d1"], &[], false), attachment("a2", &["d1"], &[], false)],
            )
            .unwrap();
        let binaries = Arc::new(InMemoryBinaryStore::new(""));
        let transport = MockTransport::new();
        transport.add_binary(path("a1"), b"one".to_vec(), false);
        transport.add_binary(path("a2"), b"two".to_vec(), false);
        let config = SyncConfig::default();
        let reconciler = Reconciler::new(&transport, &store, binaries.clone(), &config);

        let empty = reconciler.reconcile(Some(&BTreeSet::new())).await.unwrap();
        assert_eq!(empty, ReconcileReport::default());

        let scope: BTreeSet<String> = ["a2".to_string()].into();
        let report = reconciler.reconcile(Some(&scope)).await.unwrap();
        assert_eq!(report.attachments, 1);
        assert_eq!(binaries.paths(), vec![path("a2")]);
    }

    #[test]
    fn fix_permissions_recomputes_trash() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                ATTACHMENTS_COLLECTION,
                [
                    attachment("a1", &[], &["d1"], false),
                    attachment("a2", &["d2"], &[], true),
                    attachment("a3", &["d3"], &[], false),
                ],
            )
            .unwrap();
        let binaries = InMemoryBinaryStore::new("");
        binaries.put(&path("a1"), b"1".to_vec()).unwrap();
        binaries.put(&path("a2"), b"2".to_vec()).unwrap();
        binaries.disable(&path("a2")).unwrap();
        binaries.put(&path("a3"), b"3".to_vec()).unwrap();

        let fixes = fix_permissions(&store, &binaries, &SyncConfig::default()).unwrap();

        // Two record flips plus two object toggles.
        assert_eq!(fixes, 4);
        assert!(binaries.is_disabled(&path("a1")).unwrap());
        assert!(!binaries.is_disabled(&path("a2")).unwrap());
        assert!(!binaries.is_disabled(&path("a3")).unwrap());
        let a1 = store.get(ATTACHMENTS_COLLECTION, "a1").unwrap().unwrap();
        assert_eq!(a1.get("trash"), Some(&json!(true)));
    }
}
