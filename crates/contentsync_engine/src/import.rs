//! Import stream consumer.
//!
//! Decodes the export stream incrementally and commits each record into
//! the sink store as soon as it arrives. The sink is purged only after
//! the stream's marker has been validated, so a peer speaking the wrong
//! protocol never causes data loss.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::ByteStream;
use contentsync_codec::FrameDecoder;
use contentsync_core::{
    merge_ownership, paired_locale, CoreError, Document, DocumentStore, Filter,
    ATTACHMENTS_COLLECTION, DOCS_COLLECTION, WORKFLOW_GUID_FIELD, WORKFLOW_LOCALE_FIELD,
};
use contentsync_protocol::{EnvelopeReader, StreamEvent};
use futures::StreamExt;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// The subset of run options the importer acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Type the run is scoped to.
    pub doc_type: Option<String>,
    /// Upsert instead of purge-and-insert.
    pub keep: bool,
    /// Locale whose paired counterpart is maintained.
    pub locale: Option<String>,
}

/// Outcome of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records committed.
    pub records: u64,
    /// Records removed by the purge.
    pub purged: u64,
    /// Paired-locale counterparts written.
    pub paired: u64,
    /// Records whose unique field had to be mutated.
    pub renamed: u64,
    /// Attachments to reconcile; `None` means all of them.
    pub attachment_scope: Option<BTreeSet<String>>,
}

/// Commits an export stream into a document store.
pub struct Importer<'a> {
    store: &'a dyn DocumentStore,
    config: &'a SyncConfig,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    /// Creates an importer writing into `store`.
    pub fn new(store: &'a dyn DocumentStore, config: &'a SyncConfig, options: ImportOptions) -> Self {
        Self {
            store,
            config,
            options,
        }
    }

    /// Consumes `stream` to its end marker.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Protocol`] if the stream is malformed; nothing is
    ///   purged when the marker itself is wrong.
    /// - [`SyncError::IncompleteStream`] if the stream stops before its end
    ///   marker. Records committed up to that point stay committed.
    /// - [`SyncError::UniqueConflict`] if a record cannot be made unique.
    pub async fn import(&self, mut stream: ByteStream) -> SyncResult<ImportReport> {
        let mut reader =
            EnvelopeReader::with_decoder(FrameDecoder::with_max_frame_len(self.config.max_frame_len));
        let mut report = ImportReport {
            attachment_scope: self.options.doc_type.as_ref().map(|_| BTreeSet::new()),
            ..ImportReport::default()
        };

        let mut started = false;
        loop {
            while let Some(event) = reader.next_event()? {
                match event {
                    StreamEvent::Started { version } => {
                        debug!(version, "Stream marker accepted");
                        started = true;
                        report.purged = self.purge()?;
                    }
                    StreamEvent::Record { collection, doc } => {
                        self.commit(&collection, doc, &mut report)?;
                    }
                }
            }

            match stream.next().await {
                Some(Ok(chunk)) => reader.extend(&chunk)?,
                Some(Err(e)) if reader.is_finished() => {
                    debug!(error = %e, "Transport error after end marker");
                    break;
                }
                Some(Err(e)) if started => {
                    warn!(error = %e, records = report.records, "Stream interrupted");
                    return Err(SyncError::IncompleteStream {
                        records: report.records,
                    });
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        reader.finish()?;
        info!(
            records = report.records,
            purged = report.purged,
            paired = report.paired,
            "Import complete"
        );
        Ok(report)
    }

    /// Clears the sink before the first record lands.
    fn purge(&self) -> SyncResult<u64> {
        let protected = &self.config.content.protected_types;
        if self.options.keep {
            return Ok(0);
        }
        let purged = match &self.options.doc_type {
            Some(doc_type) => {
                let filter = Filter::all()
                    .with_type(doc_type.clone())
                    .excluding_types(protected.iter().cloned());
                self.store.delete_many(DOCS_COLLECTION, &filter)?
            }
            None => {
                let filter = Filter::all().excluding_types(protected.iter().cloned());
                let mut purged = 0;
                for collection in self.store.collections()? {
                    if !self.config.content.is_replicated_collection(&collection) {
                        continue;
                    }
                    let removed = self.store.delete_many(&collection, &filter)?;
                    debug!(collection = %collection, removed, "Purged collection");
                    purged += removed;
                }
                purged
            }
        };
        info!(purged, "Sink purged");
        Ok(purged as u64)
    }

    fn commit(&self, collection: &str, doc: Document, report: &mut ImportReport) -> SyncResult<()> {
        let content = &self.config.content;
        if !content.is_replicated_collection(collection)
            || doc.doc_type().is_some_and(|t| content.is_protected_type(t))
        {
            warn!(collection, id = doc.id(), "Skipping protected record");
            return Ok(());
        }

        if collection == ATTACHMENTS_COLLECTION {
            if let Some(scope) = report.attachment_scope.as_mut() {
                let merged = match self.store.get(collection, doc.id())? {
                    Some(existing) => merge_ownership(&existing, &doc),
                    None => doc,
                };
                scope.insert(merged.id().to_string());
                self.store.replace(collection, merged)?;
                report.records += 1;
                return Ok(());
            }
        }

        let pairing = collection == DOCS_COLLECTION && self.options.locale.is_some();
        let paired_source = pairing.then(|| doc.clone());
        let upsert = self.options.keep || self.is_related(collection, &doc);
        if self.write(collection, doc, upsert)? {
            report.renamed += 1;
        }
        report.records += 1;

        if let Some(doc) = paired_source {
            if self.pair_locale(&doc)? {
                report.paired += 1;
            }
        }
        Ok(())
    }

    /// True for documents a type-scoped run pulled in through joins. The
    /// purge leaves their type alone, so they may already be present.
    fn is_related(&self, collection: &str, doc: &Document) -> bool {
        collection == DOCS_COLLECTION
            && self
                .options
                .doc_type
                .as_deref()
                .is_some_and(|scoped| doc.doc_type() != Some(scoped))
    }

    /// Writes the paired-locale counterpart of a freshly imported record.
    fn pair_locale(&self, doc: &Document) -> SyncResult<bool> {
        let (Some(locale), Some(guid)) = (doc.workflow_locale(), doc.workflow_guid()) else {
            return Ok(false);
        };
        let paired = paired_locale(locale);
        let filter = Filter::all()
            .with_field(WORKFLOW_GUID_FIELD, guid)
            .with_field(WORKFLOW_LOCALE_FIELD, paired.clone());

        let mut copy = doc.clone();
        copy.set(WORKFLOW_LOCALE_FIELD, paired);
        match self.store.find_one(DOCS_COLLECTION, &filter)? {
            Some(existing) => {
                copy.set_id(existing.id());
                self.write(DOCS_COLLECTION, copy, true)?;
            }
            None => {
                copy.set_id(uuid::Uuid::new_v4().to_string());
                self.write(DOCS_COLLECTION, copy, false)?;
            }
        }
        Ok(true)
    }

    /// Inserts or upserts a record, appending a random digit to the
    /// colliding field on unique conflicts. Returns true if the record was
    /// mutated to fit.
    fn write(&self, collection: &str, mut doc: Document, upsert: bool) -> SyncResult<bool> {
        let attempts = self.config.unique_retries;
        let mut renamed = false;
        let mut last_field = String::new();

        for attempt in 1..=attempts {
            let result = if upsert {
                self.store.replace(collection, doc.clone()).map(|_| ())
            } else {
                self.store.insert(collection, doc.clone())
            };
            match result {
                Ok(()) => return Ok(renamed),
                Err(CoreError::UniqueConflict { field, value, .. }) => {
                    let digit = rand::thread_rng().gen_range(0..10);
                    debug!(collection, id = doc.id(), field = %field, attempt, "Unique conflict, mutating");
                    doc.set(field.clone(), format!("{value}{digit}"));
                    last_field = field;
                    renamed = true;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(collection, payload = %doc.clone().into_value(), "Giving up on unique conflict");
        Err(SyncError::UniqueConflict {
            collection: collection.to_string(),
            field: last_field,
            id: doc.id().to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contentsync_core::{InMemoryDocumentStore, SLUG_FIELD};
    use contentsync_protocol::Envelope;
    use futures::stream;

    fn article(id: &str, slug: &str) -> Document {
        Document::new(id, "article").with(SLUG_FIELD, slug)
    }

    fn body(envelopes: &[Envelope]) -> ByteStream {
        let chunks: Vec<SyncResult<Bytes>> =
            envelopes.iter().map(|e| Ok(e.to_frame().unwrap())).collect();
        stream::iter(chunks).boxed()
    }

    fn records(docs: &[Document]) -> Vec<Envelope> {
        let mut envelopes = vec![Envelope::marker()];
        envelopes.extend(docs.iter().cloned().map(|d| Envelope::record(DOCS_COLLECTION, d)));
        envelopes.push(Envelope::End);
        envelopes
    }

    async fn run(
        store: &InMemoryDocumentStore,
        options: ImportOptions,
        envelopes: &[Envelope],
    ) -> SyncResult<ImportReport> {
        let config = SyncConfig::default();
        Importer::new(store, &config, options)
            .import(body(envelopes))
            .await
    }

    #[tokio::test]
    async fn full_import_purges_but_keeps_protected() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                DOCS_COLLECTION,
                [article("9", "stale"), Document::new("admin1", "group")],
            )
            .unwrap();

        let report = run(
            &store,
            ImportOptions::default(),
            &records(&[article("1", "one"), article("2", "two")]),
        )
        .await
        .unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.purged, 1);
        assert!(report.attachment_scope.is_none());
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["1", "2", "admin1"]);
    }

    #[tokio::test]
    async fn wrong_marker_purges_nothing() {
        let store = InMemoryDocumentStore::new();
        store.seed(DOCS_COLLECTION, [article("9", "stale")]).unwrap();

        let err = run(
            &store,
            ImportOptions::default(),
            &[Envelope::Marker { version: 7 }, Envelope::End],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Protocol(_)));
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["9"]);
    }

    #[tokio::test]
    async fn truncated_stream_keeps_committed_records() {
        let store = InMemoryDocumentStore::new();
        let mut envelopes = records(&[article("1", "one"), article("2", "two")]);
        envelopes.pop();

        let err = run(&store, ImportOptions::default(), &envelopes)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::IncompleteStream { records: 2 }));
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn interrupted_transport_is_incomplete() {
        let store = InMemoryDocumentStore::new();
        let mut chunks: Vec<SyncResult<Bytes>> = vec![
            Ok(Envelope::marker().to_frame().unwrap()),
            Ok(Envelope::record(DOCS_COLLECTION, article("1", "one"))
                .to_frame()
                .unwrap()),
        ];
        chunks.push(Err(SyncError::transport_retryable("connection reset")));
        let config = SyncConfig::default();

        let err = Importer::new(&store, &config, ImportOptions::default())
            .import(stream::iter(chunks).boxed())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::IncompleteStream { records: 1 }));
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["1"]);
    }

    #[tokio::test]
    async fn type_scoped_purge_only_touches_that_type() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                DOCS_COLLECTION,
                [article("9", "stale"), Document::new("p1", "product")],
            )
            .unwrap();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            ..ImportOptions::default()
        };

        let report = run(&store, options, &records(&[article("1", "one")]))
            .await
            .unwrap();

        assert_eq!(report.purged, 1);
        assert_eq!(report.attachment_scope, Some(BTreeSet::new()));
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["1", "p1"]);
    }

    #[tokio::test]
    async fn type_scoped_rerun_replaces_related_documents() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                DOCS_COLLECTION,
                [article("a1", "first"), Document::new("p1", "person").with("name", "old")],
            )
            .unwrap();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            ..ImportOptions::default()
        };
        let envelopes = records(&[
            article("a1", "first"),
            Document::new("p1", "person").with("name", "new"),
        ]);

        let report = run(&store, options.clone(), &envelopes).await.unwrap();
        assert_eq!(report.purged, 1);
        assert_eq!(report.records, 2);

        run(&store, options, &envelopes).await.unwrap();
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["a1", "p1"]);
        let person = store.get(DOCS_COLLECTION, "p1").unwrap().unwrap();
        assert_eq!(person.get("name"), Some(&serde_json::json!("new")));
    }

    #[tokio::test]
    async fn keep_twice_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            keep: true,
            ..ImportOptions::default()
        };
        let envelopes = records(&[article("1", "one"), article("2", "two")]);

        run(&store, options.clone(), &envelopes).await.unwrap();
        let report = run(&store, options, &envelopes).await.unwrap();

        assert_eq!(report.purged, 0);
        assert_eq!(store.ids(DOCS_COLLECTION), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn slug_collisions_are_mutated() {
        let store = InMemoryDocumentStore::new();
        store
            .seed(DOCS_COLLECTION, [Document::new("p1", "product").with(SLUG_FIELD, "one")])
            .unwrap();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            ..ImportOptions::default()
        };

        let report = run(&store, options, &records(&[article("1", "one")]))
            .await
            .unwrap();

        assert_eq!(report.renamed, 1);
        let imported = store.get(DOCS_COLLECTION, "1").unwrap().unwrap();
        let slug = imported.slug().unwrap();
        assert!(slug.starts_with("one") && slug.len() == 4);
    }

    #[tokio::test]
    async fn unique_conflict_gives_up_after_retries() {
        let store = InMemoryDocumentStore::new();
        let config = SyncConfig::default().with_unique_retries(1);
        store
            .seed(DOCS_COLLECTION, [Document::new("p1", "product").with(SLUG_FIELD, "one")])
            .unwrap();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            ..ImportOptions::default()
        };

        let err = Importer::new(&store, &config, options)
            .import(body(&records(&[article("1", "one")])))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::UniqueConflict { ref field, attempts: 1, .. } if field == SLUG_FIELD
        ));
    }

    #[tokio::test]
    async fn locale_pairing_inserts_then_updates() {
        let store = InMemoryDocumentStore::new();
        let options = ImportOptions {
            doc_type: Some("article".into()),
            keep: true,
            locale: Some("en".into()),
        };
        let doc = article("1", "one")
            .with(WORKFLOW_LOCALE_FIELD, "en")
            .with(WORKFLOW_GUID_FIELD, "g1")
            .with("title", "First");

        let report = run(&store, options.clone(), &records(&[doc.clone()]))
            .await
            .unwrap();
        assert_eq!(report.paired, 1);

        let draft_filter = Filter::all().with_field(WORKFLOW_LOCALE_FIELD, "en-draft");
        let draft = store.find_one(DOCS_COLLECTION, &draft_filter).unwrap().unwrap();
        assert_ne!(draft.id(), "1");
        assert_eq!(draft.workflow_guid(), Some("g1"));

        let updated = doc.with("title", "Second");
        run(&store, options, &records(&[updated])).await.unwrap();

        assert_eq!(store.count(DOCS_COLLECTION, &draft_filter).unwrap(), 1);
        let again = store.find_one(DOCS_COLLECTION, &draft_filter).unwrap().unwrap();
        assert_eq!(again.id(), draft.id());
        assert_eq!(again.str_field("title"), Some("Second"));
    }

    #[tokio::test]
    async fn scoped_attachments_merge_ownership() {
        let store = InMemoryDocumentStore::new();
        let existing = Document::new("img1", "attachment").with("docIds", serde_json::json!(["x"]));
        store.seed(ATTACHMENTS_COLLECTION, [existing]).unwrap();
        let incoming = Document::new("img1", "attachment").with("docIds", serde_json::json!(["1"]));
        let options = ImportOptions {
            doc_type: Some("article".into()),
            ..ImportOptions::default()
        };

        let report = run(
            &store,
            options,
            &[
                Envelope::marker(),
                Envelope::record(ATTACHMENTS_COLLECTION, incoming),
                Envelope::End,
            ],
        )
        .await
        .unwrap();

        let scope = report.attachment_scope.unwrap();
        assert!(scope.contains("img1"));
        let merged = store.get(ATTACHMENTS_COLLECTION, "img1").unwrap().unwrap();
        assert_eq!(merged.get("docIds"), Some(&serde_json::json!(["x", "1"])));
    }

    #[tokio::test]
    async fn protected_records_are_never_written() {
        let store = InMemoryDocumentStore::new();
        run(
            &store,
            ImportOptions::default(),
            &[
                Envelope::marker(),
                Envelope::record(DOCS_COLLECTION, Document::new("u1", "user")),
                Envelope::record("sessions", Document::new("s1", "session")),
                Envelope::End,
            ],
        )
        .await
        .unwrap();

        assert!(store.ids(DOCS_COLLECTION).is_empty());
        assert!(store.ids("sessions").is_empty());
    }
}
