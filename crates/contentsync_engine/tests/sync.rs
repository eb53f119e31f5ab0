//! End-to-end sync tests against a real source server.

use contentsync_core::{
    ContentConfig, Document, InMemoryDocumentStore, ATTACHMENTS_COLLECTION, DOCS_COLLECTION,
};
use contentsync_engine::{
    MockTransport, Orchestrator, RunOptions, SyncConfig, SyncError, SyncReport, SyncRun,
};
use contentsync_protocol::Envelope;
use contentsync_storage::{BinaryStore, InMemoryBinaryStore};
use contentsync_testkit::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

struct Sink {
    store: Arc<InMemoryDocumentStore>,
    binaries: Arc<InMemoryBinaryStore>,
    config: SyncConfig,
}

impl Sink {
    fn new() -> Self {
        Self::with_docs([])
    }

    fn with_docs<I>(docs: I) -> Self
    where
        I: IntoIterator<Item = Document>,
    {
        Self {
            store: Arc::new(seeded_store(docs)),
            binaries: Arc::new(InMemoryBinaryStore::new("/uploads")),
            config: SyncConfig::default(),
        }
    }

    fn with_content(mut self, content: ContentConfig) -> Self {
        self.config = self.config.with_content(content);
        self
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.config.clone(), self.store.clone(), self.binaries.clone())
    }

    async fn pull(&self, source: &TestSource, options: RunOptions) -> Result<SyncReport, SyncError> {
        let options = RunOptions {
            from: Some(source.base_url()),
            api_key: Some(TEST_API_KEY.to_string()),
            ..options
        };
        let run = SyncRun::validate(&options, &HashMap::new())?;
        self.orchestrator().run(&run).await
    }

    fn docs(&self) -> Vec<Document> {
        self.store.snapshot().remove(DOCS_COLLECTION).unwrap_or_default()
    }
}

fn all() -> RunOptions {
    RunOptions::default()
}

fn articles() -> RunOptions {
    RunOptions::default().with_type("article")
}

#[tokio::test]
async fn full_sync_replaces_content_but_keeps_protected_groups() {
    let source = TestSource::start(
        SourceFixture::new().with_docs([article("1", "one"), article("2", "two"), group("editors")]),
    )
    .await;
    let sink = Sink::with_docs([article("9", "stale"), group("admin1")]);

    let report = sink.pull(&source, all()).await.unwrap();

    assert_eq!(sink.store.ids(DOCS_COLLECTION), vec!["1", "2", "admin1"]);
    assert_eq!(report.imported, 2);
    assert_eq!(report.purged, 1);
}

#[tokio::test]
async fn round_trip_preserves_documents() {
    for n in [0usize, 1, 40] {
        let docs: Vec<Document> = (0..n)
            .map(|i| article(&format!("a{i:03}"), &format!("slug-{i}")).with("title", json!({"n": i})))
            .collect();
        let source = TestSource::start(SourceFixture::new().with_docs(docs.clone())).await;
        let sink = Sink::new();

        let report = sink.pull(&source, all()).await.unwrap();

        assert_eq!(report.imported, n as u64);
        assert_eq!(sink.docs(), docs, "round trip of {n} documents");
        source.stop().await;
    }
}

#[tokio::test]
async fn keep_twice_leaves_one_record_per_id() {
    let source =
        TestSource::start(SourceFixture::new().with_docs([article("1", "one"), article("2", "two")]))
            .await;
    let sink = Sink::with_docs([article("3", "three")]);

    sink.pull(&source, articles().with_keep()).await.unwrap();
    let report = sink.pull(&source, articles().with_keep()).await.unwrap();

    assert_eq!(report.purged, 0);
    assert_eq!(sink.store.ids(DOCS_COLLECTION), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn related_documents_arrive_exactly_once() {
    let source = TestSource::start(SourceFixture::new().with_docs([
        article_with_joins("1", "one", "p1", &["t1"]),
        article_with_joins("2", "two", "p1", &["t1", "t2"]),
        doc("p1", "person"),
        doc("t1", "tag"),
        doc("t2", "tag"),
        doc("unrelated", "person"),
    ]))
    .await;
    let sink = Sink::new();

    let report = sink.pull(&source, articles().with_related()).await.unwrap();

    assert_eq!(report.imported, 5);
    assert_eq!(
        sink.store.ids(DOCS_COLLECTION),
        vec!["1", "2", "p1", "t1", "t2"]
    );
}

#[tokio::test]
async fn attachments_are_copied_with_their_variants() {
    let content = ContentConfig::default().with_image_sizes(["full"]);
    let source = TestSource::start(
        SourceFixture::new()
            .with_content(content.clone())
            .with_docs([article("1", "one")])
            .with_attachments([
                image_attachment("img1", "cat", &["1"]),
                file_attachment("f1", "report", "pdf", &["1"]),
            ])
            .with_binary("/attachments/img1-cat.jpg", b"original".to_vec(), false)
            .with_binary("/attachments/img1-cat.full.jpg", b"full".to_vec(), false)
            .with_binary("/attachments/f1-report.pdf", b"pdf".to_vec(), false),
    )
    .await;
    let sink = Sink::new().with_content(content);

    let report = sink.pull(&source, all()).await.unwrap();

    assert_eq!(report.attachments, 2);
    assert_eq!(report.variants_copied, 3);
    assert_eq!(report.variants_failed, 0);
    assert_eq!(
        sink.binaries.get("/attachments/img1-cat.full.jpg"),
        Some(b"full".to_vec())
    );
    assert_eq!(
        sink.binaries.get("/attachments/f1-report.pdf"),
        Some(b"pdf".to_vec())
    );
}

#[tokio::test]
async fn visibility_mismatch_is_repaired_by_inverted_retry() {
    // The record says live, but the source holds the object disabled.
    let source = TestSource::start(
        SourceFixture::new()
            .with_docs([article("1", "one")])
            .with_attachments([file_attachment("f1", "report", "pdf", &["1"])])
            .with_binary("/attachments/f1-report.pdf", b"pdf".to_vec(), true),
    )
    .await;
    let sink = Sink::new();

    let report = sink.pull(&source, all()).await.unwrap();

    assert_eq!(report.variants_copied, 1);
    assert_eq!(
        sink.binaries.get("/attachments/f1-report.pdf"),
        Some(b"pdf".to_vec())
    );
    assert!(!sink.binaries.is_disabled("/attachments/f1-report.pdf").unwrap());
    assert!(source.binaries.is_disabled("/attachments/f1-report.pdf").unwrap());
}

#[tokio::test]
async fn missing_binaries_do_not_abort_the_run() {
    let source = TestSource::start(
        SourceFixture::new()
            .with_docs([article("1", "one")])
            .with_attachments([file_attachment("f1", "gone", "pdf", &["1"])]),
    )
    .await;
    let sink = Sink::new();

    let report = sink.pull(&source, all()).await.unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.variants_failed, 1);
    assert!(sink.binaries.is_empty());
}

#[tokio::test]
async fn type_scoped_sync_merges_attachment_ownership() {
    let source = TestSource::start(
        SourceFixture::new()
            .with_docs([article("1", "one").with(
                "image",
                json!({"type": "attachment", "_id": "f1"}),
            )])
            .with_attachments([file_attachment("f1", "report", "pdf", &["1"])])
            .with_binary("/attachments/f1-report.pdf", b"pdf".to_vec(), false),
    )
    .await;
    let sink = Sink::new();
    seed_attachments(&sink.store, [file_attachment("f1", "report", "pdf", &["local"])]);

    let report = sink.pull(&source, articles()).await.unwrap();

    assert_eq!(report.attachments, 1);
    let merged = sink
        .store
        .snapshot()
        .remove(ATTACHMENTS_COLLECTION)
        .unwrap()
        .remove(0);
    assert_eq!(merged.get("docIds"), Some(&json!(["local", "1"])));
}

#[tokio::test]
async fn wrong_api_key_is_an_auth_error() {
    let source = TestSource::start(SourceFixture::new().with_docs([article("1", "one")])).await;
    let sink = Sink::with_docs([article("9", "stale")]);
    let options = RunOptions::pull_from(source.base_url()).with_api_key("wrong");
    let run = SyncRun::validate(&options, &HashMap::new()).unwrap();

    let err = sink.orchestrator().run(&run).await.unwrap_err();

    assert!(matches!(err, SyncError::Auth(_)));
    assert_eq!(sink.store.ids(DOCS_COLLECTION), vec!["9"]);
}

#[tokio::test]
async fn incomplete_stream_keeps_committed_records() {
    let transport = MockTransport::new();
    transport.set_export_envelopes(&[
        Envelope::marker(),
        Envelope::record(DOCS_COLLECTION, article("1", "one")),
        Envelope::record(DOCS_COLLECTION, article("2", "two")),
    ]);
    let sink = Sink::with_docs([article("9", "stale")]);
    let options = RunOptions::pull_from("http://source.invalid").with_api_key("k");
    let run = SyncRun::validate(&options, &HashMap::new()).unwrap();

    let err = sink.orchestrator().run_with(&run, &transport).await.unwrap_err();

    assert!(matches!(err, SyncError::IncompleteStream { records: 2 }));
    assert_eq!(sink.store.ids(DOCS_COLLECTION), vec!["1", "2"]);
}

#[tokio::test]
async fn locale_sync_maintains_draft_counterparts() {
    let source = TestSource::start(SourceFixture::new().with_docs([
        localized(article("1", "one"), "en", "g1"),
        localized(article("2", "one"), "fr", "g2"),
    ]))
    .await;
    let sink = Sink::new();

    let report = sink
        .pull(&source, articles().with_keep().with_locale("en"))
        .await
        .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.paired, 1);
    let locales: Vec<Option<String>> = sink
        .docs()
        .iter()
        .map(|d| d.workflow_locale().map(String::from))
        .collect();
    assert!(locales.contains(&Some("en".into())));
    assert!(locales.contains(&Some("en-draft".into())));
}
