//! Real-HTTP source harness.
//!
//! Spawns a [`ContentServer`] over in-memory stores on an ephemeral
//! loopback port so sinks can be tested against the actual wire.

use crate::fixtures::{uploads_store, TEST_API_KEY};
use contentsync_core::{
    ContentConfig, Document, DocumentStore, InMemoryDocumentStore, SchemaRegistry,
    ATTACHMENTS_COLLECTION, DOCS_COLLECTION,
};
use contentsync_server::{ContentServer, HandlerContext, ServerConfig};
use contentsync_storage::{BinaryStore, InMemoryBinaryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Contents of a test source.
pub struct SourceFixture {
    docs: Vec<Document>,
    attachments: Vec<Document>,
    binaries: Vec<(String, Vec<u8>, bool)>,
    registry: SchemaRegistry,
    content: ContentConfig,
}

impl SourceFixture {
    /// An empty source using the blog schema.
    pub fn new() -> Self {
        Self {
            docs: Vec::new(),
            attachments: Vec::new(),
            binaries: Vec::new(),
            registry: crate::fixtures::blog_registry(),
            content: ContentConfig::default(),
        }
    }

    /// Adds documents to the docs collection.
    #[must_use]
    pub fn with_docs<I>(mut self, docs: I) -> Self
    where
        I: IntoIterator<Item = Document>,
    {
        self.docs.extend(docs);
        self
    }

    /// Adds attachment records.
    #[must_use]
    pub fn with_attachments<I>(mut self, attachments: I) -> Self
    where
        I: IntoIterator<Item = Document>,
    {
        self.attachments.extend(attachments);
        self
    }

    /// Adds a stored object, optionally disabled.
    #[must_use]
    pub fn with_binary(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>, disabled: bool) -> Self {
        self.binaries.push((path.into(), data.into(), disabled));
        self
    }

    /// Replaces the schema registry.
    #[must_use]
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the replication settings.
    #[must_use]
    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }
}

impl Default for SourceFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A running source server.
///
/// The server shuts down when this value is dropped.
pub struct TestSource {
    addr: SocketAddr,
    /// Documents served by the source.
    pub store: Arc<InMemoryDocumentStore>,
    /// Objects served by the source.
    pub binaries: Arc<InMemoryBinaryStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestSource {
    /// Seeds the stores and starts serving on `127.0.0.1:0`.
    ///
    /// # Panics
    ///
    /// Panics if the fixture is inconsistent or the port cannot be bound.
    pub async fn start(fixture: SourceFixture) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .seed(DOCS_COLLECTION, fixture.docs)
            .expect("fixture documents are unique");
        store
            .seed(ATTACHMENTS_COLLECTION, fixture.attachments)
            .expect("fixture attachments are unique");

        let binaries = Arc::new(uploads_store());
        for (path, data, disabled) in fixture.binaries {
            binaries.put(&path, data).expect("fixture object path is valid");
            if disabled {
                binaries.disable(&path).expect("fixture object exists");
            }
        }

        let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
            .with_api_key(TEST_API_KEY)
            .with_content(fixture.content);
        let documents: Arc<dyn DocumentStore> = store.clone();
        let context = HandlerContext::new(config, documents, binaries.clone(), Arc::new(fixture.registry));
        let server = ContentServer::new(context);
        let listener = server.bind().await.expect("Failed to bind test source");
        let addr = listener.local_addr().expect("Listener has an address");

        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = server
                .serve_with_shutdown(listener, async {
                    let _ = signal.await;
                })
                .await;
        });

        Self {
            addr,
            store,
            binaries,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    /// Returns the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the base URL sinks pull from.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stops the server and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestSource {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
