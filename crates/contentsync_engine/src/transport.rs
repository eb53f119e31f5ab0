//! Transport layer abstraction for sync runs.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use bytes::Bytes;
use contentsync_protocol::{Envelope, ExportParams};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// Raw body chunks of an export stream.
pub type ByteStream = BoxStream<'static, SyncResult<Bytes>>;

/// A peer transport handles network communication with the source.
///
/// This trait abstracts the network layer, allowing the HTTP client to be
/// swapped for a scripted mock in tests.
///
/// # Implementors
///
/// - [`HttpTransport`](crate::HttpTransport)
/// - [`MockTransport`]
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Opens the export stream with the given parameters.
    ///
    /// Returns once the source has accepted the request; the body is
    /// consumed incrementally from the returned stream.
    async fn open_export(&self, params: &ExportParams) -> SyncResult<ByteStream>;

    /// Downloads one binary object into `dest`.
    ///
    /// `disabled` tells the source whether the object is currently hidden
    /// there, which selects between a redirect and a proxied copy.
    async fn fetch_binary(&self, path: &str, disabled: bool, dest: &Path) -> SyncResult<()>;
}

#[derive(Debug, Clone)]
struct MockBinary {
    data: Vec<u8>,
    disabled: bool,
}

/// A scripted transport for testing.
///
/// The export body is a fixed list of chunks. Binary fetches only succeed
/// when the requested visibility matches the object's scripted state, the
/// way the real source fails to find an object under the wrong flag.
#[derive(Debug, Default)]
pub struct MockTransport {
    chunks: Mutex<Vec<Bytes>>,
    binaries: Mutex<HashMap<String, MockBinary>>,
    exports: Mutex<Vec<ExportParams>>,
    fetches: Mutex<Vec<(String, bool)>>,
}

impl MockTransport {
    /// Creates a mock with an empty export body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw export body chunks.
    pub fn set_export_chunks(&self, chunks: Vec<Bytes>) {
        *self.chunks.lock() = chunks;
    }

    /// Sets the export body to the framed envelopes, one chunk per frame.
    ///
    /// # Panics
    ///
    /// Panics if an envelope cannot be encoded.
    pub fn set_export_envelopes(&self, envelopes: &[Envelope]) {
        let chunks = envelopes
            .iter()
            .map(|e| e.to_frame().expect("envelope encodes"))
            .collect();
        self.set_export_chunks(chunks);
    }

    /// Adds a binary object to the scripted source.
    pub fn add_binary(&self, path: impl Into<String>, data: impl Into<Vec<u8>>, disabled: bool) {
        self.binaries.lock().insert(
            path.into(),
            MockBinary {
                data: data.into(),
                disabled,
            },
        );
    }

    /// Returns the export requests received so far.
    pub fn export_requests(&self) -> Vec<ExportParams> {
        self.exports.lock().clone()
    }

    /// Returns the `(path, disabled)` pairs of every fetch attempt.
    pub fn fetches(&self) -> Vec<(String, bool)> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn open_export(&self, params: &ExportParams) -> SyncResult<ByteStream> {
        self.exports.lock().push(params.clone());
        let chunks = self.chunks.lock().clone();
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn fetch_binary(&self, path: &str, disabled: bool, dest: &Path) -> SyncResult<()> {
        self.fetches.lock().push((path.to_string(), disabled));
        let data = match self.binaries.lock().get(path) {
            Some(binary) if binary.disabled == disabled => binary.data.clone(),
            _ => return Err(SyncError::transport_fatal(format!("404 Not Found: {path}"))),
        };
        tokio::fs::write(dest, data).await?;
        Ok(())
    }
}
