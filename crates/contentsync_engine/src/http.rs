//! HTTP transport implementation.
//!
//! Talks to the source's export and binary fetch endpoints with `reqwest`,
//! consuming the export body as a stream so that no more than one chunk
//! is held in memory at a time.

use crate::config::{Peer, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::transport::{ByteStream, PeerTransport};
use async_trait::async_trait;
use contentsync_protocol::{
    authorization_value, BinaryFetchParams, ExportParams, CONTENT_PATH, UPLOADFS_PATH,
};
use futures::stream::{self, StreamExt};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// HTTP-based peer transport.
pub struct HttpTransport {
    /// Base URL of the source, without a trailing slash.
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
    idle_timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(peer: &Peer, config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::configuration(format!("http client: {e}")))?;
        Ok(Self {
            base_url: peer.base_url.trim_end_matches('/').to_string(),
            api_key: peer.api_key.clone(),
            client,
            timeout: config.timeout,
            idle_timeout: config.idle_timeout,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{endpoint}", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                authorization_value(&self.api_key),
            )
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn request_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        return SyncError::Timeout;
    }
    let retryable = err.is_connect() || err.is_request() || err.is_body();
    SyncError::Transport {
        message: err.to_string(),
        retryable,
    }
}

/// Maps a non-success status to the error taxonomy.
fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = format!("{} returned {status}", response.url().path());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth(message)),
        s if s.is_server_error() => Err(SyncError::transport_retryable(message)),
        _ => Err(SyncError::transport_fatal(message)),
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn open_export(&self, params: &ExportParams) -> SyncResult<ByteStream> {
        debug!(base_url = %self.base_url, ?params, "Opening export stream");
        let response = self
            .get(CONTENT_PATH)
            .query(params)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response)?;

        let idle = self.idle_timeout;
        let body = response.bytes_stream().boxed();
        let chunks = stream::unfold(Some(body), move |state| async move {
            let mut body = state?;
            match tokio::time::timeout(idle, body.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                Ok(Some(Err(e))) => Some((Err(request_error(e)), None)),
                Ok(None) => None,
                Err(_) => Some((Err(SyncError::Timeout), None)),
            }
        });
        Ok(chunks.boxed())
    }

    async fn fetch_binary(&self, path: &str, disabled: bool, dest: &Path) -> SyncResult<()> {
        let params = BinaryFetchParams {
            path: path.to_string(),
            disabled,
        };
        let response = self
            .get(UPLOADFS_PATH)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response)?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(request_error)?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
