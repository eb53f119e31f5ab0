//! Configuration for sync runs.

use contentsync_codec::DEFAULT_MAX_FRAME_LEN;
use contentsync_core::ContentConfig;
use serde::Deserialize;
use std::time::Duration;

/// Engine-wide settings for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for establishing connections.
    pub connect_timeout: Duration,
    /// Timeout for a whole binary fetch.
    pub timeout: Duration,
    /// Longest silence tolerated between export stream chunks.
    pub idle_timeout: Duration,
    /// Attachments reconciled concurrently.
    pub reconcile_concurrency: usize,
    /// Insert attempts before a unique conflict aborts the run.
    pub unique_retries: u32,
    /// Largest accepted stream frame.
    pub max_frame_len: usize,
    /// Replication settings.
    pub content: ContentConfig,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the binary fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the stream idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the attachment concurrency.
    #[must_use]
    pub fn with_reconcile_concurrency(mut self, concurrency: usize) -> Self {
        self.reconcile_concurrency = concurrency.max(1);
        self
    }

    /// Sets the number of insert attempts on unique conflicts.
    #[must_use]
    pub fn with_unique_retries(mut self, retries: u32) -> Self {
        self.unique_retries = retries.max(1);
        self
    }

    /// Sets the replication settings.
    #[must_use]
    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            idle_timeout: Duration::from_secs(300),
            reconcile_concurrency: 5,
            unique_retries: 10,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            content: ContentConfig::default(),
        }
    }
}

/// A named peer from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    /// Base URL of the peer.
    pub url: String,
    /// API key accepted by the peer.
    pub api_key: String,
}

/// A resolved peer.
#[derive(Clone, PartialEq, Eq)]
pub struct Peer {
    /// Base URL of the peer.
    pub base_url: String,
    /// API key accepted by the peer.
    pub api_key: String,
}

impl Peer {
    /// Creates a peer descriptor.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Options of one sync run, as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Pull from this environment name or URL.
    pub from: Option<String>,
    /// Push to this environment name (unsupported).
    pub to: Option<String>,
    /// Restrict to one document type.
    pub doc_type: Option<String>,
    /// Also copy documents joined from the selected ones.
    pub related: bool,
    /// Merge into existing content instead of purging first.
    pub keep: bool,
    /// Criteria for the source's query capability.
    pub query: Option<String>,
    /// API key for a literal peer URL.
    pub api_key: Option<String>,
    /// Restrict to one workflow locale and maintain its paired locale.
    pub locale: Option<String>,
}

impl RunOptions {
    /// Options pulling everything from `peer`.
    pub fn pull_from(peer: impl Into<String>) -> Self {
        Self {
            from: Some(peer.into()),
            ..Self::default()
        }
    }

    /// Restricts the run to one type.
    #[must_use]
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Enables related-document expansion.
    #[must_use]
    pub fn with_related(mut self) -> Self {
        self.related = true;
        self
    }

    /// Merges instead of purging.
    #[must_use]
    pub fn with_keep(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Sets source query criteria.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the API key for a literal URL.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Restricts to one workflow locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Returns true if only one document type is synced.
    pub fn is_type_scoped(&self) -> bool {
        self.doc_type.is_some()
    }
}
