//! Server configuration.

use contentsync_core::ContentConfig;
use contentsync_protocol::{CONTENT_PATH, UPLOADFS_PATH};
use std::net::SocketAddr;

/// Configuration for the source-side content server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// API key accepted by the export and binary fetch endpoints. With no
    /// key configured every authenticated request is refused.
    pub api_key: Option<String>,
    /// Origins allowed to call non-exempt endpoints from a browser.
    pub allowed_origins: Vec<String>,
    /// Paths exempt from the origin check.
    pub origin_exempt: Vec<String>,
    /// Frames buffered between the export producer and the response body.
    pub stream_buffer: usize,
    /// Replication settings.
    pub content: ContentConfig,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            api_key: None,
            allowed_origins: Vec::new(),
            origin_exempt: vec![CONTENT_PATH.to_string(), UPLOADFS_PATH.to_string()],
            stream_buffer: 1,
            content: ContentConfig::default(),
        }
    }

    /// Sets the accepted API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Adds an allowed browser origin.
    #[must_use]
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    /// Replaces the origin check allow-list.
    #[must_use]
    pub fn with_origin_exempt<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origin_exempt = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the export stream buffer, in frames.
    #[must_use]
    pub fn with_stream_buffer(mut self, frames: usize) -> Self {
        self.stream_buffer = frames.max(1);
        self
    }

    /// Sets the replication settings.
    #[must_use]
    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 3000)))
    }
}
