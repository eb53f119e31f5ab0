//! Configuration file loading.
//!
//! The CLI reads one TOML file holding the local stores, the server
//! settings, named peers and the content schemas:
//!
//! ```toml
//! api_key = "local-key"
//!
//! [store]
//! documents = "data/db"
//! uploads = "public/uploads"
//! public_url = "http://localhost:3000/uploads"
//!
//! [server]
//! bind = "0.0.0.0:3000"
//!
//! [environments.staging]
//! url = "https://staging.example.com"
//! api_key = "staging-key"
//!
//! [[schemas.types.article]]
//! name = "authorId"
//! kind = "single_ref"
//! ```

use contentsync_core::{ContentConfig, CoreError, JsonFileDocumentStore, SchemaRegistry};
use contentsync_engine::{Environment, SyncConfig};
use contentsync_server::ServerConfig;
use contentsync_storage::{FileBinaryStore, StorageError};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading settings or opening stores.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for these settings.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// The document store could not be opened.
    #[error("document store: {0}")]
    Store(#[from] CoreError),

    /// The binary store could not be opened.
    #[error("binary store: {0}")]
    Storage(#[from] StorageError),
}

/// Where the local stores live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the JSON document store.
    pub documents: PathBuf,
    /// Root directory of the binary store.
    pub uploads: PathBuf,
    /// URL prefix under which enabled objects are public.
    pub public_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            documents: PathBuf::from("data/db"),
            uploads: PathBuf::from("public/uploads"),
            public_url: "/uploads".to_string(),
        }
    }
}

impl StoreConfig {
    /// Sets the document directory.
    #[must_use]
    pub fn with_documents(mut self, dir: impl Into<PathBuf>) -> Self {
        self.documents = dir.into();
        self
    }

    /// Sets the binary store root.
    #[must_use]
    pub fn with_uploads(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads = dir.into();
        self
    }

    /// Resolves relative paths against `base`.
    #[must_use]
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.documents.is_relative() {
            self.documents = base.join(&self.documents);
        }
        if self.uploads.is_relative() {
            self.uploads = base.join(&self.uploads);
        }
        self
    }

    /// Opens the document store, taking its directory lock.
    pub fn open_documents(&self) -> Result<JsonFileDocumentStore, SettingsError> {
        Ok(JsonFileDocumentStore::open(&self.documents)?)
    }

    /// Opens the binary store.
    pub fn open_binaries(&self) -> Result<FileBinaryStore, SettingsError> {
        Ok(FileBinaryStore::open(&self.uploads, self.public_url.clone())?)
    }
}

/// The `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Origins allowed to call non-exempt endpoints.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            allowed_origins: Vec::new(),
        }
    }
}

/// The `[sync]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Binary fetch timeout in seconds.
    pub timeout_secs: u64,
    /// Longest pause tolerated inside the export stream, in seconds.
    pub idle_timeout_secs: u64,
    /// Attachments reconciled concurrently.
    pub concurrency: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
            idle_timeout_secs: defaults.idle_timeout.as_secs(),
            concurrency: defaults.reconcile_concurrency,
        }
    }
}

/// Everything the configuration file can hold.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key the local endpoints accept.
    pub api_key: Option<String>,
    /// Local stores.
    pub store: StoreConfig,
    /// Server settings.
    pub server: ServerSection,
    /// Sync client settings.
    pub sync: SyncSection,
    /// Replication settings shared by both sides.
    pub content: ContentConfig,
    /// Named peers.
    pub environments: HashMap<String, Environment>,
    /// Document and widget schemas.
    pub schemas: SchemaRegistry,
}

impl Settings {
    /// Loads settings from `path`.
    ///
    /// A missing file yields the defaults. Relative store paths resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut settings = Self::parse(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            settings.store = settings.store.relative_to(base);
        }
        Ok(settings)
    }

    /// Parses settings from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Builds the sync engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_connect_timeout(Duration::from_secs(self.sync.connect_timeout_secs))
            .with_timeout(Duration::from_secs(self.sync.timeout_secs))
            .with_idle_timeout(Duration::from_secs(self.sync.idle_timeout_secs))
            .with_reconcile_concurrency(self.sync.concurrency)
            .with_content(self.content.clone())
    }

    /// Builds the server configuration, optionally overriding the bind
    /// address.
    pub fn server_config(&self, bind: Option<SocketAddr>) -> ServerConfig {
        let mut config = ServerConfig::new(bind.unwrap_or(self.server.bind))
            .with_content(self.content.clone());
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        for origin in &self.server.allowed_origins {
            config = config.with_allowed_origin(origin.clone());
        }
        config
    }
}
