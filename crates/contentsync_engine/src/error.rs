//! Error types for the sync engine.

use contentsync_core::CoreError;
use contentsync_protocol::ProtocolError;
use contentsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The peer refused the API key.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The stream violated the envelope grammar.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The stream stopped before its end marker. Records already committed
    /// stay committed.
    #[error("stream ended without end marker after {records} records")]
    IncompleteStream {
        /// Records committed before the stream stopped.
        records: u64,
    },

    /// A unique index kept rejecting a record after every rename attempt.
    #[error("unique conflict on {collection}.{field} for document {id} after {attempts} attempts")]
    UniqueConflict {
        /// Collection written to.
        collection: String,
        /// Field that kept colliding.
        field: String,
        /// Id of the rejected document.
        id: String,
        /// Insert attempts made.
        attempts: u32,
    },

    /// A binary variant could not be transferred.
    #[error("attachment transfer failed for {path}: {message}")]
    AttachmentTransfer {
        /// Variant path.
        path: String,
        /// Last failure.
        message: String,
    },

    /// Invalid run options or peer configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// No data arrived within the idle timeout.
    #[error("operation timed out")]
    Timeout,

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Binary store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Incomplete { records } => SyncError::IncompleteStream { records },
            other => SyncError::Protocol(other),
        }
    }
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if running again may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::IncompleteStream { .. } => true,
            _ => false,
        }
    }
}
