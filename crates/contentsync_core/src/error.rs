//! Error types for ContentSync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in document store and model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Binary store error.
    #[error("storage error: {0}")]
    Storage(#[from] contentsync_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document with the same id already exists.
    #[error("duplicate id {id} in collection {collection}")]
    DuplicateId {
        /// The collection written to.
        collection: String,
        /// The conflicting id.
        id: String,
    },

    /// A unique index rejected the write.
    #[error("unique constraint on {collection}.{field} violated by value {value}")]
    UniqueConflict {
        /// The collection written to.
        collection: String,
        /// The indexed field that collided.
        field: String,
        /// The colliding value.
        value: String,
    },

    /// A document is structurally invalid.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the store directory lock.
    #[error("store directory is locked by another process")]
    DirectoryLocked,

    /// A query could not be parsed or applied.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns the colliding field if this is a unique-index conflict.
    pub fn conflicting_field(&self) -> Option<&str> {
        match self {
            CoreError::UniqueConflict { field, .. } => Some(field),
            _ => None,
        }
    }
}
