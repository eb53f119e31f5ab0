//! Error types for binary store operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No object is stored at the path in the requested visibility state.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object exists but its visibility state forbids the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The path is not a valid store path.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Returns true if the error means the object is simply absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
