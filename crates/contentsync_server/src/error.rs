//! Error types for the content server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use contentsync_codec::CodecError;
use contentsync_core::CoreError;
use contentsync_storage::StorageError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong API key.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Request from an origin that is not allowed.
    #[error("origin rejected: {0}")]
    OriginRejected(String),

    /// The response body receiver went away.
    #[error("client disconnected")]
    Disconnected,

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Binary store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Frame encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::NotAuthorized(_)
                | ServerError::OriginRejected(_)
                | ServerError::Disconnected
        ) || matches!(self, ServerError::Storage(e) if e.is_not_found())
    }

    /// HTTP status reported to the client.
    ///
    /// Every failure maps to a 4xx status; server-side detail stays in the
    /// logs.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotAuthorized(_) | ServerError::OriginRejected(_) => StatusCode::FORBIDDEN,
            ServerError::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            tracing::debug!(error = %self, %status, "request rejected");
        } else {
            tracing::error!(error = %self, %status, "request failed");
        }
        let body = status.canonical_reason().unwrap_or("error");
        (status, body).into_response()
    }
}
