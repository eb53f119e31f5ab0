//! API key authentication.
//!
//! The accepted key is held only as a SHA-256 digest, and presented keys
//! are compared digest to digest so comparison time does not depend on how
//! many leading bytes match.

use crate::error::{ServerError, ServerResult};
use axum::http::{header, HeaderMap};
use contentsync_protocol::parse_api_key;
use sha2::{Digest, Sha256};

/// Validates the `Authorization: ApiKey <key>` header of incoming requests.
#[derive(Clone)]
pub struct ApiKeyValidator {
    digest: Option<[u8; 32]>,
}

impl ApiKeyValidator {
    /// Creates a validator accepting the given key. With `None` every
    /// request is refused.
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            digest: api_key.filter(|k| !k.is_empty()).map(digest),
        }
    }

    /// Validates a presented key.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] if no key is configured or the
    /// key does not match.
    pub fn validate(&self, presented: &str) -> ServerResult<()> {
        let expected = self
            .digest
            .ok_or_else(|| ServerError::NotAuthorized("no API key configured".into()))?;
        let actual = digest(presented);
        let diff = expected
            .iter()
            .zip(actual.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Ok(())
        } else {
            Err(ServerError::NotAuthorized("invalid API key".into()))
        }
    }

    /// Validates the `Authorization` header of a request.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] if the header is absent,
    /// malformed or carries the wrong key.
    pub fn authorize(&self, headers: &HeaderMap) -> ServerResult<()> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ServerError::NotAuthorized("missing authorization header".into()))?;
        let value = value
            .to_str()
            .map_err(|_| ServerError::NotAuthorized("malformed authorization header".into()))?;
        let key = parse_api_key(value)
            .ok_or_else(|| ServerError::NotAuthorized("unsupported authorization scheme".into()))?;
        self.validate(key)
    }
}

impl std::fmt::Debug for ApiKeyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyValidator")
            .field("configured", &self.digest.is_some())
            .finish()
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}
