//! Cross-origin request check.
//!
//! Browser requests carrying an `Origin` header are only accepted from
//! configured origins. Machine-to-machine endpoints are listed in an
//! explicit allow-list handed to the router constructor and skip the check.

use crate::error::ServerError;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Which requests pass the origin check.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    exempt: Vec<String>,
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Creates a policy from the exempt paths and allowed origins.
    pub fn new(exempt: Vec<String>, allowed: Vec<String>) -> Self {
        Self { exempt, allowed }
    }

    /// Returns true if a request to `path` with the given origin passes.
    pub fn allows(&self, path: &str, origin: Option<&str>) -> bool {
        if self.exempt.iter().any(|p| p == path) {
            return true;
        }
        match origin {
            None => true,
            Some(origin) => self
                .allowed
                .iter()
                .any(|a| a.trim_end_matches('/') == origin.trim_end_matches('/')),
        }
    }
}

/// Middleware enforcing an [`OriginPolicy`].
pub async fn origin_check(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if policy.allows(request.uri().path(), origin.as_deref()) {
        next.run(request).await
    } else {
        ServerError::OriginRejected(origin.unwrap_or_default()).into_response()
    }
}
