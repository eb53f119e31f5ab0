//! Shared state of the request handlers.

use crate::auth::ApiKeyValidator;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use axum::http::HeaderMap;
use contentsync_core::{DocumentQuery, DocumentStore, JsonCriteriaQuery, SchemaRegistry};
use contentsync_storage::BinaryStore;
use std::sync::Arc;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Source document store.
    pub store: Arc<dyn DocumentStore>,
    /// Source binary store.
    pub binaries: Arc<dyn BinaryStore>,
    /// Schemas used for related-document expansion.
    pub registry: Arc<SchemaRegistry>,
    /// Query capability resolving export criteria.
    pub query: Arc<dyn DocumentQuery>,
    auth: ApiKeyValidator,
}

impl HandlerContext {
    /// Creates a new handler context using the JSON criteria query.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        binaries: Arc<dyn BinaryStore>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        let query = Arc::new(JsonCriteriaQuery::new().with_page_size(config.content.page_size));
        let auth = ApiKeyValidator::new(config.api_key.as_deref());
        Self {
            config,
            store,
            binaries,
            registry,
            query,
            auth,
        }
    }

    /// Replaces the query capability.
    #[must_use]
    pub fn with_query(mut self, query: Arc<dyn DocumentQuery>) -> Self {
        self.query = query;
        self
    }

    /// Checks the API key of a request.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthorized` if the key is missing or wrong.
    pub fn authorize(&self, headers: &HeaderMap) -> ServerResult<()> {
        self.auth.authorize(headers)
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("config", &self.config.bind_addr)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}
