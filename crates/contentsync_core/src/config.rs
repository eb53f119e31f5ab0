//! Content replication configuration.

use crate::types::SYSTEM_COLLECTION_PREFIX;
use serde::{Deserialize, Deserializer};

/// Configuration shared by the export and import sides.
///
/// Holds the protected data lists that are never replicated, the named
/// image size variants every image attachment is rendered in, and the page
/// size used when scanning stores.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Document types never replicated (content owners, permission groups).
    pub protected_types: Vec<String>,

    /// Collections never replicated (sessions, caches, locks, ...).
    pub protected_collections: Vec<String>,

    /// Named size variants of image attachments.
    pub image_sizes: Vec<String>,

    /// Number of documents fetched per store scan. Never zero.
    #[serde(deserialize_with = "non_zero_page_size")]
    pub page_size: usize,
}

fn non_zero_page_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    match usize::deserialize(deserializer)? {
        0 => Err(serde::de::Error::custom("page_size must be at least 1")),
        n => Ok(n),
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            protected_types: vec!["user".into(), "group".into()],
            protected_collections: [
                "sessions",
                "cache",
                "locks",
                "notifications",
                "bearerTokens",
                "versions",
                "usersSafe",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            image_sizes: ["max", "full", "two-thirds", "one-half", "one-third", "one-sixth"]
                .into_iter()
                .map(String::from)
                .collect(),
            page_size: 100,
        }
    }
}

impl ContentConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protected document types.
    #[must_use]
    pub fn with_protected_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the image size variant names.
    #[must_use]
    pub fn with_image_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the scan page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns true if documents of this type must never be replicated.
    pub fn is_protected_type(&self, doc_type: &str) -> bool {
        self.protected_types.iter().any(|t| t == doc_type)
    }

    /// Returns true if the collection takes part in replication.
    pub fn is_replicated_collection(&self, name: &str) -> bool {
        !name.starts_with(SYSTEM_COLLECTION_PREFIX)
            && !self.protected_collections.iter().any(|c| c == name)
    }
}
