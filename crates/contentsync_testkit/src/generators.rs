//! Property-based test generators using proptest.
//!
//! Provides strategies for generating document sets that satisfy the
//! stores' invariants: unique ids and unique slugs.

use crate::fixtures::article;
use contentsync_core::Document;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for generating slugs.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating sets of `0..max` distinct ids.
pub fn id_set_strategy(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex"),
        0..max,
    )
}

/// Strategy for generating `0..max` articles with unique ids and slugs.
pub fn articles_strategy(max: usize) -> impl Strategy<Value = Vec<Document>> {
    id_set_strategy(max).prop_map(|ids| {
        ids.into_iter()
            .enumerate()
            .map(|(i, id)| article(&id, &format!("article-{i}")).with("title", format!("Article {id}")))
            .collect()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for tests that spin up servers.
    #[must_use]
    pub fn network() -> Self {
        Self {
            cases: 8,
            max_shrink_iters: 20,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
