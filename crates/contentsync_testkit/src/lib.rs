//! # ContentSync Testkit
//!
//! Test utilities for ContentSync.
//!
//! This crate provides:
//! - Document, attachment and schema fixtures
//! - Seeded in-memory and file-backed stores
//! - Property-based test generators using proptest
//! - A harness that serves a source over real HTTP on an ephemeral port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use contentsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pulls_articles() {
//!     let source = TestSource::start(SourceFixture::new().with_docs([article("1", "one")])).await;
//!     // ... run a sync against source.base_url()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
