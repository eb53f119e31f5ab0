//! # ContentSync Server
//!
//! Source-side HTTP endpoints for ContentSync.
//!
//! This crate provides:
//! - `GET /content`: the streaming, backpressure-respecting export
//! - `GET /uploadfs`: binary fetch by path, including disabled objects
//! - `GET /uploads/*`: the public URL space of the binary store
//! - API key authentication and an origin check with an explicit
//!   allow-list
//!
//! # Architecture
//!
//! Handlers share one [`HandlerContext`] holding the document store, the
//! binary store, the schema registry and the query capability. The export
//! producer runs as its own task feeding the response body through a
//! bounded channel; see [`ExportPlan`] and [`FrameSink`].
//!
//! Every failure is answered with a generic 4xx status. Details only go to
//! the log.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod context;
mod error;
mod export;
mod origin;
mod server;
mod uploadfs;

pub use auth::ApiKeyValidator;
pub use config::ServerConfig;
pub use context::HandlerContext;
pub use error::{ServerError, ServerResult};
pub use export::{channel_body, ChannelSink, ExportPlan, ExportStats, FrameSink};
pub use origin::OriginPolicy;
pub use server::{router, ContentServer};
