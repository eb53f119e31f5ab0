//! # ContentSync Protocol
//!
//! Wire contract between an exporting source and an importing sink.
//!
//! This crate provides:
//! - [`Envelope`], the tagged union carried in each stream frame
//! - [`EnvelopeReader`], which validates the stream grammar incrementally
//! - Endpoint paths, query parameter types and API key header helpers
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod endpoint;
mod envelope;
mod error;
mod reader;

pub use endpoint::{
    authorization_value, parse_api_key, BinaryFetchParams, ExportParams, API_KEY_SCHEME,
    CONTENT_PATH, STREAM_CONTENT_TYPE, UPLOADFS_PATH, UPLOADS_PREFIX,
};
pub use envelope::{Envelope, PROTOCOL_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use reader::{EnvelopeReader, StreamEvent};
