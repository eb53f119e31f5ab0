//! # ContentSync Engine
//!
//! Sink side of content replication.
//!
//! This crate provides:
//! - Run option validation and peer resolution
//! - The import stream consumer (purge, insert or upsert, locale pairing)
//! - The attachment reconciler with its visibility retry policy
//! - The store-wide permission fix
//! - HTTP and mock transports behind the [`PeerTransport`] seam
//!
//! ## Architecture
//!
//! A run is a **pull**: the sink asks the source for a framed record
//! stream and commits it record by record.
//! 1. Import the stream (the sink is purged only after the marker)
//! 2. Copy the binary variants of the imported attachments
//! 3. Recompute attachment visibility across the whole sink
//!
//! ## Key Invariants
//!
//! - Protected types and collections are never written or purged
//! - Nothing is purged unless the stream's marker is valid
//! - Committed records survive an incomplete stream
//! - Attachment transfer failures never abort a run

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod import;
mod orchestrator;
mod reconcile;
mod transport;

pub use config::{Environment, Peer, RunOptions, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::HttpTransport;
pub use import::{ImportOptions, ImportReport, Importer};
pub use orchestrator::{Orchestrator, SyncPhase, SyncReport, SyncRun};
pub use reconcile::{fix_permissions, ReconcileReport, Reconciler, VisibilityRetryPolicy};
pub use transport::{ByteStream, MockTransport, PeerTransport};
