//! # ContentSync Storage
//!
//! Binary object stores for media attachments.
//!
//! This crate provides the lowest-level media abstraction for ContentSync.
//! Stores are **path-addressed byte stores** with a visibility flag: an
//! object is either enabled (publicly reachable) or disabled (hidden,
//! typically because every document using it is in the trash).
//!
//! ## Available Stores
//!
//! - [`InMemoryBinaryStore`] - For testing
//! - [`FileBinaryStore`] - For a local uploads directory
//!
//! ## Example
//!
//! ```rust
//! use contentsync_storage::{BinaryStore, InMemoryBinaryStore};
//!
//! let store = InMemoryBinaryStore::new("/uploads");
//! store.put("/attachments/x-file.pdf", b"%PDF".to_vec()).unwrap();
//! assert_eq!(store.public_url("/attachments/x-file.pdf"), "/uploads/attachments/x-file.pdf");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_path, BinaryStore};
pub use error::{StorageError, StorageResult};
pub use file::FileBinaryStore;
pub use memory::InMemoryBinaryStore;
