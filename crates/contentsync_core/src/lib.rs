//! # ContentSync Core
//!
//! Document model and stores for ContentSync.
//!
//! This crate provides:
//! - The schemaless [`Document`] and typed [`Attachment`] views
//! - Schema descriptions and the forward join resolver
//! - The [`DocumentStore`] seam with in-memory and file-backed stores
//! - The [`DocumentQuery`] capability used to resolve export criteria
//! - Shared replication settings ([`ContentConfig`])

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachment;
mod config;
mod document;
mod error;
mod filter;
pub mod joins;
mod json_file;
mod memory;
mod query;
mod schema;
mod store;
mod types;

pub use attachment::{
    find_attachment_ids, merge_ownership, Attachment, Crop, Variant, ATTACHMENTS_PREFIX,
    DOC_IDS_FIELD, IMAGES_GROUP, TRASH_DOC_IDS_FIELD,
};
pub use config::ContentConfig;
pub use document::Document;
pub use error::{CoreError, CoreResult};
pub use filter::Filter;
pub use joins::{find_joins, referenced_ids, Join};
pub use json_file::JsonFileDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use query::{DocumentQuery, JsonCriteriaQuery};
pub use schema::{Field, FieldKind, SchemaRegistry};
pub use store::{for_each_page, DocumentStore, PageCursor};
pub use types::{
    paired_locale, ATTACHMENTS_COLLECTION, DOCS_COLLECTION, DRAFT_SUFFIX, ID_FIELD, PATH_FIELD,
    SLUG_FIELD, SYSTEM_COLLECTION_PREFIX, TYPE_FIELD, WORKFLOW_GUID_FIELD, WORKFLOW_LOCALE_FIELD,
};
