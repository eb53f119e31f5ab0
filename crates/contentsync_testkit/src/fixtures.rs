//! Document and store fixtures.
//!
//! Builders for the record shapes the replication tests keep needing:
//! typed documents, image and file attachments, a small blog schema and
//! stores seeded from them.

use contentsync_core::{
    Document, Field, InMemoryDocumentStore, JsonFileDocumentStore, SchemaRegistry,
    ATTACHMENTS_COLLECTION, DOCS_COLLECTION, PATH_FIELD, SLUG_FIELD, WORKFLOW_GUID_FIELD,
    WORKFLOW_LOCALE_FIELD,
};
use contentsync_storage::InMemoryBinaryStore;
use serde_json::json;
use tempfile::TempDir;

/// API key used by test sources.
pub const TEST_API_KEY: &str = "test-api-key";

/// An article with a slug.
pub fn article(id: &str, slug: &str) -> Document {
    Document::new(id, "article").with(SLUG_FIELD, slug)
}

/// An article joined to an author and tags.
pub fn article_with_joins(id: &str, slug: &str, author: &str, tags: &[&str]) -> Document {
    article(id, slug)
        .with("authorId", author)
        .with("tagIds", json!(tags))
}

/// A document of an arbitrary type.
pub fn doc(id: &str, doc_type: &str) -> Document {
    Document::new(id, doc_type)
}

/// A permission group, a protected type by default.
pub fn group(id: &str) -> Document {
    Document::new(id, "group").with("title", id)
}

/// A page document.
pub fn page(id: &str, slug: &str) -> Document {
    Document::new(id, "home")
        .with(SLUG_FIELD, slug)
        .with(PATH_FIELD, slug)
}

/// Adds workflow locale fields to a document.
pub fn localized(doc: Document, locale: &str, guid: &str) -> Document {
    doc.with(WORKFLOW_LOCALE_FIELD, locale)
        .with(WORKFLOW_GUID_FIELD, guid)
}

/// An image attachment owned by `doc_ids`.
pub fn image_attachment(id: &str, name: &str, doc_ids: &[&str]) -> Document {
    attachment(id, name, "jpg", "images", doc_ids, &[])
}

/// A generic file attachment owned by `doc_ids`.
pub fn file_attachment(id: &str, name: &str, extension: &str, doc_ids: &[&str]) -> Document {
    attachment(id, name, extension, "office", doc_ids, &[])
}

/// An attachment record with explicit ownership.
///
/// The trash flag is derived from the ownership sets.
pub fn attachment(
    id: &str,
    name: &str,
    extension: &str,
    group: &str,
    doc_ids: &[&str],
    trash_doc_ids: &[&str],
) -> Document {
    let trash = doc_ids.is_empty() && !trash_doc_ids.is_empty();
    Document::from_value(json!({
        "_id": id,
        "type": "attachment",
        "name": name,
        "extension": extension,
        "group": group,
        "crops": [],
        "docIds": doc_ids,
        "trashDocIds": trash_doc_ids,
        "trash": trash,
    }))
    .expect("attachment fixture is a valid document")
}

/// Path of an attachment's original upload.
pub fn original_path(id: &str, name: &str, extension: &str) -> String {
    format!("/attachments/{id}-{name}.{extension}")
}

/// A schema with articles joined to people and tags, plus a widget that
/// joins to products.
pub fn blog_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_doc_type(
            "article",
            vec![
                Field::scalar("title"),
                Field::single_ref("authorId"),
                Field::multi_ref("tagIds"),
            ],
        )
        .with_doc_type("person", vec![Field::scalar("name")])
        .with_widget_type("product-list", vec![Field::multi_ref("productIds")])
}

/// A document store seeded with `docs` in the docs collection.
pub fn seeded_store<I>(docs: I) -> InMemoryDocumentStore
where
    I: IntoIterator<Item = Document>,
{
    let store = InMemoryDocumentStore::new();
    store
        .seed(DOCS_COLLECTION, docs)
        .expect("seed documents are unique");
    store
}

/// Seeds attachment records into a store.
pub fn seed_attachments<I>(store: &InMemoryDocumentStore, attachments: I)
where
    I: IntoIterator<Item = Document>,
{
    store
        .seed(ATTACHMENTS_COLLECTION, attachments)
        .expect("seed attachments are unique");
}

/// A binary store whose public URLs are served under `/uploads`.
pub fn uploads_store() -> InMemoryBinaryStore {
    InMemoryBinaryStore::new("/uploads")
}

/// A file-backed document store in a temporary directory.
pub struct TempJsonStore {
    /// The store.
    pub store: JsonFileDocumentStore,
    /// Kept alive so the directory outlives the store.
    pub dir: TempDir,
}

impl TempJsonStore {
    /// Opens an empty store in a new temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = JsonFileDocumentStore::open(dir.path()).expect("Failed to open store");
        Self { store, dir }
    }
}

impl Default for TempJsonStore {
    fn default() -> Self {
        Self::new()
    }
}
