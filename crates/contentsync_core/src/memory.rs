//! In-memory document store.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;
use crate::store::DocumentStore;
use crate::types::{DOCS_COLLECTION, SLUG_FIELD};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Slug uniqueness key: (workflow locale, slug).
type SlugKey = (Option<String>, String);

#[derive(Debug, Default, Clone)]
struct CollectionData {
    docs: BTreeMap<String, Document>,
    slugs: HashMap<SlugKey, String>,
}

impl CollectionData {
    fn slug_key(collection: &str, doc: &Document) -> Option<SlugKey> {
        if collection != DOCS_COLLECTION {
            return None;
        }
        doc.slug()
            .map(|slug| (doc.workflow_locale().map(str::to_string), slug.to_string()))
    }

    fn check_slug(&self, collection: &str, doc: &Document) -> CoreResult<Option<SlugKey>> {
        let Some(key) = Self::slug_key(collection, doc) else {
            return Ok(None);
        };
        match self.slugs.get(&key) {
            Some(owner) if owner != doc.id() => Err(CoreError::UniqueConflict {
                collection: collection.to_string(),
                field: SLUG_FIELD.to_string(),
                value: key.1,
            }),
            _ => Ok(Some(key)),
        }
    }

    fn remove(&mut self, collection: &str, id: &str) -> Option<Document> {
        let doc = self.docs.remove(id)?;
        if let Some(key) = Self::slug_key(collection, &doc) {
            self.slugs.remove(&key);
        }
        Some(doc)
    }
}

/// A document store held entirely in memory.
///
/// Collections are created on first write. The primary document
/// collection keeps a slug index scoped by workflow locale.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<String, CollectionData>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection if it does not exist.
    pub fn create_collection(&self, collection: &str) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default();
    }

    /// Inserts each document, failing on the first rejected write.
    ///
    /// # Errors
    ///
    /// Propagates the first insert error.
    pub fn seed<I>(&self, collection: &str, docs: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = Document>,
    {
        for doc in docs {
            self.insert(collection, doc)?;
        }
        Ok(())
    }

    /// Returns every document of every collection, in id order.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Document>> {
        self.collections
            .read()
            .iter()
            .map(|(name, data)| (name.clone(), data.docs.values().cloned().collect()))
            .collect()
    }

    /// Returns all ids in a collection, in order.
    pub fn ids(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .get(collection)
            .map(|data| data.docs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn collections(&self) -> CoreResult<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn get(&self, collection: &str, id: &str) -> CoreResult<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|data| data.docs.get(id))
            .cloned())
    }

    fn find_page(
        &self,
        collection: &str,
        filter: &Filter,
        after_id: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<Document>> {
        let collections = self.collections.read();
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let lower = match after_id {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };
        Ok(data
            .docs
            .range((lower, Bound::Unbounded))
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert(&self, collection: &str, doc: Document) -> CoreResult<()> {
        let mut collections = self.collections.write();
        let data = collections.entry(collection.to_string()).or_default();
        if data.docs.contains_key(doc.id()) {
            return Err(CoreError::DuplicateId {
                collection: collection.to_string(),
                id: doc.id().to_string(),
            });
        }
        if let Some(key) = data.check_slug(collection, &doc)? {
            data.slugs.insert(key, doc.id().to_string());
        }
        data.docs.insert(doc.id().to_string(), doc);
        Ok(())
    }

    fn replace(&self, collection: &str, doc: Document) -> CoreResult<bool> {
        let mut collections = self.collections.write();
        let data = collections.entry(collection.to_string()).or_default();
        let key = data.check_slug(collection, &doc)?;
        let replaced = data.remove(collection, doc.id()).is_some();
        if let Some(key) = key {
            data.slugs.insert(key, doc.id().to_string());
        }
        data.docs.insert(doc.id().to_string(), doc);
        Ok(replaced)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> CoreResult<usize> {
        let mut collections = self.collections.write();
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let doomed: Vec<String> = data
            .docs
            .values()
            .filter(|doc| filter.matches(doc))
            .map(|doc| doc.id().to_string())
            .collect();
        for id in &doomed {
            data.remove(collection, id);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, slug: &str) -> Document {
        Document::new(id, "article").with("slug", slug)
    }

    #[test]
    fn insert_and_get() {
        let store = InMemoryDocumentStore::new();
        store.insert("docs", article("a", "hello")).unwrap();
        assert_eq!(store.get("docs", "a").unwrap().unwrap().slug(), Some("hello"));
        assert!(store.get("docs", "b").unwrap().is_none());
        assert!(store.get("other", "a").unwrap().is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = InMemoryDocumentStore::new();
        store.insert("docs", article("a", "one")).unwrap();
        let err = store.insert("docs", article("a", "two")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
    }

    #[test]
    fn slug_unique_per_locale() {
        let store = InMemoryDocumentStore::new();
        store
            .insert("docs", article("a", "home").with("workflowLocale", "en"))
            .unwrap();
        store
            .insert("docs", article("b", "home").with("workflowLocale", "en-draft"))
            .unwrap();
        let err = store
            .insert("docs", article("c", "home").with("workflowLocale", "en"))
            .unwrap_err();
        assert_eq!(err.conflicting_field(), Some("slug"));
    }

    #[test]
    fn slugs_only_indexed_in_docs() {
        let store = InMemoryDocumentStore::new();
        store.insert("pieces", article("a", "x")).unwrap();
        store.insert("pieces", article("b", "x")).unwrap();
        assert_eq!(store.ids("pieces").len(), 2);
    }

    #[test]
    fn replace_upserts_and_moves_slug() {
        let store = InMemoryDocumentStore::new();
        assert!(!store.replace("docs", article("a", "old")).unwrap());
        assert!(store.replace("docs", article("a", "new")).unwrap());
        store.insert("docs", article("b", "old")).unwrap();

        let err = store.replace("docs", article("b", "new")).unwrap_err();
        assert!(matches!(err, CoreError::UniqueConflict { .. }));
        assert_eq!(store.get("docs", "b").unwrap().unwrap().slug(), Some("old"));
    }

    #[test]
    fn paging_walks_in_id_order() {
        let store = InMemoryDocumentStore::new();
        for id in ["d", "b", "a", "c", "e"] {
            store.insert("docs", Document::new(id, "article")).unwrap();
        }

        let first = store.find_page("docs", &Filter::all(), None, 2).unwrap();
        let ids: Vec<_> = first.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let next = store.find_page("docs", &Filter::all(), Some("b"), 2).unwrap();
        let ids: Vec<_> = next.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["c", "d"]);

        assert_eq!(store.count("docs", &Filter::all()).unwrap(), 5);
    }

    #[test]
    fn delete_many_frees_slugs() {
        let store = InMemoryDocumentStore::new();
        store.insert("docs", article("a", "x")).unwrap();
        store.insert("docs", Document::new("g", "group")).unwrap();

        let removed = store
            .delete_many("docs", &Filter::all().excluding_types(["group"]))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.ids("docs"), vec!["g"]);
        store.insert("docs", article("b", "x")).unwrap();
    }

    #[test]
    fn collections_listed_sorted() {
        let store = InMemoryDocumentStore::new();
        store.create_collection("zeta");
        store.insert("attachments", Document::new("a", "attachment")).unwrap();
        assert_eq!(store.collections().unwrap(), vec!["attachments", "zeta"]);
    }
}
