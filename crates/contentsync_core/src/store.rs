//! The document store seam.

use crate::document::Document;
use crate::error::CoreResult;
use crate::filter::Filter;

/// A collection-oriented document store.
///
/// Scans are paged by id: `find_page` returns up to `limit` matching
/// documents whose id sorts after `after_id`, in ascending id order, so
/// callers can enumerate arbitrarily large collections with bounded
/// memory.
///
/// # Invariants
///
/// - Ids are unique within a collection.
/// - In the primary document collection, `slug` is unique per
///   `workflowLocale`; writes violating this fail with
///   [`CoreError::UniqueConflict`](crate::CoreError::UniqueConflict).
///
/// # Implementors
///
/// - [`InMemoryDocumentStore`](crate::InMemoryDocumentStore)
/// - [`JsonFileDocumentStore`](crate::JsonFileDocumentStore)
pub trait DocumentStore: Send + Sync {
    /// Lists collection names, sorted.
    fn collections(&self) -> CoreResult<Vec<String>>;

    /// Fetches a document by id.
    fn get(&self, collection: &str, id: &str) -> CoreResult<Option<Document>>;

    /// Fetches one page of matching documents.
    fn find_page(
        &self,
        collection: &str,
        filter: &Filter,
        after_id: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<Document>>;

    /// Inserts a new document.
    ///
    /// Fails with `DuplicateId` if the id exists and `UniqueConflict` if a
    /// unique index rejects it.
    fn insert(&self, collection: &str, doc: Document) -> CoreResult<()>;

    /// Inserts or replaces a document by id. Returns true if a document
    /// was replaced.
    fn replace(&self, collection: &str, doc: Document) -> CoreResult<bool>;

    /// Deletes every matching document, returning how many were removed.
    fn delete_many(&self, collection: &str, filter: &Filter) -> CoreResult<usize>;

    /// Fetches the first matching document.
    fn find_one(&self, collection: &str, filter: &Filter) -> CoreResult<Option<Document>> {
        Ok(self.find_page(collection, filter, None, 1)?.into_iter().next())
    }

    /// Counts matching documents.
    fn count(&self, collection: &str, filter: &Filter) -> CoreResult<usize> {
        let mut count = 0;
        let mut after: Option<String> = None;
        loop {
            let page = self.find_page(collection, filter, after.as_deref(), 256)?;
            let Some(last) = page.last() else {
                return Ok(count);
            };
            after = Some(last.id().to_string());
            count += page.len();
        }
    }
}

/// Iterator over the pages of a filtered id-ordered scan.
///
/// A page size of zero is treated as one. Iteration stops after the first
/// empty page or the first error.
pub struct PageCursor<'a, S: ?Sized> {
    store: &'a S,
    collection: &'a str,
    filter: &'a Filter,
    page_size: usize,
    after: Option<String>,
    done: bool,
}

impl<'a, S: DocumentStore + ?Sized> PageCursor<'a, S> {
    /// Starts a scan at the beginning of the collection.
    pub fn new(store: &'a S, collection: &'a str, filter: &'a Filter, page_size: usize) -> Self {
        Self {
            store,
            collection,
            filter,
            page_size: page_size.max(1),
            after: None,
            done: false,
        }
    }
}

impl<S: DocumentStore + ?Sized> Iterator for PageCursor<'_, S> {
    type Item = CoreResult<Vec<Document>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = match self.store.find_page(
            self.collection,
            self.filter,
            self.after.as_deref(),
            self.page_size,
        ) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        match page.last() {
            Some(last) => {
                self.after = Some(last.id().to_string());
                Some(Ok(page))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Visits every matching document page by page.
///
/// The callback may return an error to stop the scan.
pub fn for_each_page<S, F, E>(
    store: &S,
    collection: &str,
    filter: &Filter,
    page_size: usize,
    mut f: F,
) -> Result<(), E>
where
    S: DocumentStore + ?Sized,
    F: FnMut(Vec<Document>) -> Result<(), E>,
    E: From<crate::CoreError>,
{
    for page in PageCursor::new(store, collection, filter, page_size) {
        f(page?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryDocumentStore;

    fn seeded(n: usize) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        for i in 0..n {
            store
                .insert("docs", Document::new(format!("d{i:02}"), "article"))
                .unwrap();
        }
        store
    }

    #[test]
    fn cursor_walks_all_pages_in_id_order() {
        let store = seeded(5);
        let filter = Filter::all();
        let pages: Vec<Vec<String>> = PageCursor::new(&store, "docs", &filter, 2)
            .map(|page| page.unwrap().iter().map(|d| d.id().to_string()).collect())
            .collect();

        assert_eq!(
            pages,
            vec![
                vec!["d00".to_string(), "d01".to_string()],
                vec!["d02".to_string(), "d03".to_string()],
                vec!["d04".to_string()],
            ]
        );
    }

    #[test]
    fn cursor_with_zero_page_size_still_scans() {
        let store = seeded(3);
        let filter = Filter::all();
        let total: usize = PageCursor::new(&store, "docs", &filter, 0)
            .map(|page| page.unwrap().len())
            .sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn cursor_on_missing_collection_is_empty() {
        let store = seeded(0);
        let filter = Filter::all();
        assert_eq!(PageCursor::new(&store, "nothing", &filter, 10).count(), 0);
    }
}
