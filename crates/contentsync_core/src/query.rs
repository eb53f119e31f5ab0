//! The host query capability used to resolve export criteria.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;
use crate::store::{for_each_page, DocumentStore};
use crate::types::DOCS_COLLECTION;
use serde_json::{Map, Value};

/// Resolves opaque criteria into concrete document ids.
///
/// The export endpoint forwards the `query` parameter verbatim; the source
/// platform decides what it means. Implementations only ever look at the
/// primary document collection.
pub trait DocumentQuery: Send + Sync {
    /// Returns the ids of documents of `doc_type` matching `criteria`.
    fn find_ids(
        &self,
        store: &dyn DocumentStore,
        doc_type: &str,
        criteria: &str,
    ) -> CoreResult<Vec<String>>;
}

/// Criteria given as a JSON object of field equalities.
///
/// `{"color": "red", "tagIds": "t1"}` matches documents whose `color` is
/// `"red"` and whose `tagIds` equals `"t1"` or is an array containing it.
#[derive(Debug, Clone)]
pub struct JsonCriteriaQuery {
    page_size: usize,
}

impl Default for JsonCriteriaQuery {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl JsonCriteriaQuery {
    /// Creates a query capability with the default scan page size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scan page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Parses criteria text into a field map.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] unless the text is a JSON object.
    pub fn parse(criteria: &str) -> CoreResult<Map<String, Value>> {
        match serde_json::from_str(criteria) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::invalid_query("criteria must be a JSON object")),
            Err(e) => Err(CoreError::invalid_query(e.to_string())),
        }
    }

    fn matches(criteria: &Map<String, Value>, doc: &Document) -> bool {
        criteria.iter().all(|(field, expected)| match doc.get(field) {
            Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }
}

impl DocumentQuery for JsonCriteriaQuery {
    fn find_ids(
        &self,
        store: &dyn DocumentStore,
        doc_type: &str,
        criteria: &str,
    ) -> CoreResult<Vec<String>> {
        let criteria = Self::parse(criteria)?;
        let filter = Filter::all().with_type(doc_type);
        let mut ids = Vec::new();
        for_each_page(store, DOCS_COLLECTION, &filter, self.page_size, |page| {
            ids.extend(
                page.iter()
                    .filter(|doc| Self::matches(&criteria, doc))
                    .map(|doc| doc.id().to_string()),
            );
            Ok::<_, CoreError>(())
        })?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use serde_json::json;

    fn store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .seed(
                DOCS_COLLECTION,
                [
                    Document::new("a", "article")
                        .with("color", "red")
                        .with("tagIds", json!(["t1", "t2"])),
                    Document::new("b", "article").with("color", "blue"),
                    Document::new("c", "event").with("color", "red"),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn equality_within_type() {
        let ids = JsonCriteriaQuery::new()
            .find_ids(&store(), "article", r#"{"color": "red"}"#)
            .unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn array_fields_match_by_containment() {
        let ids = JsonCriteriaQuery::new()
            .with_page_size(1)
            .find_ids(&store(), "article", r#"{"tagIds": "t2"}"#)
            .unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn empty_criteria_matches_type() {
        let ids = JsonCriteriaQuery::new()
            .find_ids(&store(), "article", "{}")
            .unwrap();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn non_object_criteria_rejected() {
        let query = JsonCriteriaQuery::new();
        assert!(matches!(
            query.find_ids(&store(), "article", "[1]"),
            Err(CoreError::InvalidQuery { .. })
        ));
        assert!(query.find_ids(&store(), "article", "not json").is_err());
    }
}
