//! Record selection criteria for store scans.

use crate::document::Document;
use serde_json::Value;
use std::collections::HashSet;

/// Conjunctive criteria over documents.
///
/// An empty filter matches everything. Each `with_*`/`excluding_*` call
/// narrows the selection further.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    ids: Option<HashSet<String>>,
    doc_type: Option<String>,
    excluded_types: Vec<String>,
    fields: Vec<(String, Value)>,
    exclude_pages: bool,
}

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        self.ids = Some(match self.ids.take() {
            Some(existing) => existing.intersection(&ids).cloned().collect(),
            None => ids,
        });
        self
    }

    /// Restricts to one document type.
    #[must_use]
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Excludes the given document types.
    #[must_use]
    pub fn excluding_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Requires a field to equal a value.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Excludes documents that sit in the page tree.
    #[must_use]
    pub fn excluding_pages(mut self) -> Self {
        self.exclude_pages = true;
        self
    }

    /// Returns the id restriction, if any.
    pub fn ids(&self) -> Option<&HashSet<String>> {
        self.ids.as_ref()
    }

    /// Returns true if the document satisfies every criterion.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(doc.id()) {
                return false;
            }
        }
        if let Some(doc_type) = &self.doc_type {
            if doc.doc_type() != Some(doc_type.as_str()) {
                return false;
            }
        }
        if let Some(doc_type) = doc.doc_type() {
            if self.excluded_types.iter().any(|t| t == doc_type) {
                return false;
            }
        }
        if self.exclude_pages && doc.is_page() {
            return false;
        }
        self.fields
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}
