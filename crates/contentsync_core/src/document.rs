//! Schemaless document representation.

use crate::error::{CoreError, CoreResult};
use crate::types::{
    ID_FIELD, PATH_FIELD, SLUG_FIELD, TYPE_FIELD, WORKFLOW_GUID_FIELD, WORKFLOW_LOCALE_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored record: a JSON object with a string `_id`.
///
/// Every collection holds documents; the primary collection additionally
/// uses `type`, `slug` and the workflow fields. Accessors return `None`
/// rather than failing when a field is absent or has an unexpected shape,
/// since legacy records and light projections are common.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates a document with the given id and type.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ID_FIELD.into(), Value::String(id.into()));
        map.insert(TYPE_FIELD.into(), Value::String(doc_type.into()));
        Self(map)
    }

    /// Wraps a JSON value, requiring an object with a string `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] for non-objects or a missing id.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(CoreError::invalid_document(format!(
                "expected object, got {other}"
            ))),
        }
    }

    /// Wraps a JSON map, requiring a string `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] if `_id` is missing or not a
    /// string.
    pub fn from_map(map: Map<String, Value>) -> CoreResult<Self> {
        match map.get(ID_FIELD) {
            Some(Value::String(_)) => Ok(Self(map)),
            _ => Err(CoreError::invalid_document("missing string _id")),
        }
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        self.str_field(ID_FIELD).unwrap_or_default()
    }

    /// Returns the document type.
    pub fn doc_type(&self) -> Option<&str> {
        self.str_field(TYPE_FIELD)
    }

    /// Returns the slug.
    pub fn slug(&self) -> Option<&str> {
        self.str_field(SLUG_FIELD)
    }

    /// Returns the workflow locale tag.
    pub fn workflow_locale(&self) -> Option<&str> {
        self.str_field(WORKFLOW_LOCALE_FIELD)
    }

    /// Returns the workflow grouping identity.
    pub fn workflow_guid(&self) -> Option<&str> {
        self.str_field(WORKFLOW_GUID_FIELD)
    }

    /// Returns true if the document sits in the page tree.
    pub fn is_page(&self) -> bool {
        self.0.contains_key(PATH_FIELD)
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a string field value.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets a field value, returning the previous one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Replaces the document id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(ID_FIELD.into(), Value::String(id.into()));
    }

    /// Sets a field and returns the document, for building fixtures.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwraps into the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Converts into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
