//! Schema descriptions for document and widget types.
//!
//! The host platform owns validation; replication only needs to know
//! where references to other documents live. A schema is therefore a
//! list of named fields, each tagged with a closed set of kinds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Any plain value (text, number, boolean, area, ...).
    Scalar,
    /// Holds one referenced document id.
    SingleRef {
        /// Type of the referenced documents, if constrained.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        with_type: Option<String>,
    },
    /// Holds an ordered list of referenced document ids.
    MultiRef {
        /// Type of the referenced documents, if constrained.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        with_type: Option<String>,
    },
    /// Holds a list of sub-objects sharing one schema.
    Array {
        /// Schema of each element.
        schema: Vec<Field>,
    },
    /// Holds one sub-object.
    Object {
        /// Schema of the nested object.
        schema: Vec<Field>,
    },
}

/// A named schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Property name in the holder object.
    pub name: String,
    /// Field kind.
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    /// A plain value field.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
        }
    }

    /// A single-reference field.
    pub fn single_ref(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::SingleRef { with_type: None },
        }
    }

    /// A multi-reference field.
    pub fn multi_ref(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::MultiRef { with_type: None },
        }
    }

    /// An array field with the given element schema.
    pub fn array(name: impl Into<String>, schema: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Array { schema },
        }
    }

    /// An object field with the given sub-schema.
    pub fn object(name: impl Into<String>, schema: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Object { schema },
        }
    }

    /// Returns true for single- and multi-reference fields.
    pub fn is_join(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::SingleRef { .. } | FieldKind::MultiRef { .. }
        )
    }
}

/// Schemas of all known document and widget types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaRegistry {
    /// Document type name to schema.
    pub types: HashMap<String, Vec<Field>>,
    /// Widget type name to schema.
    pub widgets: HashMap<String, Vec<Field>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document type.
    #[must_use]
    pub fn with_doc_type(mut self, name: impl Into<String>, schema: Vec<Field>) -> Self {
        self.types.insert(name.into(), schema);
        self
    }

    /// Registers a widget type.
    #[must_use]
    pub fn with_widget_type(mut self, name: impl Into<String>, schema: Vec<Field>) -> Self {
        self.widgets.insert(name.into(), schema);
        self
    }

    /// Returns the schema of a document type.
    pub fn doc_schema(&self, doc_type: &str) -> Option<&[Field]> {
        self.types.get(doc_type).map(Vec::as_slice)
    }

    /// Returns the schema of a widget type.
    pub fn widget_schema(&self, widget_type: &str) -> Option<&[Field]> {
        self.widgets.get(widget_type).map(Vec::as_slice)
    }
}
