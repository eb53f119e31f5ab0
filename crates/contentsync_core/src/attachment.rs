//! Attachment records and their derived storage variants.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Group name of raster images, the only group with sized variants.
pub const IMAGES_GROUP: &str = "images";

/// Storage prefix of every attachment variant.
pub const ATTACHMENTS_PREFIX: &str = "/attachments";

/// Owner id field of live documents.
pub const DOC_IDS_FIELD: &str = "docIds";

/// Owner id field of trashed documents.
pub const TRASH_DOC_IDS_FIELD: &str = "trashDocIds";

/// A crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    /// Left offset.
    pub left: u32,
    /// Top offset.
    pub top: u32,
    /// Crop width.
    pub width: u32,
    /// Crop height.
    pub height: u32,
}

/// Typed view of a record in the attachments collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Slugified base file name.
    pub name: String,
    /// File extension without the dot.
    pub extension: String,
    /// Media group (`images` or a generic group).
    #[serde(default)]
    pub group: String,
    /// Crops in creation order.
    #[serde(default)]
    pub crops: Vec<Crop>,
    /// Ids of live owning documents.
    #[serde(default)]
    pub doc_ids: Vec<String>,
    /// Ids of trashed owning documents.
    #[serde(default)]
    pub trash_doc_ids: Vec<String>,
    /// Whether the binary variants are currently hidden.
    #[serde(default)]
    pub trash: bool,
}

/// One stored file derived from an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Path within the binary store.
    pub path: String,
    /// Whether the object is expected to be disabled.
    pub disabled: bool,
}

impl Attachment {
    /// Reads the typed view of an attachment document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] if required fields are missing.
    pub fn from_document(doc: &Document) -> CoreResult<Self> {
        serde_json::from_value(Value::Object(doc.as_map().clone()))
            .map_err(|e| CoreError::invalid_document(format!("attachment {}: {e}", doc.id())))
    }

    /// Returns true for image attachments.
    pub fn is_image(&self) -> bool {
        self.group == IMAGES_GROUP
    }

    /// Trash state implied by the ownership sets: no live owners and at
    /// least one trashed owner.
    pub fn should_be_trash(&self) -> bool {
        self.doc_ids.is_empty() && !self.trash_doc_ids.is_empty()
    }

    /// Path of the original upload.
    pub fn original_path(&self) -> String {
        format!(
            "{ATTACHMENTS_PREFIX}/{}-{}.{}",
            self.id, self.name, self.extension
        )
    }

    /// Enumerates every variant path: the original, each named size, and
    /// for each crop the cropped original plus each size. Non-image groups
    /// only have the original.
    pub fn variant_paths(&self, sizes: &[String]) -> Vec<String> {
        let mut paths = vec![self.original_path()];
        if !self.is_image() {
            return paths;
        }

        let base = format!("{ATTACHMENTS_PREFIX}/{}-{}", self.id, self.name);
        let ext = &self.extension;
        for size in sizes {
            paths.push(format!("{base}.{size}.{ext}"));
        }
        for crop in &self.crops {
            let crop_base = format!(
                "{base}.{}.{}.{}.{}",
                crop.left, crop.top, crop.width, crop.height
            );
            paths.push(format!("{crop_base}.{ext}"));
            for size in sizes {
                paths.push(format!("{crop_base}.{size}.{ext}"));
            }
        }
        paths
    }

    /// Variant paths paired with the visibility recorded on this attachment.
    pub fn variants(&self, sizes: &[String]) -> Vec<Variant> {
        self.variant_paths(sizes)
            .into_iter()
            .map(|path| Variant {
                path,
                disabled: self.trash,
            })
            .collect()
    }
}

/// Merges the ownership sets of `incoming` into `existing`.
///
/// `docIds` and `trashDocIds` become the union of both records, keeping
/// existing order and appending new ids. All other fields of `existing`
/// are replaced by those of `incoming`. Returns the merged document.
pub fn merge_ownership(existing: &Document, incoming: &Document) -> Document {
    let mut merged = incoming.clone();
    for field in [DOC_IDS_FIELD, TRASH_DOC_IDS_FIELD] {
        let mut ids = string_list(existing.get(field));
        let mut seen: HashSet<String> = ids.iter().cloned().collect();
        for id in string_list(incoming.get(field)) {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        merged.set(field, ids);
    }
    merged
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Finds ids of attachment objects embedded anywhere in a document
/// (`{"type": "attachment", "_id": ...}`), deduplicated.
///
/// Fields are walked in the document's key order, which is sorted, so an
/// id appears at its first occurrence in that order.
pub fn find_attachment_ids(doc: &Document) -> Vec<String> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    for value in doc.as_map().values() {
        walk_attachments(value, &mut seen, &mut ids);
    }
    ids
}

fn walk_attachments(value: &Value, seen: &mut HashSet<String>, ids: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("attachment") {
                if let Some(id) = map.get("_id").and_then(Value::as_str) {
                    if seen.insert(id.to_string()) {
                        ids.push(id.to_string());
                    }
                }
            }
            for nested in map.values() {
                walk_attachments(nested, seen, ids);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_attachments(item, seen, ids);
            }
        }
        _ => {}
    }
}
