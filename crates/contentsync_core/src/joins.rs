//! Forward join discovery.
//!
//! Given a document, find every field holding references to other
//! documents: those in its own schema (including inside array and object
//! sub-schemas) and those in the schemas of widgets embedded in its areas.
//! Back-references are never followed. Nothing here fails: documents with
//! no type, unknown types, widgets with no type and malformed values are
//! simply skipped.

use crate::document::Document;
use crate::schema::{Field, FieldKind, SchemaRegistry};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A join field found in a document or one of its widgets.
#[derive(Debug, Clone, Copy)]
pub struct Join<'a> {
    /// The document or widget object holding the field.
    pub holder: &'a Map<String, Value>,
    /// The join field definition.
    pub field: &'a Field,
    /// The current value, if the holder has one.
    pub value: Option<&'a Value>,
}

/// Finds all forward joins of a document and its embedded widgets.
pub fn find_joins<'a>(doc: &'a Document, registry: &'a SchemaRegistry) -> Vec<Join<'a>> {
    let mut joins = Vec::new();

    if let Some(schema) = doc.doc_type().and_then(|t| registry.doc_schema(t)) {
        collect_schema_joins(doc.as_map(), schema, &mut joins);
    }

    for widget in area_widgets(doc) {
        let Some(schema) = widget
            .get("type")
            .and_then(Value::as_str)
            .and_then(|t| registry.widget_schema(t))
        else {
            continue;
        };
        collect_schema_joins(widget, schema, &mut joins);
    }

    joins
}

/// Flattens join values into distinct ids, in first-seen order.
pub fn referenced_ids(joins: &[Join<'_>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut push = |id: &str| {
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    };

    for join in joins {
        match join.value {
            Some(Value::String(id)) => push(id),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).for_each(&mut push),
            _ => {}
        }
    }

    ids
}

/// Returns every widget reachable through the document's areas, including
/// widgets in areas nested inside other widgets.
pub fn area_widgets(doc: &Document) -> Vec<&Map<String, Value>> {
    let mut widgets = Vec::new();
    for value in doc.as_map().values() {
        walk_areas(value, &mut widgets);
    }
    widgets
}

fn is_area(map: &Map<String, Value>) -> bool {
    map.get("type").and_then(Value::as_str) == Some("area")
}

fn walk_areas<'a>(value: &'a Value, widgets: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Object(map) if is_area(map) => {
            if let Some(Value::Array(items)) = map.get("items") {
                for item in items {
                    if let Value::Object(widget) = item {
                        widgets.push(widget);
                        for nested in widget.values() {
                            walk_areas(nested, widgets);
                        }
                    }
                }
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                walk_areas(nested, widgets);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_areas(item, widgets);
            }
        }
        _ => {}
    }
}

fn collect_schema_joins<'a>(
    holder: &'a Map<String, Value>,
    schema: &'a [Field],
    joins: &mut Vec<Join<'a>>,
) {
    for field in schema {
        match &field.kind {
            FieldKind::SingleRef { .. } | FieldKind::MultiRef { .. } => joins.push(Join {
                holder,
                field,
                value: holder.get(&field.name),
            }),
            FieldKind::Array { schema } => {
                if let Some(Value::Array(items)) = holder.get(&field.name) {
                    for item in items {
                        if let Value::Object(element) = item {
                            collect_schema_joins(element, schema, joins);
                        }
                    }
                }
            }
            FieldKind::Object { schema } => {
                if let Some(Value::Object(nested)) = holder.get(&field.name) {
                    collect_schema_joins(nested, schema, joins);
                }
            }
            FieldKind::Scalar => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_doc_type(
                "article",
                vec![
                    Field::scalar("title"),
                    Field::single_ref("authorId"),
                    Field::multi_ref("tagIds"),
                    Field::array("sources", vec![Field::single_ref("sourceId")]),
                    Field::object("seo", vec![Field::single_ref("imageId")]),
                ],
            )
            .with_widget_type("link", vec![Field::multi_ref("pageIds")])
            .with_widget_type("plain", vec![Field::scalar("text")])
    }

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn untyped_document_has_no_joins() {
        let registry = registry();
        let d = doc(json!({"_id": "x", "authorId": "p1"}));
        assert!(find_joins(&d, &registry).is_empty());
    }

    #[test]
    fn unknown_type_has_no_schema_joins() {
        let registry = registry();
        let d = doc(json!({"_id": "x", "type": "mystery", "authorId": "p1"}));
        assert!(find_joins(&d, &registry).is_empty());
    }

    #[test]
    fn top_level_nested_and_array_joins() {
        let registry = registry();
        let d = doc(json!({
            "_id": "a1",
            "type": "article",
            "authorId": "p1",
            "tagIds": ["t1", "t2"],
            "sources": [{"sourceId": "s1"}, {"sourceId": "s2"}, "garbage"],
            "seo": {"imageId": "i1"}
        }));

        let joins = find_joins(&d, &registry);
        let names: Vec<_> = joins.iter().map(|j| j.field.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["authorId", "tagIds", "sourceId", "sourceId", "imageId"]
        );
        assert_eq!(
            referenced_ids(&joins),
            vec!["p1", "t1", "t2", "s1", "s2", "i1"]
        );
    }

    #[test]
    fn missing_join_values_are_reported_without_ids() {
        let registry = registry();
        let d = doc(json!({"_id": "a1", "type": "article", "seo": "not an object"}));
        let joins = find_joins(&d, &registry);
        assert_eq!(joins.len(), 2);
        assert!(joins.iter().all(|j| j.value.is_none()));
        assert!(referenced_ids(&joins).is_empty());
    }

    #[test]
    fn widgets_in_areas_are_holders() {
        let registry = registry();
        let d = doc(json!({
            "_id": "a1",
            "type": "article",
            "body": {
                "type": "area",
                "items": [
                    {"_id": "w1", "type": "link", "pageIds": ["p9"]},
                    {"_id": "w2", "type": "plain", "text": "hi"},
                    {"_id": "w3", "pageIds": ["ignored"]},
                    {"_id": "w4", "type": "obsolete", "pageIds": ["ignored"]}
                ]
            }
        }));

        let joins = find_joins(&d, &registry);
        let widget_joins: Vec<_> = joins
            .iter()
            .filter(|j| j.field.name == "pageIds")
            .collect();
        assert_eq!(widget_joins.len(), 1);
        assert_eq!(widget_joins[0].holder.get("_id"), Some(&json!("w1")));
        assert!(referenced_ids(&joins).contains(&"p9".to_string()));
        assert!(!referenced_ids(&joins).contains(&"ignored".to_string()));
    }

    #[test]
    fn nested_areas_inside_widgets_are_walked() {
        let registry = registry();
        let d = doc(json!({
            "_id": "a1",
            "type": "untyped-page",
            "columns": [{
                "left": {
                    "type": "area",
                    "items": [{
                        "type": "plain",
                        "inner": {
                            "type": "area",
                            "items": [{"type": "link", "pageIds": "p2"}]
                        }
                    }]
                }
            }]
        }));

        assert_eq!(area_widgets(&d).len(), 2);
        let joins = find_joins(&d, &registry);
        assert_eq!(referenced_ids(&joins), vec!["p2"]);
    }

    #[test]
    fn duplicate_ids_collapse() {
        let registry = registry();
        let d = doc(json!({
            "_id": "a1",
            "type": "article",
            "authorId": "p1",
            "tagIds": ["p1", "t1", "t1"]
        }));
        assert_eq!(referenced_ids(&find_joins(&d, &registry)), vec!["p1", "t1"]);
    }
}
