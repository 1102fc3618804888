//! Documents are schemaless JSON objects. Every entity type shares the same
//! representation and is told apart by its `_schemaName` discriminator.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const SCHEMA_FIELD: &str = "_schemaName";
pub const READ_FIELD: &str = "read";
pub const TAGS_FIELD: &str = "tags";
pub const DELETED_FIELD: &str = "isDeleted";

/// Values reachable at a dotted path. Arrays met along the way fan out, so
/// `a.b` against `{a: [{b: 1}, {b: 2}]}` yields both `1` and `2`.
pub fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*first) {
            walk(value, rest, &mut out);
        }
    }
    out
}

fn walk<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*segment) {
                walk(next, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(next) = items.get(index) {
                    walk(next, rest, out);
                }
                return;
            }
            for item in items {
                if let Value::Object(map) = item {
                    if let Some(next) = map.get(*segment) {
                        walk(next, rest, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Strict lookup through nested objects only.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Sets a value at a dotted path, creating intermediate objects. A non-object
/// value in the way is replaced.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, tail)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, tail, value);
            }
        }
    }
}

pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, tail)) => match doc.get_mut(head) {
            Some(Value::Object(child)) => remove_path(child, tail),
            _ => None,
        },
    }
}

/// Copies only the listed paths into a new document. Paths that are absent
/// in the source are skipped rather than written as null.
pub fn project(doc: &Document, paths: &BTreeSet<String>) -> Document {
    let mut out = Document::new();
    for path in paths {
        if let Some(value) = get_path(doc, path) {
            set_path(&mut out, path, value.clone());
        }
    }
    out
}

/// Normalizes a reference to its id string: plain strings and numbers, an
/// embedded document carrying `_id`, or an extended-JSON `{"$oid": ...}`.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("$oid")
            .or_else(|| map.get(ID_FIELD))
            .and_then(id_string),
        _ => None,
    }
}

pub fn document_id(doc: &Document) -> Option<String> {
    doc.get(ID_FIELD).and_then(id_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn resolve_fans_out_over_arrays() {
        let d = doc(json!({"a": [{"b": 1}, {"b": 2}, {"c": 3}]}));
        let values = resolve_path(&d, "a.b");
        assert_eq!(values, vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn resolve_supports_positional_index() {
        let d = doc(json!({"coords": [[-123.1, 49.2]]}));
        assert_eq!(resolve_path(&d, "coords.0"), vec![&json!([-123.1, 49.2])]);
    }

    #[test]
    fn project_keeps_nested_paths_only() {
        let d = doc(json!({"name": "A", "client": {"name": "B", "phone": "555"}, "secret": 1}));
        let paths: BTreeSet<String> = ["name", "client.name", "missing"].iter().map(|s| s.to_string()).collect();
        let projected = project(&d, &paths);
        assert_eq!(Value::Object(projected), json!({"name": "A", "client": {"name": "B"}}));
    }

    #[test]
    fn id_string_reads_embedded_references() {
        assert_eq!(id_string(&json!("p1")), Some("p1".to_string()));
        assert_eq!(id_string(&json!({"$oid": "abc"})), Some("abc".to_string()));
        assert_eq!(id_string(&json!({"_id": "p2", "name": "x"})), Some("p2".to_string()));
        assert_eq!(id_string(&json!(null)), None);
    }

    #[test]
    fn remove_path_drops_nested_field() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(remove_path(&mut d, "a.b"), Some(json!(1)));
        assert_eq!(Value::Object(d), json!({"a": {"c": 2}}));
    }
}
