//! Object identity and cross-references
//!
//! Objects are identified by their `$id` (a UUID). Other values refer to them
//! either by the bare id or through the `${id:<uuid>}` placeholder inside a
//! string. The `$links` registry is bookkeeping and is never searched.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::path::JsonPath;

const PLACEHOLDER_PATTERN: &str =
    r"\$\{id:([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern compiles"))
}

/// `${id:<uuid>}` for an id
pub fn placeholder(id: &str) -> String {
    format!("${{id:{}}}", id)
}

/// Every id referenced through a placeholder in `text`, in order
pub fn extract_ids(text: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Canonical 8-4-4-4-12 hex form
pub fn is_canonical_uuid(s: &str) -> bool {
    s.len() == 36 && uuid::Uuid::try_parse(s).is_ok()
}

fn is_registry(key: &str) -> bool {
    key == "$links"
}

/// Find the object whose `$id` equals `id`, with its path
pub fn find_object_by_id<'a>(document: &'a Value, id: &str) -> Option<(JsonPath, &'a Value)> {
    fn walk<'a>(value: &'a Value, id: &str, path: &JsonPath) -> Option<(JsonPath, &'a Value)> {
        match value {
            Value::Object(map) => {
                if map.get("$id").and_then(Value::as_str) == Some(id) {
                    return Some((path.clone(), value));
                }
                map.iter()
                    .filter(|(k, _)| !is_registry(k))
                    .find_map(|(k, v)| walk(v, id, &path.child(k.clone())))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| walk(v, id, &path.child(i.to_string()))),
            _ => None,
        }
    }
    walk(document, id, &JsonPath::root())
}

/// Ids of every object in the document
pub fn object_ids(document: &Value) -> HashSet<String> {
    fn walk(value: &Value, ids: &mut HashSet<String>) {
        match value {
            Value::Object(map) => {
                if let Some(id) = map.get("$id").and_then(Value::as_str) {
                    ids.insert(id.to_string());
                }
                for (k, v) in map {
                    if !is_registry(k) {
                        walk(v, ids);
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, ids)),
            _ => {}
        }
    }
    let mut ids = HashSet::new();
    walk(document, &mut ids);
    ids
}

/// Paths of every string value referring to `id`, bare or by placeholder.
/// The object's own `$id` is not a reference.
pub fn references_to(document: &Value, id: &str) -> Vec<JsonPath> {
    fn walk(value: &Value, id: &str, path: &JsonPath, out: &mut Vec<JsonPath>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    if is_registry(k) || k == "$id" {
                        continue;
                    }
                    walk(v, id, &path.child(k.clone()), out);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    walk(v, id, &path.child(i.to_string()), out);
                }
            }
            Value::String(s) => {
                if s == id || extract_ids(s).iter().any(|found| found == id) {
                    out.push(path.clone());
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(document, id, &JsonPath::root(), &mut out);
    out
}

/// Remove the object with `$id == id` and every bare reference to it.
///
/// Array elements that are the object or equal the id are dropped; object
/// properties holding the object are deleted, properties equal to the id are
/// cleared to `""`. The `$links` registry is left untouched. Returns the
/// number of values removed or cleared.
pub fn remove_all_refs(document: &mut Value, id: &str) -> usize {
    fn is_target(value: &Value, id: &str) -> bool {
        value.get("$id").and_then(Value::as_str) == Some(id)
    }

    fn walk(value: &mut Value, id: &str) -> usize {
        let mut removed = 0;
        match value {
            Value::Object(map) => {
                let before = map.len();
                map.retain(|k, v| is_registry(k) || !is_target(v, id));
                removed += before - map.len();
                for (k, v) in map.iter_mut() {
                    if is_registry(k) {
                        continue;
                    }
                    if v.as_str() == Some(id) && k != "$id" {
                        *v = Value::String(String::new());
                        removed += 1;
                    } else {
                        removed += walk(v, id);
                    }
                }
            }
            Value::Array(items) => {
                let before = items.len();
                items.retain(|v| !is_target(v, id) && v.as_str() != Some(id));
                removed += before - items.len();
                for v in items.iter_mut() {
                    removed += walk(v, id);
                }
            }
            _ => {}
        }
        removed
    }

    walk(document, id)
}
