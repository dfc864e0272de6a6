//! `$ref` resolution
//!
//! Resolves a schema's `$ref` against the root schema it was loaded with and
//! shallow-merges the target into the referencing node. Target fields win on
//! conflict. When the target itself carries a `$ref`, the chain is followed,
//! guarded by a visited-pointer set and a depth bound.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{ModelError, Result};

/// Default bound on `$ref` chain length
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Pure `$ref` resolver
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver {
    max_depth: usize,
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl SchemaResolver {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve `schema` against `root`.
    ///
    /// Non-object schemas and objects without `$ref` come back unchanged.
    /// The returned node keeps a `$ref` key; resolving it again yields an
    /// equal value.
    pub fn resolve(&self, schema: &Value, root: &Value) -> Result<Value> {
        let Value::Object(map) = schema else {
            return Ok(schema.clone());
        };
        let Some(mut pointer) = map.get("$ref").and_then(Value::as_str).map(String::from) else {
            return Ok(schema.clone());
        };

        let mut merged = map.clone();
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(pointer.clone()) {
                return Err(ModelError::SchemaCycle { pointer });
            }
            if visited.len() > self.max_depth {
                return Err(ModelError::RefDepthExceeded {
                    pointer,
                    depth: self.max_depth,
                });
            }

            let target = lookup_pointer(root, &pointer)?;
            let next = target.get("$ref").and_then(Value::as_str).map(String::from);
            if let Value::Object(fields) = target {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }

            match next {
                Some(next) => pointer = next,
                None => break,
            }
        }

        tracing::trace!(pointer = %pointer, "resolved $ref");
        Ok(Value::Object(merged))
    }

    /// Resolve an optional schema, passing `None` through
    pub fn resolve_opt(&self, schema: Option<&Value>, root: &Value) -> Result<Option<Value>> {
        schema.map(|s| self.resolve(s, root)).transpose()
    }
}

/// Split a `$ref` pointer into un-escaped segments.
///
/// The leading `#` (or empty) segment is dropped; `%24` becomes `$`, and the
/// JSON-Pointer escapes `~1` / `~0` become `/` / `~`.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    let mut parts = pointer.split('/');
    let first = parts.next().unwrap_or("");
    let mut segments = Vec::new();
    if !(first.is_empty() || first.ends_with('#')) {
        segments.push(unescape(first));
    }
    segments.extend(parts.map(unescape));
    segments
}

fn unescape(segment: &str) -> String {
    segment
        .replace("%24", "$")
        .replace("~1", "/")
        .replace("~0", "~")
}

/// Walk `root` along a `$ref` pointer
pub fn lookup_pointer<'a>(root: &'a Value, pointer: &str) -> Result<&'a Value> {
    let mut current = root;
    for segment in pointer_segments(pointer) {
        let next = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| ModelError::UnresolvedRef {
            pointer: pointer.to_string(),
            segment: segment.clone(),
        })?;
    }
    Ok(current)
}
