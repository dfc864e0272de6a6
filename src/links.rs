//! Link graph
//!
//! A document keeps a registry of linkable objects in its root `$links`
//! array. Each linked object also carries its own block:
//!
//! ```json
//! "$link": { "tags": ["component"], "scope": "parent", "dependencies": ["<uuid>"] }
//! ```
//!
//! Propagation appends a link's id to the `dependencies` of other links,
//! both in the object block and in the matching `$links` record, so the two
//! never disagree. How far an id travels depends on the link's scope:
//!
//! - `global`: every link in the document.
//! - `parent`: every link under the nearest ancestor anchored by a `local`
//!   or `global` block (the document root when there is none).
//! - `local`: only the link itself, seeded at creation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ModelError, Result};
use crate::path::JsonPath;
use crate::refs;
use crate::schema::{LinkScope, LinkSpec};

/// Key of the document-level registry
pub const LINKS_KEY: &str = "$links";
/// Key of the per-object block
pub const LINK_BLOCK_KEY: &str = "$link";

/// An entry of the `$links` registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "$visibility", default)]
    pub visibility: String,
    #[serde(rename = "$label", default)]
    pub label: String,
    #[serde(rename = "$path", default)]
    pub path: JsonPath,
    #[serde(rename = "$scope")]
    pub scope: LinkScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

impl LinkRecord {
    pub fn new(id: impl Into<String>, spec: &LinkSpec, label: impl Into<String>, visibility: impl Into<String>, path: JsonPath) -> Self {
        let id = id.into();
        let dependencies = match spec.scope {
            LinkScope::Local => Some(vec![id.clone()]),
            LinkScope::Parent | LinkScope::Global => None,
        };
        Self {
            id,
            tags: spec.tags.clone(),
            visibility: visibility.into(),
            label: label.into(),
            path,
            scope: spec.scope,
            dependencies,
        }
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies
            .as_ref()
            .map(|deps| deps.iter().any(|d| d == id))
            .unwrap_or(false)
    }
}

/// The block stored on a linked object
pub fn link_block(spec: &LinkSpec, own_id: &str) -> Value {
    let dependencies = match spec.scope {
        LinkScope::Local => vec![Value::String(own_id.to_string())],
        LinkScope::Parent | LinkScope::Global => Vec::new(),
    };
    json!({
        "tags": spec.tags,
        "scope": spec.scope,
        "dependencies": dependencies,
    })
}

/// Link registry and propagation over one document
pub struct LinkGraph<'a> {
    document: &'a mut Value,
}

impl<'a> LinkGraph<'a> {
    pub fn new(document: &'a mut Value) -> Self {
        Self { document }
    }

    /// Parsed `$links` records. A missing registry is empty.
    pub fn records(&self) -> Result<Vec<LinkRecord>> {
        records(self.document)
    }

    /// Append a record to `$links`, creating the registry if needed
    pub fn register(&mut self, record: &LinkRecord) -> Result<()> {
        let Value::Object(root) = &mut *self.document else {
            return Err(ModelError::shape(&[], "document root is not an object"));
        };
        let links = root
            .entry(LINKS_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(links) = links else {
            return Err(ModelError::shape(&[LINKS_KEY.to_string()], "$links is not an array"));
        };
        links.push(serde_json::to_value(record)?);
        tracing::debug!(id = %record.id, scope = ?record.scope, path = %record.path, "registered link");
        Ok(())
    }

    /// Propagate one link's id according to its scope. Returns the ids that
    /// received it.
    pub fn propagate(&mut self, link: &LinkRecord) -> Result<Vec<String>> {
        let targets: BTreeSet<String> = match link.scope {
            LinkScope::Local => {
                self.add_dependency(&link.id, &link.id)?;
                return Ok(vec![link.id.clone()]);
            }
            LinkScope::Global => {
                let mut ids: BTreeSet<String> =
                    self.blocks().into_iter().map(|(_, id)| id).collect();
                ids.extend(self.records()?.into_iter().map(|r| r.id));
                ids
            }
            LinkScope::Parent => {
                let anchor = self.anchor_path(&link.path);
                self.records()?
                    .into_iter()
                    .filter(|r| r.path.starts_with(&anchor))
                    .map(|r| r.id)
                    .collect()
            }
        };

        let mut reached = Vec::new();
        for target in targets.into_iter().filter(|t| *t != link.id) {
            self.add_dependency(&target, &link.id)?;
            reached.push(target);
        }
        tracing::debug!(id = %link.id, scope = ?link.scope, reached = reached.len(), "propagated link");
        Ok(reached)
    }

    /// Re-run propagation for every registered link, oldest first
    pub fn propagate_all(&mut self) -> Result<()> {
        for record in self.records()? {
            self.propagate(&record)?;
        }
        Ok(())
    }

    /// Nearest strict ancestor of `path` whose `$link.scope` is set and is
    /// not `parent`; the root when there is none
    pub fn anchor_path(&self, path: &JsonPath) -> JsonPath {
        anchor_path(self.document, path)
    }

    /// Copy `$label` and `visibility` from the object with `id` into its
    /// record. Returns whether a record changed.
    pub fn sync_record(&mut self, id: &str) -> Result<bool> {
        let Some((_, object)) = refs::find_object_by_id(self.document, id) else {
            return Ok(false);
        };
        let label = object.get("$label").and_then(Value::as_str).map(String::from);
        let visibility = object.get("visibility").and_then(Value::as_str).map(String::from);

        let mut changed = false;
        let Some(registry) = self.registry_mut()? else {
            return Ok(false);
        };
        for entry in registry {
            if entry.get("$id").and_then(Value::as_str) != Some(id) {
                continue;
            }
            let Value::Object(entry) = entry else { continue };
            if let Some(label) = &label {
                changed |= set_if_changed(entry, "$label", label);
            }
            if let Some(visibility) = &visibility {
                changed |= set_if_changed(entry, "$visibility", visibility);
            }
        }
        Ok(changed)
    }

    /// Drop records whose object no longer exists. Returns the dropped ids.
    pub fn prune_dangling(&mut self) -> Result<Vec<String>> {
        let live = refs::object_ids(self.document);
        let mut dropped = Vec::new();
        let Some(registry) = self.registry_mut()? else {
            return Ok(dropped);
        };
        registry.retain(|entry| {
            let id = entry.get("$id").and_then(Value::as_str).unwrap_or_default();
            let keep = live.contains(id);
            if !keep {
                dropped.push(id.to_string());
            }
            keep
        });
        if !dropped.is_empty() {
            tracing::info!(count = dropped.len(), "pruned dangling links");
        }
        Ok(dropped)
    }

    /// Every object carrying a `$link` block: its path and `$id`
    pub fn blocks(&self) -> Vec<(JsonPath, String)> {
        fn walk(value: &Value, path: &JsonPath, out: &mut Vec<(JsonPath, String)>) {
            match value {
                Value::Object(map) => {
                    if map.get(LINK_BLOCK_KEY).map(Value::is_object).unwrap_or(false) {
                        if let Some(id) = map.get("$id").and_then(Value::as_str) {
                            out.push((path.clone(), id.to_string()));
                        }
                    }
                    for (k, v) in map {
                        if k != LINKS_KEY && k != LINK_BLOCK_KEY {
                            walk(v, &path.child(k.clone()), out);
                        }
                    }
                }
                Value::Array(items) => {
                    for (i, v) in items.iter().enumerate() {
                        walk(v, &path.child(i.to_string()), out);
                    }
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        walk(self.document, &JsonPath::root(), &mut out);
        out
    }

    /// The `$links` array, `None` when the document has no registry yet
    fn registry_mut(&mut self) -> Result<Option<&mut Vec<Value>>> {
        match self.document.get_mut(LINKS_KEY) {
            Some(Value::Array(links)) => Ok(Some(links)),
            Some(_) => Err(ModelError::shape(&[LINKS_KEY.to_string()], "$links is not an array")),
            None => Ok(None),
        }
    }

    /// Append `dependency` to the dependencies of `target`, in its record and
    /// in its object block, without duplicates
    fn add_dependency(&mut self, target: &str, dependency: &str) -> Result<()> {
        if let Some(Value::Array(links)) = self.document.get_mut(LINKS_KEY) {
            for entry in links.iter_mut() {
                if entry.get("$id").and_then(Value::as_str) != Some(target) {
                    continue;
                }
                if let Value::Object(entry) = entry {
                    push_unique(entry, "dependencies", dependency);
                }
            }
        }

        let found = refs::find_object_by_id(self.document, target).map(|(path, _)| path);
        if let Some(path) = found {
            if let Some(Value::Object(block)) = path
                .get_mut(self.document)
                .and_then(|object| object.get_mut(LINK_BLOCK_KEY))
            {
                push_unique(block, "dependencies", dependency);
            }
        }
        Ok(())
    }
}

/// Parsed `$links` records of a document
pub fn records(document: &Value) -> Result<Vec<LinkRecord>> {
    match document.get(LINKS_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(links) => Ok(serde_json::from_value(links.clone())?),
    }
}

/// See [`LinkGraph::anchor_path`]
pub fn anchor_path(document: &Value, path: &JsonPath) -> JsonPath {
    let mut current = path.parent();
    while let Some(candidate) = current {
        if anchors(document, &candidate) || candidate.is_root() {
            return candidate;
        }
        current = candidate.parent();
    }
    JsonPath::root()
}

fn anchors(document: &Value, path: &JsonPath) -> bool {
    path.get(document)
        .and_then(|object| object.get(LINK_BLOCK_KEY))
        .and_then(|block| block.get("scope"))
        .and_then(Value::as_str)
        .map(|scope| scope != "parent")
        .unwrap_or(false)
}

/// Dependencies visible from `path`: those of the nearest object (the node
/// itself included) whose `$link.scope` is set and is not `parent`
pub fn effective_dependencies(document: &Value, path: &JsonPath) -> Vec<String> {
    let mut current = Some(path.clone());
    while let Some(candidate) = current {
        if anchors(document, &candidate) {
            return candidate
                .get(document)
                .and_then(|object| object.get(LINK_BLOCK_KEY))
                .and_then(|block| block.get("dependencies"))
                .and_then(Value::as_array)
                .map(|deps| {
                    deps.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
        }
        current = candidate.parent();
    }
    Vec::new()
}

/// Records carrying at least one of `tags` whose id is in `dependencies`
pub fn link_options<'r>(
    records: &'r [LinkRecord],
    tags: &[String],
    dependencies: &[String],
) -> Vec<&'r LinkRecord> {
    records
        .iter()
        .filter(|r| r.tags.iter().any(|t| tags.contains(t)))
        .filter(|r| dependencies.contains(&r.id))
        .collect()
}

fn push_unique(object: &mut Map<String, Value>, key: &str, id: &str) {
    let entry = object
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(deps) = entry {
        if !deps.iter().any(|d| d.as_str() == Some(id)) {
            deps.push(Value::String(id.to_string()));
        }
    }
}

fn set_if_changed(object: &mut Map<String, Value>, key: &str, value: &str) -> bool {
    if object.get(key).and_then(Value::as_str) == Some(value) {
        return false;
    }
    object.insert(key.to_string(), Value::String(value.to_string()));
    true
}
