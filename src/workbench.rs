//! Workbench
//!
//! Entry point for operator intents: create a root document or a child
//! object, remove a node, edit a leaf, undo and redo. Every mutation edits the
//! document's JSON, writes it atomically (recording a history snapshot),
//! refreshes the item tree and queues a [`TreeEvent`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::WorkbenchConfig;
use crate::diagnostics::Diagnostics;
use crate::document::Document;
use crate::error::{ModelError, Result};
use crate::factory::ObjectFactory;
use crate::item::{ChildOption, Item};
use crate::links::{self, LinkGraph, LinkRecord};
use crate::path::JsonPath;
use crate::refs;
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaResolver;
use crate::schema::{PropertyType, SchemaNode};

// =============================================================================
// Events
// =============================================================================

/// Tree-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TreeEvent {
    Refreshed { file: PathBuf },
    Created { file: PathBuf, path: JsonPath },
    Removed { file: PathBuf, path: JsonPath },
    Edited { file: PathBuf, path: JsonPath },
    Undone { file: PathBuf },
    Redone { file: PathBuf },
}

// =============================================================================
// Workbench
// =============================================================================

pub struct Workbench {
    registry: Arc<SchemaRegistry>,
    config: WorkbenchConfig,
    resolver: SchemaResolver,
    documents: BTreeMap<PathBuf, Document>,
    events: Vec<TreeEvent>,
}

impl Workbench {
    pub fn new(registry: SchemaRegistry, config: WorkbenchConfig) -> Self {
        let resolver = SchemaResolver::new(config.resolver.max_depth);
        Self {
            registry: Arc::new(registry),
            config,
            resolver,
            documents: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Replace the schema registry and rebuild every open tree
    pub fn swap_registry(&mut self, registry: SchemaRegistry) -> Diagnostics {
        self.registry = Arc::new(registry);
        tracing::info!(schemas = self.registry.len(), "schema registry swapped");
        self.refresh_all()
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Open an instance file and decode it. A document that is already open
    /// keeps its history and is refreshed from disk instead.
    pub fn open(&mut self, path: impl Into<PathBuf>) -> Result<Diagnostics> {
        let path = path.into();
        if self.documents.contains_key(&path) {
            tracing::debug!(path = %path.display(), "document already open");
            return self.refresh(&path);
        }
        let document = Document::open(path.clone(), self.config.history.max_steps)?;
        self.documents.insert(path.clone(), document);
        self.refresh(&path)
    }

    /// Forget a document and its history. Returns whether it was open.
    pub fn close(&mut self, path: &Path) -> bool {
        self.documents.remove(path).is_some()
    }

    pub fn document(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Reload one document from disk and rebuild its tree
    pub fn refresh(&mut self, path: &Path) -> Result<Diagnostics> {
        let document = self
            .documents
            .get_mut(path)
            .ok_or_else(|| ModelError::DocumentNotOpen(path.to_path_buf()))?;
        let diagnostics = document.refresh(&self.registry, self.resolver)?.clone();
        self.events.push(TreeEvent::Refreshed {
            file: path.to_path_buf(),
        });
        Ok(diagnostics)
    }

    /// Refresh every open document. A document that fails to reload is
    /// logged and left as it was.
    pub fn refresh_all(&mut self) -> Diagnostics {
        let paths: Vec<PathBuf> = self.documents.keys().cloned().collect();
        let mut all = Diagnostics::new();
        for path in paths {
            match self.refresh(&path) {
                Ok(diagnostics) => all.extend(diagnostics),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "refresh failed"),
            }
        }
        all
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn get_item(&self, file: &Path, path: &JsonPath) -> Option<&Item> {
        let store = self.documents.get(file)?.store();
        store.get(store.find(file, path)?)
    }

    /// Parent as shown in the tree (transparent folders skipped)
    pub fn get_parent(&self, file: &Path, path: &JsonPath) -> Option<&Item> {
        let store = self.documents.get(file)?.store();
        store.get(store.visible_parent(store.find(file, path)?)?)
    }

    /// Node enclosing the `$id` generated by the latest creation
    pub fn last_item_created(&self, file: &Path) -> Option<&Item> {
        let store = self.documents.get(file)?.store();
        store.get(store.last_created()?)
    }

    pub fn child_options(&self, file: &Path, parent: &JsonPath) -> Result<Vec<ChildOption>> {
        Ok(self.require_item(file, parent)?.child_options(&self.resolver))
    }

    /// Paths referring to `id`, bare or through `${id:...}`
    pub fn references_to(&self, file: &Path, id: &str) -> Result<Vec<JsonPath>> {
        Ok(refs::references_to(self.require_document(file)?.content(), id))
    }

    pub fn links(&self, file: &Path) -> Result<Vec<LinkRecord>> {
        links::records(self.require_document(file)?.content())
    }

    /// Dependencies visible from the node at `path`
    pub fn effective_dependencies(&self, file: &Path, path: &JsonPath) -> Result<Vec<String>> {
        Ok(links::effective_dependencies(
            self.require_document(file)?.content(),
            path,
        ))
    }

    /// Link records a tag dropdown at `path` may offer
    pub fn link_options(&self, file: &Path, path: &JsonPath, tags: &[String]) -> Result<Vec<LinkRecord>> {
        let document = self.require_document(file)?;
        let dependencies = links::effective_dependencies(document.content(), path);
        let records = links::records(document.content())?;
        Ok(links::link_options(&records, tags, &dependencies)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Take every queued notification
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    /// Create `<projects>/<name>.json` from a root schema and open it
    pub fn create_root(&mut self, schema_id: &str, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        let schema = self
            .registry
            .get(schema_id)
            .ok_or_else(|| ModelError::SchemaNotFound {
                id: schema_id.to_string(),
            })?;
        let resolved = self.resolver.resolve(schema, schema)?;
        if SchemaNode::new(&resolved).property_type()? != Some(PropertyType::Object) {
            return Err(ModelError::shape(&[], format!("root schema '{}' is not an object", schema_id)));
        }

        let mut content = Value::Null;
        let created = ObjectFactory::new(schema, self.resolver).create(
            &mut content,
            schema,
            &JsonPath::root(),
            name,
            self.config.links.full_propagation,
        )?;

        let dir = self.config.projects_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", name));
        if path.exists() {
            return Err(ModelError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        let mut document = Document::create(
            path.clone(),
            &content,
            self.config.output.format,
            self.config.history.max_steps,
        )?;
        document.set_last_id_created(created.last_id);
        self.documents.insert(path.clone(), document);
        self.refresh(&path)?;
        self.events.push(TreeEvent::Created {
            file: path.clone(),
            path: JsonPath::root(),
        });
        Ok(path)
    }

    /// Create a child of the node at `parent` from one of its options.
    /// Returns the path the child landed at.
    pub fn create_child(&mut self, file: &Path, parent: &JsonPath, option: &ChildOption, name: &str) -> Result<JsonPath> {
        let root_schema = Arc::clone(&self.require_item(file, parent)?.root_schema);
        let document = self
            .documents
            .get_mut(file)
            .ok_or_else(|| ModelError::DocumentNotOpen(file.to_path_buf()))?;

        let mut content = document.content().clone();
        let created = ObjectFactory::new(&root_schema, self.resolver).create(
            &mut content,
            &option.schema,
            &option.insertion_path,
            name,
            self.config.links.full_propagation,
        )?;
        document.write(content, self.config.output.format)?;
        document.set_last_id_created(created.last_id);

        self.refresh(file)?;
        self.events.push(TreeEvent::Created {
            file: file.to_path_buf(),
            path: created.path.clone(),
        });
        Ok(created.path)
    }

    /// Remove the node at `path`.
    ///
    /// A root node takes its file with it. Otherwise the object is removed
    /// by `$id` together with every bare reference to it (or by path when it
    /// has no `$id`). Returns the number of values removed or cleared.
    pub fn remove_node(&mut self, file: &Path, path: &JsonPath) -> Result<usize> {
        let item = self.require_item(file, path)?;
        if item.is_root() {
            std::fs::remove_file(file)?;
            self.documents.remove(file);
            tracing::info!(path = %file.display(), "removed root document");
            self.events.push(TreeEvent::Removed {
                file: file.to_path_buf(),
                path: path.clone(),
            });
            return Ok(1);
        }
        let object_id = item.object_id().map(String::from);

        let document = self
            .documents
            .get_mut(file)
            .ok_or_else(|| ModelError::DocumentNotOpen(file.to_path_buf()))?;
        let mut content = document.content().clone();
        let removed = match &object_id {
            Some(id) => refs::remove_all_refs(&mut content, id),
            None => remove_at(&mut content, path)?,
        };
        if self.config.links.prune_dangling {
            LinkGraph::new(&mut content).prune_dangling()?;
        }
        document.write(content, self.config.output.format)?;
        tracing::info!(path = %path, removed, "removed node");

        self.refresh(file)?;
        self.events.push(TreeEvent::Removed {
            file: file.to_path_buf(),
            path: path.clone(),
        });
        Ok(removed)
    }

    /// Set the value at `path`. Editing `$label` or `visibility` of a linked
    /// object updates its `$links` record.
    pub fn edit_leaf(&mut self, file: &Path, path: &JsonPath, value: Value) -> Result<()> {
        let document = self
            .documents
            .get_mut(file)
            .ok_or_else(|| ModelError::DocumentNotOpen(file.to_path_buf()))?;
        let mut content = document.content().clone();
        path.set(&mut content, value)?;

        if matches!(path.last(), Some("$label" | "visibility")) {
            let owner = path
                .parent()
                .and_then(|p| p.get(&content))
                .and_then(|object| object.get("$id"))
                .and_then(Value::as_str)
                .map(String::from);
            if let Some(id) = owner {
                LinkGraph::new(&mut content).sync_record(&id)?;
            }
        }

        document.write(content, self.config.output.format)?;
        self.refresh(file)?;
        self.events.push(TreeEvent::Edited {
            file: file.to_path_buf(),
            path: path.clone(),
        });
        Ok(())
    }

    /// Undo the last write to `file`. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, file: &Path) -> Result<bool> {
        let done = self.require_document_mut(file)?.undo()?;
        if done {
            self.refresh(file)?;
            self.events.push(TreeEvent::Undone {
                file: file.to_path_buf(),
            });
        }
        Ok(done)
    }

    pub fn redo(&mut self, file: &Path) -> Result<bool> {
        let done = self.require_document_mut(file)?.redo()?;
        if done {
            self.refresh(file)?;
            self.events.push(TreeEvent::Redone {
                file: file.to_path_buf(),
            });
        }
        Ok(done)
    }

    fn require_document(&self, file: &Path) -> Result<&Document> {
        self.documents
            .get(file)
            .ok_or_else(|| ModelError::DocumentNotOpen(file.to_path_buf()))
    }

    fn require_document_mut(&mut self, file: &Path) -> Result<&mut Document> {
        self.documents
            .get_mut(file)
            .ok_or_else(|| ModelError::DocumentNotOpen(file.to_path_buf()))
    }

    fn require_item(&self, file: &Path, path: &JsonPath) -> Result<&Item> {
        self.require_document(file)?;
        self.get_item(file, path).ok_or_else(|| ModelError::ItemNotFound {
            file: file.to_path_buf(),
            path: path.joined(),
        })
    }
}

/// A single path component that stays inside the projects directory
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && std::path::Path::new(name).components().count() == 1
}

/// Delete the value at `path`: an object key or an array element
fn remove_at(document: &mut Value, path: &JsonPath) -> Result<usize> {
    let parent = path
        .parent()
        .ok_or_else(|| ModelError::shape(&[], "cannot remove the document root"))?;
    let key = path.last().unwrap_or_default();
    match parent.get_mut(document) {
        Some(Value::Object(map)) => Ok(usize::from(map.remove(key).is_some())),
        Some(Value::Array(items)) => match key.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                Ok(1)
            }
            _ => Err(ModelError::PathNotFound(path.joined())),
        },
        _ => Err(ModelError::PathNotFound(path.joined())),
    }
}
