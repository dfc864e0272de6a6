//! Schema Registry
//!
//! Holds the model schemas a workbench decodes and synthesizes against.
//! Schemas are gathered in a [`RegistryLoader`], then frozen into an
//! immutable [`SchemaRegistry`]. A refresh builds a new registry and swaps it
//! in wholesale; a frozen registry is never edited.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::schema::SchemaNode;

/// Loading phase of a registry
#[derive(Debug, Default)]
pub struct RegistryLoader {
    schemas: Vec<Value>,
    by_id: HashMap<String, usize>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema. A later schema with the same `$id` replaces the earlier one.
    pub fn add(&mut self, schema: Value) -> Result<&mut Self> {
        let id = SchemaNode::new(&schema)
            .id()
            .map(String::from)
            .ok_or_else(|| ModelError::shape(&[], "schema has no $id"))?;

        match self.by_id.get(&id) {
            Some(&index) => {
                tracing::debug!(id = %id, "replacing schema");
                self.schemas[index] = schema;
            }
            None => {
                self.by_id.insert(id, self.schemas.len());
                self.schemas.push(schema);
            }
        }
        Ok(self)
    }

    /// Parse and add a schema from JSON text
    pub fn add_str(&mut self, content: &str) -> Result<&mut Self> {
        let schema: Value = serde_json::from_str(content)?;
        self.add(schema)
    }

    /// Read, parse and add a schema file
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let content = fs::read_to_string(path.as_ref())?;
        self.add_str(&content)
    }

    /// Finish loading
    pub fn freeze(self) -> SchemaRegistry {
        tracing::info!(schemas = self.schemas.len(), "schema registry frozen");
        SchemaRegistry {
            schemas: self.schemas,
            by_id: self.by_id,
        }
    }
}

/// An immutable set of model schemas addressed by `$id`
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<Value>,
    by_id: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Start loading a new registry
    pub fn load() -> RegistryLoader {
        RegistryLoader::new()
    }

    /// Look up a schema by `$id`
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.by_id.get(id).map(|&i| &self.schemas[i])
    }

    /// Find the schema a document declares through `$model` or `$schema`
    pub fn for_document(&self, document: &Value, path: &Path) -> Result<&Value> {
        let id = document
            .get("$model")
            .or_else(|| document.get("$schema"))
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::MissingModel {
                path: path.to_path_buf(),
            })?;
        self.get(id).ok_or_else(|| ModelError::SchemaNotFound { id: id.to_string() })
    }

    /// Schemas a new root document can be created from
    pub fn root_schemas(&self) -> impl Iterator<Item = &Value> {
        self.schemas.iter().filter(|s| SchemaNode::new(s).is_root())
    }

    /// All registered ids in load order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().filter_map(|s| SchemaNode::new(s).id())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
