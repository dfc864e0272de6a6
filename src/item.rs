//! Tree nodes
//!
//! An [`Item`] is a view over one JSON value at one path of one document.
//! Items are rebuilt on every refresh and never edited peer-to-peer; the JSON
//! file is the source of truth.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::path::{item_key, JsonPath};
use crate::resolver::SchemaResolver;
use crate::schema::{ModelType, Placement, PropertyType, SchemaNode};

/// Index of an item inside its document's [`crate::store::ItemStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(pub(crate) usize);

/// Tree presentation of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collapsible {
    /// No visible children
    #[default]
    None,
    /// At least one visible child
    Collapsed,
}

/// Operator actions a node supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub add: bool,
    pub remove: bool,
    pub duplicate: bool,
}

impl Capabilities {
    pub fn for_model_type(model_type: Option<ModelType>) -> Self {
        match model_type {
            Some(ModelType::RootObject) => Self {
                remove: true,
                ..Self::default()
            },
            Some(ModelType::ParentObject) => Self {
                add: true,
                remove: true,
                duplicate: true,
            },
            Some(ModelType::Folder) => Self {
                add: true,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// A schema a child may be created from
#[derive(Debug, Clone, Serialize)]
pub struct ChildOption {
    /// Array property receiving the child; `None` when the parent is the array
    pub key: Option<String>,
    pub title: String,
    /// Resolved `items` schema
    pub schema: Value,
    pub insertion_path: JsonPath,
}

/// A decoded tree node
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub label: String,
    /// Resolved schema for this node
    pub schema: Value,
    /// Unresolved root schema, for further `$ref` lookups
    #[serde(skip)]
    pub root_schema: Arc<Value>,
    pub model_type: Option<ModelType>,
    pub file_path: PathBuf,
    pub json_path: JsonPath,
    /// `None` only for document roots
    pub parent_json_path: Option<JsonPath>,
    pub value: Value,
    pub children: Vec<ItemId>,
    pub hidden_children: Vec<ItemId>,
    pub collapsible: Collapsible,
}

impl Item {
    pub fn new(
        label: impl Into<String>,
        schema: Value,
        root_schema: Arc<Value>,
        file_path: PathBuf,
        json_path: JsonPath,
        parent_json_path: Option<JsonPath>,
    ) -> Self {
        let model_type = SchemaNode::new(&schema).model_type().ok().flatten();
        Self {
            label: label.into(),
            schema,
            root_schema,
            model_type,
            file_path,
            json_path,
            parent_json_path,
            value: Value::Null,
            children: Vec::new(),
            hidden_children: Vec::new(),
            collapsible: Collapsible::Collapsed,
        }
    }

    /// Identity key, see [`item_key`]
    pub fn key(&self) -> String {
        item_key(&self.file_path, &self.json_path)
    }

    pub fn is_root(&self) -> bool {
        self.json_path.is_root()
    }

    /// Folders, and visible kinds marked `hidden`, pass their contents
    /// through to the enclosing node
    pub fn is_transparent(&self) -> bool {
        match self.model_type {
            Some(ModelType::Folder) => true,
            Some(kind) => kind.placement() == Placement::Visible && SchemaNode::new(&self.schema).hidden(),
            None => false,
        }
    }

    /// Schema title, shown next to the label
    pub fn description(&self) -> Option<&str> {
        SchemaNode::new(&self.schema).title()
    }

    pub fn capabilities(&self) -> Capabilities {
        if self.is_root() {
            return Capabilities::for_model_type(Some(ModelType::RootObject));
        }
        Capabilities::for_model_type(self.model_type)
    }

    /// The node's own `$id`, when its value is an object carrying one
    pub fn object_id(&self) -> Option<&str> {
        self.value.get("$id").and_then(Value::as_str)
    }

    /// Schemas a child of this node may be created from.
    ///
    /// An array node offers its own `items`. An object node offers each array
    /// property that is `hidden` or has an array `modelType` and whose resolved
    /// `items` carry a `title`. Children are appended, so the insertion index
    /// is the current length.
    pub fn child_options(&self, resolver: &SchemaResolver) -> Vec<ChildOption> {
        let node = SchemaNode::new(&self.schema);
        match node.property_type() {
            Ok(Some(PropertyType::Array)) => {
                let Some(items) = self.resolve_items(resolver, node.items()) else {
                    return Vec::new();
                };
                let title = SchemaNode::new(&items)
                    .title()
                    .map(String::from)
                    .unwrap_or_else(|| self.label.clone());
                let len = self.value.as_array().map(Vec::len).unwrap_or(0);
                vec![ChildOption {
                    key: None,
                    title,
                    schema: items,
                    insertion_path: self.json_path.child(len.to_string()),
                }]
            }
            Ok(Some(PropertyType::Object)) => node
                .properties()
                .into_iter()
                .flatten()
                .filter_map(|(key, property)| {
                    let property = resolver.resolve(property, &self.root_schema).ok()?;
                    let prop = SchemaNode::new(&property);
                    let array_kind = matches!(
                        prop.model_type(),
                        Ok(Some(ModelType::ArrayParentObjects | ModelType::ArrayCreator))
                    );
                    if prop.property_type().ok()? != Some(PropertyType::Array)
                        || !(prop.hidden() || array_kind)
                    {
                        return None;
                    }
                    let items = self.resolve_items(resolver, prop.items())?;
                    let title = SchemaNode::new(&items).title()?.to_string();
                    let len = self
                        .value
                        .get(key)
                        .and_then(Value::as_array)
                        .map(Vec::len)
                        .unwrap_or(0);
                    Some(ChildOption {
                        key: Some(key.clone()),
                        title,
                        schema: items,
                        insertion_path: self.json_path.child(key.clone()).child(len.to_string()),
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn resolve_items(&self, resolver: &SchemaResolver, items: Option<&Value>) -> Option<Value> {
        match resolver.resolve_opt(items, &self.root_schema) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(path = %self.json_path, error = %e, "cannot resolve items");
                None
            }
        }
    }

    pub(crate) fn update_collapsible(&mut self) {
        self.collapsible = if self.children.is_empty() {
            Collapsible::None
        } else {
            Collapsible::Collapsed
        };
    }
}
