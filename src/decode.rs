//! Tree decoding
//!
//! Walks a JSON instance alongside its schema and fills an [`ItemStore`].
//! Placement of each node is decided by the `modelType` of the property that
//! holds it:
//!
//! | modelType | goes to | recursed with |
//! |---|---|---|
//! | `root-object`, `parent-object`, `array-parent-objects` | `children` | itself |
//! | `folder`, visible kinds marked `hidden: true` | `hidden_children` | the enclosing parent |
//! | `sub-object`, `array-creator`, `hidden` | `hidden_children` | itself |
//! | leaf kinds, no `modelType` | `hidden_children` | never |
//!
//! Lookup and discriminator problems are recorded as diagnostics and the
//! offending property is skipped; its siblings are still decoded.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::item::{Item, ItemId};
use crate::path::JsonPath;
use crate::resolver::SchemaResolver;
use crate::schema::{Placement, SchemaNode};
use crate::store::ItemStore;

/// Document-level keys that are bookkeeping, not schema-shaped data
pub const RESERVED_KEYS: &[&str] = &["$link", "$links"];

pub struct TreeDecoder<'a> {
    store: &'a mut ItemStore,
    resolver: SchemaResolver,
    root_schema: Arc<Value>,
    last_id_created: Option<String>,
    diagnostics: Diagnostics,
}

impl<'a> TreeDecoder<'a> {
    pub fn new(store: &'a mut ItemStore, resolver: SchemaResolver, root_schema: Arc<Value>) -> Self {
        Self {
            store,
            resolver,
            root_schema,
            last_id_created: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Id most recently generated by the factory; its enclosing node becomes
    /// the store's "last created" item
    pub fn with_last_id(mut self, id: Option<String>) -> Self {
        self.last_id_created = id;
        self
    }

    /// Rebuild `store` from scratch for one document
    pub fn decode_document(
        mut self,
        file: &Path,
        label: &str,
        document: &Value,
    ) -> Diagnostics {
        self.store.clear();

        let schema = match self.resolver.resolve(&self.root_schema, &self.root_schema) {
            Ok(schema) => schema,
            Err(e) => {
                self.diagnostics
                    .push(DiagnosticCode::UnresolvedRef, &[], e.to_string());
                return self.diagnostics;
            }
        };

        let mut root = Item::new(
            label,
            schema.clone(),
            Arc::clone(&self.root_schema),
            file.to_path_buf(),
            JsonPath::root(),
            None,
        );
        root.value = document.clone();
        let root = self.store.insert(root);

        self.decode(document, &schema, &JsonPath::root(), root);
        self.finish()
    }

    /// Decode `value` (described by `schema`, located at `json_path`) into
    /// `parent`'s child lists
    pub fn decode(&mut self, value: &Value, schema: &Value, json_path: &JsonPath, parent: ItemId) {
        match value {
            Value::Array(items) => self.decode_array(items, schema, json_path, parent),
            Value::Object(map) => self.decode_object(map, schema, json_path, parent),
            _ => self.diagnostics.push(
                DiagnosticCode::UnexpectedShape,
                json_path.segments(),
                "expected an object or array",
            ),
        }
    }

    /// Recompute presentation state and hand back what was reported
    pub fn finish(self) -> Diagnostics {
        self.store.update_collapsible();
        self.diagnostics
    }

    fn decode_array(&mut self, items: &[Value], schema: &Value, json_path: &JsonPath, parent: ItemId) {
        let item_schema = match self.resolve(schema.get("items"), json_path) {
            Some(s) => s,
            None => return,
        };
        let Some(placement) = self.placement_of(&item_schema, json_path) else {
            return;
        };

        for (index, element) in items.iter().enumerate() {
            let label = element
                .get("$label")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| index.to_string());
            self.place(
                element,
                &item_schema,
                json_path.child(index.to_string()),
                label,
                placement,
                parent,
            );
        }
    }

    fn decode_object(
        &mut self,
        map: &Map<String, Value>,
        schema: &Value,
        json_path: &JsonPath,
        parent: ItemId,
    ) {
        let properties = match self.resolve(schema.get("properties"), json_path) {
            Some(Value::Object(props)) => props,
            Some(_) => Map::new(),
            None => return,
        };

        for (key, value) in map {
            if key == "$id" && value.as_str().is_some() && value.as_str() == self.last_id_created.as_deref() {
                self.store.set_last_created(parent);
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            let child_path = json_path.child(key.clone());
            let Some(property) = properties.get(key) else {
                self.diagnostics.push(
                    DiagnosticCode::MissingProperty,
                    child_path.segments(),
                    format!("no property schema for '{}'", key),
                );
                continue;
            };
            let Some(property) = self.resolve(Some(property), &child_path) else {
                continue;
            };
            let Some(placement) = self.placement_of(&property, &child_path) else {
                continue;
            };

            self.place(value, &property, child_path, key.clone(), placement, parent);
        }
    }

    fn place(
        &mut self,
        value: &Value,
        schema: &Value,
        json_path: JsonPath,
        label: String,
        placement: Placement,
        parent: ItemId,
    ) {
        let parent_path = json_path.parent();
        let mut item = Item::new(
            label,
            schema.clone(),
            Arc::clone(&self.root_schema),
            self.file_of(parent),
            json_path.clone(),
            parent_path,
        );
        item.value = value.clone();
        let id = self.store.insert(item);
        tracing::trace!(path = %json_path, ?placement, "decoded node");

        let composite = value.is_object() || value.is_array();
        match placement {
            Placement::Visible => {
                self.store.push_child(parent, id);
                if composite {
                    self.decode(value, schema, &json_path, id);
                }
            }
            Placement::Folder => {
                self.store.push_hidden_child(parent, id);
                if composite {
                    self.decode(value, schema, &json_path, parent);
                }
            }
            Placement::Nested => {
                if composite {
                    self.decode(value, schema, &json_path, id);
                }
                self.store.push_hidden_child(parent, id);
            }
            Placement::Leaf => self.store.push_hidden_child(parent, id),
        }
    }

    fn placement_of(&mut self, schema: &Value, json_path: &JsonPath) -> Option<Placement> {
        let node = SchemaNode::new(schema);
        match node.model_type() {
            Ok(Some(model_type)) => {
                let placement = model_type.placement();
                if placement == Placement::Visible && node.hidden() {
                    Some(Placement::Folder)
                } else {
                    Some(placement)
                }
            }
            Ok(None) => Some(Placement::Leaf),
            Err(e) => {
                self.diagnostics.push(
                    DiagnosticCode::UnsupportedModelType,
                    json_path.segments(),
                    e.to_string(),
                );
                None
            }
        }
    }

    fn resolve(&mut self, schema: Option<&Value>, json_path: &JsonPath) -> Option<Value> {
        match self.resolver.resolve_opt(schema, &self.root_schema) {
            Ok(resolved) => Some(resolved.unwrap_or(Value::Null)),
            Err(e) => {
                self.diagnostics
                    .push(DiagnosticCode::UnresolvedRef, json_path.segments(), e.to_string());
                None
            }
        }
    }

    fn file_of(&self, parent: ItemId) -> std::path::PathBuf {
        self.store
            .get(parent)
            .map(|p| p.file_path.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Collapsible;
    use crate::schema::ModelType;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "$id": "project",
            "modelType": "root-object",
            "type": "object",
            "properties": {
                "$label": {"modelType": "input-string", "type": "string"},
                "$id": {"modelType": "hidden", "type": "string"},
                "systems": {
                    "modelType": "array-parent-objects",
                    "type": "array",
                    "items": {"$ref": "#/%24defs/system"}
                },
                "settings": {
                    "modelType": "folder",
                    "type": "object",
                    "properties": {
                        "verbose": {"modelType": "checkbox", "type": "boolean"},
                        "owner": {"modelType": "parent-object", "type": "object", "properties": {
                            "$label": {"modelType": "input-string", "type": "string"}
                        }}
                    }
                },
                "odd": {"modelType": "spinner", "type": "string"}
            },
            "$defs": {
                "system": {
                    "modelType": "parent-object",
                    "type": "object",
                    "title": "System",
                    "properties": {
                        "$label": {"modelType": "input-string", "type": "string"},
                        "$id": {"modelType": "hidden", "type": "string"},
                        "ports": {
                            "modelType": "array-creator",
                            "type": "array",
                            "items": {"modelType": "sub-object", "type": "object", "properties": {
                                "name": {"modelType": "input-string", "type": "string"}
                            }}
                        }
                    }
                }
            }
        })
    }

    fn document() -> Value {
        json!({
            "$model": "project",
            "$label": "Demo",
            "$id": "root-id",
            "systems": [
                {"$label": "Engine", "$id": "sys-1", "ports": [{"name": "in"}]},
                {"$label": "Brake", "$id": "sys-2", "ports": []}
            ],
            "settings": {"verbose": true, "owner": {"$label": "Ops"}},
            "odd": "x",
            "extra": 1,
            "$links": []
        })
    }

    fn decode(last_id: Option<&str>) -> (ItemStore, Diagnostics) {
        let mut store = ItemStore::new();
        let diags = TreeDecoder::new(&mut store, SchemaResolver::default(), Arc::new(schema()))
            .with_last_id(last_id.map(String::from))
            .decode_document(Path::new("/p/demo.json"), "demo", &document());
        (store, diags)
    }

    fn labels<'a>(items: impl Iterator<Item = &'a Item>) -> Vec<String> {
        items.map(|i| i.label.clone()).collect()
    }

    #[test]
    fn test_visible_tree() {
        let (store, _) = decode(None);
        let root = store.root().unwrap();
        assert_eq!(labels(store.children(root)), vec!["systems", "owner"]);

        let systems = store.find(Path::new("/p/demo.json"), &JsonPath::from(["systems"])).unwrap();
        assert_eq!(labels(store.children(systems)), vec!["Engine", "Brake"]);

        let engine = store.find(Path::new("/p/demo.json"), &JsonPath::from(["systems", "0"])).unwrap();
        let engine = store.get(engine).unwrap();
        assert_eq!(engine.description(), Some("System"));
        assert_eq!(engine.model_type, Some(ModelType::ParentObject));
        assert_eq!(engine.value["$id"], "sys-1");
    }

    #[test]
    fn test_folder_is_transparent() {
        let (store, _) = decode(None);
        let root = store.root().unwrap();
        let hidden = labels(store.hidden_children(root));
        assert!(hidden.contains(&"settings".to_string()));
        assert!(hidden.contains(&"verbose".to_string()));

        let owner = store
            .find(Path::new("/p/demo.json"), &JsonPath::from(["settings", "owner"]))
            .unwrap();
        let folder = store.find(Path::new("/p/demo.json"), &JsonPath::from(["settings"])).unwrap();
        assert_eq!(store.parent(owner), Some(folder));
        assert_eq!(store.visible_parent(owner), Some(root));
    }

    #[test]
    fn test_nested_kinds_recurse_into_hidden() {
        let (store, _) = decode(None);
        let ports = store
            .find(Path::new("/p/demo.json"), &JsonPath::from(["systems", "0", "ports"]))
            .unwrap();
        let port = store
            .find(Path::new("/p/demo.json"), &JsonPath::from(["systems", "0", "ports", "0"]))
            .unwrap();
        assert!(store.get(ports).unwrap().hidden_children.contains(&port));
        assert_eq!(
            labels(store.hidden_children(port)),
            vec!["name"]
        );
    }

    #[test]
    fn test_collapsible_state() {
        let (store, _) = decode(None);
        let file = Path::new("/p/demo.json");
        let root = store.root().unwrap();
        assert_eq!(store.get(root).unwrap().collapsible, Collapsible::Collapsed);
        let brake = store.find(file, &JsonPath::from(["systems", "1"])).unwrap();
        assert_eq!(store.get(brake).unwrap().collapsible, Collapsible::None);
    }

    #[test]
    fn test_problems_are_reported_not_fatal() {
        let (store, diags) = decode(None);
        assert_eq!(diags.with_code(DiagnosticCode::UnsupportedModelType).len(), 1);
        let missing = diags.with_code(DiagnosticCode::MissingProperty);
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().any(|d| d.path == "extra"));
        assert!(missing.iter().any(|d| d.path == "$model"));
        assert!(store.find(Path::new("/p/demo.json"), &JsonPath::from(["odd"])).is_none());
        assert!(store.find(Path::new("/p/demo.json"), &JsonPath::from(["$links"])).is_none());
    }

    #[test]
    fn test_last_created_is_enclosing_node() {
        let (store, _) = decode(Some("sys-2"));
        let last = store.last_created().unwrap();
        assert_eq!(store.get(last).unwrap().json_path, JsonPath::from(["systems", "1"]));
    }

    #[test]
    fn test_scalar_value_is_shape_error() {
        let mut store = ItemStore::new();
        let mut decoder = TreeDecoder::new(&mut store, SchemaResolver::default(), Arc::new(schema()));
        let root = {
            let item = Item::new("r", json!({}), Arc::new(schema()), "/p/x.json".into(), JsonPath::root(), None);
            decoder.store.insert(item)
        };
        decoder.decode(&json!(42), &json!({}), &JsonPath::root(), root);
        let diags = decoder.finish();
        assert!(diags.has_errors());
    }
}
