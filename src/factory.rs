//! Object synthesis
//!
//! Builds a default-valued instance subtree from a schema: labels, fresh
//! UUIDs, the root schema id for `$schema`/`$model`, presets and zero values,
//! nested objects. Schemas carrying `$link` get an object-side link block and
//! a pending record; [`ObjectFactory::create`] inserts the subtree into a
//! document, registers those records and propagates them.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{ModelError, Result};
use crate::links::{link_block, LinkGraph, LinkRecord, LINK_BLOCK_KEY};
use crate::path::JsonPath;
use crate::resolver::SchemaResolver;
use crate::schema::{LinkSpec, PropertyType, SchemaNode};

/// A link discovered during synthesis, not yet registered
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub id: String,
    pub spec: LinkSpec,
    pub label: String,
    pub visibility: String,
    /// Location inside the synthesized subtree
    pub relative_path: JsonPath,
}

/// Output of [`ObjectFactory::synthesize`]
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub value: Value,
    /// `$id` of the top-level object (or the first one generated below it)
    pub last_id: Option<String>,
    pub links: Vec<PendingLink>,
    pub diagnostics: Diagnostics,
}

/// Output of [`ObjectFactory::create`]
#[derive(Debug, Clone)]
pub struct Created {
    /// Where the subtree landed in the document
    pub path: JsonPath,
    pub subtree: Value,
    pub last_id: Option<String>,
    pub links: Vec<LinkRecord>,
    pub diagnostics: Diagnostics,
}

pub struct ObjectFactory<'r> {
    root_schema: &'r Value,
    resolver: SchemaResolver,
}

impl<'r> ObjectFactory<'r> {
    pub fn new(root_schema: &'r Value, resolver: SchemaResolver) -> Self {
        Self {
            root_schema,
            resolver,
        }
    }

    /// Synthesize an instance of `schema` labelled `label`.
    ///
    /// Fails only when the top-level schema cannot be resolved; problems
    /// below it are reported in the diagnostics and the property is left out.
    pub fn synthesize(&self, schema: &Value, label: &str) -> Result<Synthesized> {
        let mut ancestry: Vec<String> = ref_pointer(schema).into_iter().collect();
        if std::ptr::eq(schema, self.root_schema) {
            ancestry.push("#".to_string());
        }
        let schema = self.resolver.resolve(schema, self.root_schema)?;
        let mut out = Synthesized {
            value: Value::Null,
            last_id: None,
            links: Vec::new(),
            diagnostics: Diagnostics::new(),
        };
        let value = self.object(&schema, label, &JsonPath::root(), 0, &mut ancestry, &mut out);
        out.value = value;
        Ok(out)
    }

    /// Synthesize and insert at `insertion_path`, then register and
    /// propagate every link the subtree carries.
    ///
    /// With `full_propagation` the pass is re-run for every record in the
    /// document, otherwise only for the new ones.
    pub fn create(
        &self,
        document: &mut Value,
        schema: &Value,
        insertion_path: &JsonPath,
        label: &str,
        full_propagation: bool,
    ) -> Result<Created> {
        let synthesized = self.synthesize(schema, label)?;
        let path = insert_subtree(document, insertion_path, synthesized.value.clone())?;

        let mut records = Vec::with_capacity(synthesized.links.len());
        let mut graph = LinkGraph::new(document);
        for pending in &synthesized.links {
            let mut link_path = path.clone();
            for segment in pending.relative_path.segments() {
                link_path = link_path.child(segment.clone());
            }
            let record = LinkRecord::new(
                pending.id.clone(),
                &pending.spec,
                pending.label.clone(),
                pending.visibility.clone(),
                link_path,
            );
            graph.register(&record)?;
            records.push(record);
        }

        if full_propagation && !records.is_empty() {
            graph.propagate_all()?;
        } else {
            for record in &records {
                graph.propagate(record)?;
            }
        }

        tracing::info!(path = %path, label, links = records.len(), "created object");
        Ok(Created {
            path,
            subtree: synthesized.value,
            last_id: synthesized.last_id,
            links: records,
            diagnostics: synthesized.diagnostics,
        })
    }

    fn object(
        &self,
        schema: &Value,
        label: &str,
        path: &JsonPath,
        depth: usize,
        ancestry: &mut Vec<String>,
        out: &mut Synthesized,
    ) -> Value {
        if depth > self.resolver.max_depth() {
            out.diagnostics.push(
                DiagnosticCode::UnresolvedRef,
                path.segments(),
                format!("object nesting exceeds depth {}", self.resolver.max_depth()),
            );
            return Value::Object(Map::new());
        }

        let node = SchemaNode::new(schema);
        let mut object = Map::new();
        let mut own_id: Option<String> = None;
        let mut visibility = String::new();

        for (key, property) in node.properties().into_iter().flatten() {
            let prop_path = path.child(key.clone());
            let pointer = ref_pointer(property);
            let property = match self.resolver.resolve(property, self.root_schema) {
                Ok(p) => p,
                Err(e) => {
                    out.diagnostics
                        .push(DiagnosticCode::UnresolvedRef, prop_path.segments(), e.to_string());
                    continue;
                }
            };
            let prop = SchemaNode::new(&property);

            let value = match key.as_str() {
                "$label" => Value::String(label.to_string()),
                "$id" => {
                    let id = Uuid::new_v4().to_string();
                    own_id = Some(id.clone());
                    Value::String(id)
                }
                "$schema" | "$model" => Value::String(
                    SchemaNode::new(self.root_schema)
                        .id()
                        .unwrap_or_default()
                        .to_string(),
                ),
                "visibility" => {
                    let preset = prop.preset().cloned().unwrap_or_else(|| Value::String(String::new()));
                    visibility = preset.as_str().unwrap_or_default().to_string();
                    preset
                }
                _ => match prop.property_type() {
                    Ok(Some(PropertyType::Object)) => match prop.preset() {
                        Some(preset) => preset.clone(),
                        None => {
                            if let Some(pointer) = &pointer {
                                if ancestry.contains(pointer) {
                                    let cycle = ModelError::SchemaCycle {
                                        pointer: pointer.clone(),
                                    };
                                    out.diagnostics.push(
                                        DiagnosticCode::UnresolvedRef,
                                        prop_path.segments(),
                                        cycle.to_string(),
                                    );
                                    continue;
                                }
                                ancestry.push(pointer.clone());
                            }
                            let nested = self.object(&property, label, &prop_path, depth + 1, ancestry, out);
                            if pointer.is_some() {
                                ancestry.pop();
                            }
                            nested
                        }
                    },
                    Ok(Some(kind)) => prop.preset().cloned().unwrap_or_else(|| kind.zero_value()),
                    Ok(None) => {
                        out.diagnostics.push(
                            DiagnosticCode::UnsupportedType,
                            prop_path.segments(),
                            format!("property '{}' has no type", key),
                        );
                        continue;
                    }
                    Err(e) => {
                        out.diagnostics
                            .push(DiagnosticCode::UnsupportedType, prop_path.segments(), e.to_string());
                        continue;
                    }
                },
            };
            object.insert(key.clone(), value);
        }

        match node.link() {
            Ok(Some(spec)) => {
                if own_id.is_none() {
                    let id = Uuid::new_v4().to_string();
                    object.insert("$id".to_string(), Value::String(id.clone()));
                    own_id = Some(id);
                }
                let id = own_id.clone().unwrap_or_default();
                object.insert(LINK_BLOCK_KEY.to_string(), link_block(&spec, &id));
                out.links.push(PendingLink {
                    id,
                    spec,
                    label: label.to_string(),
                    visibility,
                    relative_path: path.clone(),
                });
            }
            Ok(None) => {}
            Err(e) => out
                .diagnostics
                .push(DiagnosticCode::InvalidLink, path.segments(), e.to_string()),
        }

        if let Some(id) = own_id {
            if depth == 0 || out.last_id.is_none() {
                out.last_id = Some(id);
            }
        }

        Value::Object(object)
    }
}

/// `$ref` pointer of an unresolved schema
fn ref_pointer(schema: &Value) -> Option<String> {
    schema.get("$ref").and_then(Value::as_str).map(String::from)
}

/// Place `subtree` in `document` at `insertion_path`.
///
/// An empty path replaces the whole document. Missing intermediate containers
/// are created (an array when the following segment is numeric, else an
/// object). Under an object the terminal key is assigned; under an array the
/// subtree is appended whatever the terminal index. Returns the path the
/// subtree landed at.
pub fn insert_subtree(document: &mut Value, insertion_path: &JsonPath, subtree: Value) -> Result<JsonPath> {
    let Some(container_path) = insertion_path.parent() else {
        *document = subtree;
        return Ok(JsonPath::root());
    };
    let segments = insertion_path.segments();
    let terminal = segments[segments.len() - 1].clone();

    let mut current = document;
    for (i, segment) in container_path.segments().iter().enumerate() {
        let next_is_index = segments[i + 1].parse::<usize>().is_ok();
        current = match current {
            Value::Object(map) => map.entry(segment.clone()).or_insert_with(|| {
                if next_is_index {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                }
            }),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| ModelError::PathNotFound(insertion_path.joined()))?,
            _ => {
                return Err(ModelError::shape(
                    &segments[..i],
                    "cannot insert below a scalar",
                ))
            }
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(terminal.clone(), subtree);
            Ok(container_path.child(terminal))
        }
        Value::Array(items) => {
            items.push(subtree);
            Ok(container_path.child((items.len() - 1).to_string()))
        }
        _ => Err(ModelError::shape(container_path.segments(), "cannot insert below a scalar")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::records;
    use crate::refs::is_canonical_uuid;
    use crate::schema::LinkScope;
    use serde_json::json;

    fn root_schema() -> Value {
        json!({
            "$id": "project",
            "modelType": "root-object",
            "type": "object",
            "properties": {
                "$schema": {"type": "string"},
                "$label": {"type": "string"},
                "$id": {"type": "string"},
                "systems": {"type": "array", "modelType": "array-parent-objects", "items": {"$ref": "#/%24defs/system"}}
            },
            "$defs": {
                "system": {
                    "type": "object",
                    "modelType": "parent-object",
                    "title": "System",
                    "$link": {"tags": ["system"], "scope": "global"},
                    "properties": {
                        "$label": {"type": "string"},
                        "$id": {"type": "string"},
                        "visibility": {"type": "string", "default": "public"},
                        "rate": {"type": "number", "default": 50},
                        "enabled": {"type": "boolean"},
                        "limits": {"type": "object", "properties": {
                            "max": {"type": "integer", "const": 9},
                            "tags": {"type": "array"}
                        }},
                        "blob": {"type": "blob"}
                    }
                }
            }
        })
    }

    #[test]
    fn test_scenario_minimal_object() {
        let schema = json!({"properties": {"$label": {}, "$id": {}, "name": {"type": "string"}}});
        let factory = ObjectFactory::new(&schema, SchemaResolver::default());
        let out = factory.synthesize(&schema, "Widget").unwrap();

        let object = out.value.as_object().unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["$label", "$id", "name"]);
        assert_eq!(out.value["$label"], "Widget");
        assert_eq!(out.value["name"], "");
        let id = out.value["$id"].as_str().unwrap();
        assert!(is_canonical_uuid(id));
        assert_eq!(out.last_id.as_deref(), Some(id));
        assert!(out.links.is_empty());
        assert!(out.diagnostics.is_empty());

        let mut document = json!({"old": true});
        let created = factory
            .create(&mut document, &schema, &JsonPath::root(), "Widget", true)
            .unwrap();
        assert!(created.path.is_root());
        assert!(document.get("old").is_none());
        assert_eq!(document["$label"], "Widget");
    }

    #[test]
    fn test_defaults_and_nested_objects() {
        let root = root_schema();
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        let out = factory.synthesize(&json!({"$ref": "#/%24defs/system"}), "Engine").unwrap();

        assert_eq!(out.value["visibility"], "public");
        assert_eq!(out.value["rate"], 50);
        assert_eq!(out.value["enabled"], false);
        assert_eq!(out.value["limits"], json!({"max": 9, "tags": []}));
        assert!(out.value.get("blob").is_none());
        assert_eq!(out.diagnostics.with_code(DiagnosticCode::UnsupportedType).len(), 1);

        assert_eq!(out.links.len(), 1);
        let link = &out.links[0];
        assert_eq!(link.visibility, "public");
        assert_eq!(link.label, "Engine");
        assert_eq!(link.spec.scope, LinkScope::Global);
        assert_eq!(out.value["$link"], json!({"tags": ["system"], "scope": "global", "dependencies": []}));
    }

    #[test]
    fn test_self_referential_schema_stops_at_cycle() {
        let root = json!({
            "$defs": {
                "node": {
                    "type": "object",
                    "properties": {
                        "$id": {"type": "string"},
                        "left": {"$ref": "#/%24defs/node"},
                        "right": {"$ref": "#/%24defs/node"}
                    }
                }
            }
        });
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        let out = factory.synthesize(&json!({"$ref": "#/%24defs/node"}), "Tree").unwrap();

        let object = out.value.as_object().unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["$id"]);
        let cycles = out.diagnostics.with_code(DiagnosticCode::UnresolvedRef);
        assert_eq!(cycles.len(), 2);
        assert!(cycles.iter().all(|d| d.message.contains("cycle")));
    }

    #[test]
    fn test_indirect_cycle_back_to_root_schema() {
        let root = json!({
            "$id": "outline",
            "type": "object",
            "properties": {
                "$id": {"type": "string"},
                "section": {"$ref": "#/%24defs/section"}
            },
            "$defs": {
                "section": {
                    "type": "object",
                    "properties": {
                        "$label": {"type": "string"},
                        "outline": {"$ref": "#"},
                        "child": {"$ref": "#/%24defs/section"}
                    }
                }
            }
        });
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        let out = factory.synthesize(&root, "Doc").unwrap();

        assert_eq!(out.value["section"], json!({"$label": "Doc"}));
        assert_eq!(out.diagnostics.with_code(DiagnosticCode::UnresolvedRef).len(), 2);
    }

    #[test]
    fn test_nested_objects_carry_the_supplied_label() {
        let schema = json!({
            "type": "object",
            "properties": {
                "$label": {"type": "string"},
                "owner": {"type": "object", "properties": {"$label": {"type": "string"}, "name": {"type": "string"}}}
            }
        });
        let factory = ObjectFactory::new(&schema, SchemaResolver::default());
        let out = factory.synthesize(&schema, "Widget").unwrap();
        assert_eq!(out.value["owner"], json!({"$label": "Widget", "name": ""}));
    }

    #[test]
    fn test_root_synthesis_copies_schema_id() {
        let root = root_schema();
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        let out = factory.synthesize(&root, "Demo").unwrap();
        assert_eq!(out.value["$schema"], "project");
        assert_eq!(out.value["systems"], json!([]));
    }

    #[test]
    fn test_create_appends_and_registers_links() {
        let root = root_schema();
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        let mut document = factory.synthesize(&root, "Demo").unwrap().value;
        let system = json!({"$ref": "#/%24defs/system"});

        let a = factory
            .create(&mut document, &system, &JsonPath::from(["systems", "7"]), "A", true)
            .unwrap();
        let b = factory
            .create(&mut document, &system, &JsonPath::from(["systems", "0"]), "B", true)
            .unwrap();

        assert_eq!(a.path, JsonPath::from(["systems", "0"]));
        assert_eq!(b.path, JsonPath::from(["systems", "1"]));

        let all = records(&document).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].path, b.path);
        let a_id = a.last_id.unwrap();
        let b_id = b.last_id.unwrap();
        assert!(all[0].depends_on(&b_id));
        assert_eq!(document["systems"][0]["$link"]["dependencies"], json!([b_id]));
        assert_eq!(document["systems"][0]["$id"], a_id);
    }

    #[test]
    fn test_insert_creates_missing_containers() {
        let mut document = json!({});
        let path = insert_subtree(&mut document, &JsonPath::from(["groups", "items", "0"]), json!({"x": 1})).unwrap();
        assert_eq!(path, JsonPath::from(["groups", "items", "0"]));
        assert_eq!(document, json!({"groups": {"items": [{"x": 1}]}}));

        let path = insert_subtree(&mut document, &JsonPath::from(["groups", "single"]), json!(2)).unwrap();
        assert_eq!(path, JsonPath::from(["groups", "single"]));
        assert_eq!(document["groups"]["single"], 2);

        let mut scalar = json!({"a": 1});
        assert!(insert_subtree(&mut scalar, &JsonPath::from(["a", "b"]), json!(0)).is_err());
    }

    #[test]
    fn test_unresolvable_top_level_schema_fails() {
        let root = root_schema();
        let factory = ObjectFactory::new(&root, SchemaResolver::default());
        assert!(factory.synthesize(&json!({"$ref": "#/nowhere"}), "x").is_err());
    }
}
