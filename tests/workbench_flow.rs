//! Workbench Flow Tests
//!
//! Drives the operator intents end to end against documents on disk.

use std::path::{Path, PathBuf};

use modelworks::{
    JsonPath, LinkScope, SchemaRegistry, TreeEvent, Workbench, WorkbenchConfig, DiagnosticCode,
};
use serde_json::{json, Value};
use tempfile::TempDir;

const PROJECT_MODEL: &str = include_str!("fixtures/project.model.json");
const NETWORK_MODEL: &str = include_str!("fixtures/network.model.json");
const DEMO: &str = include_str!("fixtures/demo.json");

const ENGINE: &str = "0d9f5f62-3a3e-4c59-9d55-0b4c1f9e1a01";
const PUMP: &str = "7c1e2b44-9f0a-4e1b-8a6c-2d3e4f5a6b02";

fn registry() -> SchemaRegistry {
    let mut loader = SchemaRegistry::load();
    loader
        .add_str(PROJECT_MODEL)
        .unwrap()
        .add_str(NETWORK_MODEL)
        .unwrap();
    loader.freeze()
}

fn bench_with(dir: &TempDir, prune_dangling: bool) -> Workbench {
    let mut config = WorkbenchConfig::default();
    config.paths.models = dir.path().to_path_buf();
    config.paths.projects = dir.path().to_path_buf();
    config.links.prune_dangling = prune_dangling;
    Workbench::new(registry(), config)
}

fn bench(dir: &TempDir) -> Workbench {
    bench_with(dir, false)
}

fn open_demo(dir: &TempDir, bench: &mut Workbench) -> PathBuf {
    let file = dir.path().join("demo.json");
    std::fs::write(&file, DEMO).unwrap();
    let diagnostics = bench.open(&file).unwrap();
    assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
    file
}

fn on_disk(file: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap()
}

fn root() -> JsonPath {
    JsonPath::root()
}

/// Create a child through the single option whose title matches
fn add(bench: &mut Workbench, file: &Path, parent: &JsonPath, title: &str, name: &str) -> JsonPath {
    let options = bench.child_options(file, parent).unwrap();
    let option = options.iter().find(|o| o.title == title).unwrap().clone();
    bench.create_child(file, parent, &option, name).unwrap()
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_open_builds_visible_tree() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = open_demo(&dir, &mut bench);

    let document = bench.document(&file).unwrap();
    let store = document.store();
    let root_id = store.root().unwrap();
    let labels: Vec<&str> = store.children(root_id).map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["Engine"]);

    let engine_path = JsonPath::from(["systems", "0"]);
    let pump_path = JsonPath::from(["systems", "0", "components", "0"]);
    let engine = bench.get_item(&file, &engine_path).unwrap();
    let children: Vec<&str> = store
        .children(store.find(&file, &engine_path).unwrap())
        .map(|i| i.label.as_str())
        .collect();
    assert_eq!(children, vec!["Pump"]);
    assert_eq!(engine.description(), Some("System"));

    assert_eq!(bench.get_parent(&file, &pump_path).unwrap().label, "Engine");
    assert!(bench.get_parent(&file, &engine_path).unwrap().is_root());

    let pump = bench.get_item(&file, &pump_path).unwrap();
    let caps = pump.capabilities();
    assert!(caps.add && caps.remove && caps.duplicate);

    let hidden: Vec<&str> = store.hidden_children(root_id).map(|i| i.label.as_str()).collect();
    assert!(hidden.contains(&"settings"));
    assert!(hidden.contains(&"strict"));
    assert!(hidden.contains(&"systems"));
}

#[test]
fn test_unknown_model_is_a_diagnostic() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = dir.path().join("stray.json");
    std::fs::write(&file, r#"{"$model": "nope"}"#).unwrap();

    let diagnostics = bench.open(&file).unwrap();
    assert_eq!(diagnostics.with_code(DiagnosticCode::SchemaNotFound).len(), 1);
    assert!(bench.get_item(&file, &root()).is_none());
}

// =============================================================================
// Creation and links
// =============================================================================

#[test]
fn test_create_root_document() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = bench.create_root("project", "Alpha").unwrap();

    assert_eq!(file, dir.path().join("Alpha.json"));
    let content = on_disk(&file);
    assert_eq!(content["$model"], "project");
    assert_eq!(content["$label"], "Alpha");
    assert_eq!(content["systems"], json!([]));
    assert_eq!(content["settings"], json!({"strict": true}));
    assert_eq!(content["$links"], json!([]));
    assert_eq!(bench.get_item(&file, &root()).unwrap().label, "Alpha");

    assert!(bench.create_root("project", "Alpha").is_err());
    assert!(bench.create_root("missing", "Beta").is_err());
}

#[test]
fn test_create_children_propagates_links() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = bench.create_root("project", "Alpha").unwrap();

    let options = bench.child_options(&file, &root()).unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].insertion_path, JsonPath::from(["systems", "0"]));

    let engine_path = add(&mut bench, &file, &root(), "System", "Engine");
    assert_eq!(engine_path, JsonPath::from(["systems", "0"]));
    assert_eq!(bench.last_item_created(&file).unwrap().label, "Engine");

    let pump_path = add(&mut bench, &file, &engine_path, "Component", "Pump");
    let valve_path = add(&mut bench, &file, &engine_path, "Component", "Valve");
    assert_eq!(valve_path, JsonPath::from(["systems", "0", "components", "1"]));
    assert_eq!(bench.last_item_created(&file).unwrap().label, "Valve");

    let content = on_disk(&file);
    let engine_id = content["systems"][0]["$id"].as_str().unwrap().to_string();
    let pump_id = content["systems"][0]["components"][0]["$id"].as_str().unwrap().to_string();
    let valve_id = content["systems"][0]["components"][1]["$id"].as_str().unwrap().to_string();
    assert_eq!(
        content["systems"][0]["components"][0]["ratings"],
        json!({"voltage": 12, "notes": ""})
    );

    let links = bench.links(&file).unwrap();
    assert_eq!(links.len(), 3);
    let engine = &links[0];
    assert_eq!(engine.scope, LinkScope::Local);
    assert_eq!(engine.visibility, "public");
    assert_eq!(engine.path, engine_path);
    assert_eq!(
        engine.dependencies.clone().unwrap(),
        vec![engine_id.clone(), pump_id.clone(), valve_id.clone()]
    );
    assert!(links[1].depends_on(&valve_id));
    assert!(!links[1].depends_on(&pump_id));
    assert!(links[2].depends_on(&pump_id));
    assert_eq!(links[2].path, valve_path);

    // the object-side block mirrors the record
    assert_eq!(
        content["systems"][0]["$link"]["dependencies"],
        json!([engine_id, pump_id, valve_id])
    );

    let visible = bench.effective_dependencies(&file, &pump_path).unwrap();
    assert_eq!(visible.len(), 3);
    let options = bench
        .link_options(&file, &pump_path.child("peer"), &["component".to_string()])
        .unwrap();
    let labels: Vec<&str> = options.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Pump", "Valve"]);
}

#[test]
fn test_create_child_queues_events() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = bench.create_root("network", "Net").unwrap();
    bench.drain_events();

    let path = add(&mut bench, &file, &root(), "Node", "N1");
    let events = bench.drain_events();
    assert_eq!(
        events,
        vec![
            TreeEvent::Refreshed { file: file.clone() },
            TreeEvent::Created { file: file.clone(), path },
        ]
    );
    assert!(bench.drain_events().is_empty());
}

// =============================================================================
// Editing and history
// =============================================================================

#[test]
fn test_edit_label_syncs_link_and_undoes() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = bench.create_root("project", "Alpha").unwrap();
    let engine_path = add(&mut bench, &file, &root(), "System", "Engine");

    bench
        .edit_leaf(&file, &engine_path.child("$label"), json!("Main"))
        .unwrap();
    assert_eq!(bench.get_item(&file, &engine_path).unwrap().label, "Main");
    assert_eq!(bench.links(&file).unwrap()[0].label, "Main");

    bench
        .edit_leaf(&file, &engine_path.child("visibility"), json!("internal"))
        .unwrap();
    assert_eq!(bench.links(&file).unwrap()[0].visibility, "internal");

    assert!(bench.undo(&file).unwrap());
    assert!(bench.undo(&file).unwrap());
    assert_eq!(bench.get_item(&file, &engine_path).unwrap().label, "Engine");
    assert_eq!(bench.links(&file).unwrap()[0].label, "Engine");

    assert!(bench.redo(&file).unwrap());
    assert_eq!(on_disk(&file)["systems"][0]["$label"], "Main");

    let events = bench.drain_events();
    assert!(events.contains(&TreeEvent::Undone { file: file.clone() }));
    assert!(events.contains(&TreeEvent::Redone { file: file.clone() }));
}

#[test]
fn test_undo_walks_back_to_creation() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = bench.create_root("network", "Net").unwrap();
    let created = std::fs::read_to_string(&file).unwrap();

    add(&mut bench, &file, &root(), "Node", "N1");
    add(&mut bench, &file, &root(), "Node", "N2");
    assert!(bench.undo(&file).unwrap());
    assert!(bench.undo(&file).unwrap());
    assert!(!bench.undo(&file).unwrap());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), created);
    assert!(bench.document(&file).unwrap().history().can_redo());

    // a new edit discards what could have been redone
    add(&mut bench, &file, &root(), "Node", "N3");
    assert!(!bench.redo(&file).unwrap());
    assert_eq!(on_disk(&file)["nodes"][0]["$label"], "N3");
}

// =============================================================================
// Removal
// =============================================================================

#[test]
fn test_remove_child_clears_references_and_keeps_links() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = open_demo(&dir, &mut bench);
    let pump_path = JsonPath::from(["systems", "0", "components", "0"]);

    let removed = bench.remove_node(&file, &pump_path).unwrap();
    assert_eq!(removed, 2);

    let content = on_disk(&file);
    assert_eq!(content["systems"][0]["components"], json!([]));
    assert_eq!(content["systems"][0]["$link"]["dependencies"], json!([ENGINE]));
    assert_eq!(bench.links(&file).unwrap().len(), 2);
    assert!(bench.get_item(&file, &pump_path).is_none());
    assert!(bench.references_to(&file, PUMP).unwrap().is_empty());
}

#[test]
fn test_remove_with_pruning_drops_dangling_links() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench_with(&dir, true);
    let file = open_demo(&dir, &mut bench);

    bench
        .remove_node(&file, &JsonPath::from(["systems", "0", "components", "0"]))
        .unwrap();
    let links = bench.links(&file).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].id, ENGINE);
}

#[test]
fn test_remove_root_deletes_file() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = open_demo(&dir, &mut bench);

    bench.remove_node(&file, &root()).unwrap();
    assert!(!file.exists());
    assert!(bench.document(&file).is_none());
}

#[test]
fn test_references_include_placeholders() {
    let dir = TempDir::new().unwrap();
    let mut bench = bench(&dir);
    let file = open_demo(&dir, &mut bench);

    let refs = bench.references_to(&file, ENGINE).unwrap();
    assert!(refs.contains(&JsonPath::from(["systems", "0", "components", "0", "peer"])));
}

// =============================================================================
// Documents without links
// =============================================================================

const NOTE_MODEL: &str = r#"{
  "$id": "note",
  "title": "Note",
  "root": true,
  "type": "object",
  "properties": {
    "$model": { "type": "string" },
    "$label": { "modelType": "input-string", "type": "string" },
    "$id": { "modelType": "hidden", "type": "string" },
    "body": { "modelType": "text-area", "type": "string" }
  }
}"#;

fn note_bench(dir: &TempDir, prune_dangling: bool) -> Workbench {
    let mut loader = SchemaRegistry::load();
    loader.add_str(NOTE_MODEL).unwrap();
    let mut config = WorkbenchConfig::default();
    config.paths.projects = dir.path().to_path_buf();
    config.links.prune_dangling = prune_dangling;
    Workbench::new(loader.freeze(), config)
}

#[test]
fn test_edit_label_without_links_registry() {
    let dir = TempDir::new().unwrap();
    let mut bench = note_bench(&dir, false);
    let file = bench.create_root("note", "Memo").unwrap();
    assert!(on_disk(&file).get("$links").is_none());

    bench
        .edit_leaf(&file, &JsonPath::from(["$label"]), json!("Renamed"))
        .unwrap();
    let content = on_disk(&file);
    assert_eq!(content["$label"], "Renamed");
    assert!(content.get("$links").is_none());
    assert_eq!(bench.get_item(&file, &root()).unwrap().label, "Renamed");
}

#[test]
fn test_remove_with_pruning_without_links_registry() {
    let dir = TempDir::new().unwrap();
    let mut bench = note_bench(&dir, true);
    let file = bench.create_root("note", "Memo").unwrap();

    let removed = bench.remove_node(&file, &JsonPath::from(["body"])).unwrap();
    assert_eq!(removed, 1);
    let content = on_disk(&file);
    assert!(content.get("body").is_none());
    assert!(content.get("$links").is_none());
}

#[test]
fn test_reopen_keeps_history() {
    let dir = TempDir::new().unwrap();
    let mut bench = note_bench(&dir, false);
    let file = bench.create_root("note", "Memo").unwrap();
    bench
        .edit_leaf(&file, &JsonPath::from(["body"]), json!("first draft"))
        .unwrap();

    bench.open(&file).unwrap();
    assert!(bench.document(&file).unwrap().history().can_undo());
    assert!(bench.undo(&file).unwrap());
    assert_eq!(on_disk(&file)["body"], "");
}

#[test]
fn test_create_root_rejects_names_outside_projects() {
    let dir = TempDir::new().unwrap();
    let mut bench = note_bench(&dir, false);
    assert!(bench.create_root("note", "../escape").is_err());
    assert!(bench.create_root("note", "nested/escape").is_err());
    assert!(!dir.path().parent().unwrap().join("escape.json").exists());
}
