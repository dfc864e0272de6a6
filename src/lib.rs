//! Modelworks
//!
//! Schema-driven project models: JSON-Schema "model" files describe the
//! shape of JSON "project" instance files, and this crate turns one into a
//! navigable tree, synthesizes new objects, keeps cross-object links
//! consistent and records undo/redo history.
//!
//! ## Features
//!
//! - **$ref Resolution**: shallow-merge resolution with cycle and depth guards
//! - **Object Synthesis**: default-valued subtrees with fresh UUIDs
//! - **Tree Decoding**: `modelType`-driven placement into visible/hidden children
//! - **Link Graph**: `$links` registry with local/parent/global propagation
//! - **History**: per-document snapshot undo/redo with echo suppression
//!
//! ## Architecture
//!
//! ```text
//! Workbench
//! ├── SchemaRegistry        (frozen, swapped on refresh)
//! └── Document (per file)
//!     ├── content: Value    (source of truth)
//!     ├── ItemStore         (decoded tree, rebuilt by TreeDecoder)
//!     └── History           (snapshots)
//! ```

pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod factory;
pub mod history;
pub mod item;
pub mod links;
pub mod path;
pub mod refs;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod workbench;

pub use config::WorkbenchConfig;
pub use decode::TreeDecoder;
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use document::Document;
pub use error::{ModelError, Result};
pub use factory::{Created, ObjectFactory, Synthesized};
pub use history::History;
pub use item::{Capabilities, ChildOption, Item, ItemId};
pub use links::{LinkGraph, LinkRecord};
pub use path::JsonPath;
pub use registry::{RegistryLoader, SchemaRegistry};
pub use resolver::SchemaResolver;
pub use schema::{LinkScope, LinkSpec, ModelType, PropertyType, SchemaNode};
pub use store::ItemStore;
pub use workbench::{TreeEvent, Workbench};
