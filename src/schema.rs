//! Schema types and structures
//!
//! Model schemas are plain JSON-Schema documents extended with a small closed
//! set of descriptive keywords: `modelType`, `hidden`, `$link`, `const` and
//! `default`. This module gives those keywords types; everything else stays as
//! raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

// =============================================================================
// Model Type
// =============================================================================

/// Discriminator deciding how a property is decoded and where it is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    RootObject,
    ParentObject,
    ArrayParentObjects,
    Folder,
    SubObject,
    ArrayCreator,
    Hidden,
    InputString,
    TextArea,
    Checkbox,
    DropdownSelect,
    DropdownSelectTag,
    PoolDropdownSelect,
    PoolDropdownSelectTag,
}

/// Where a decoded node goes relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Visible tree node, recursed with itself as parent
    Visible,
    /// Transparent: contents land in the enclosing parent
    Folder,
    /// Property-editor node, recursed with itself as parent
    Nested,
    /// Property-editor node, never recursed
    Leaf,
}

impl ModelType {
    /// Parse a `modelType` keyword. `root` is accepted as the legacy spelling
    /// of `root-object`.
    pub fn parse(s: &str) -> Option<Self> {
        let ty = match s {
            "root-object" | "root" => Self::RootObject,
            "parent-object" => Self::ParentObject,
            "array-parent-objects" => Self::ArrayParentObjects,
            "folder" => Self::Folder,
            "sub-object" => Self::SubObject,
            "array-creator" => Self::ArrayCreator,
            "hidden" => Self::Hidden,
            "input-string" => Self::InputString,
            "text-area" => Self::TextArea,
            "checkbox" => Self::Checkbox,
            "dropdown-select" => Self::DropdownSelect,
            "dropdown-select-tag" => Self::DropdownSelectTag,
            "pool-dropdown-select" => Self::PoolDropdownSelect,
            "pool-dropdown-select-tag" => Self::PoolDropdownSelectTag,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RootObject => "root-object",
            Self::ParentObject => "parent-object",
            Self::ArrayParentObjects => "array-parent-objects",
            Self::Folder => "folder",
            Self::SubObject => "sub-object",
            Self::ArrayCreator => "array-creator",
            Self::Hidden => "hidden",
            Self::InputString => "input-string",
            Self::TextArea => "text-area",
            Self::Checkbox => "checkbox",
            Self::DropdownSelect => "dropdown-select",
            Self::DropdownSelectTag => "dropdown-select-tag",
            Self::PoolDropdownSelect => "pool-dropdown-select",
            Self::PoolDropdownSelectTag => "pool-dropdown-select-tag",
        }
    }

    pub fn placement(&self) -> Placement {
        match self {
            Self::RootObject | Self::ParentObject | Self::ArrayParentObjects => Placement::Visible,
            Self::Folder => Placement::Folder,
            Self::SubObject | Self::ArrayCreator | Self::Hidden => Placement::Nested,
            Self::InputString
            | Self::TextArea
            | Self::Checkbox
            | Self::DropdownSelect
            | Self::DropdownSelectTag
            | Self::PoolDropdownSelect
            | Self::PoolDropdownSelectTag => Placement::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.placement() == Placement::Leaf
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Property Type
// =============================================================================

/// JSON-Schema `type` values the synthesizer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// Value used when a schema carries neither `const` nor `default`
    pub fn zero_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number | Self::Integer => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Array => Value::Array(Vec::new()),
            Self::Object => Value::Object(Map::new()),
        }
    }
}

// =============================================================================
// Links
// =============================================================================

/// How far a link's id propagates into other links' dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkScope {
    Local,
    Parent,
    Global,
}

impl LinkScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "parent" => Some(Self::Parent),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

/// The `$link` keyword on a schema node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default)]
    pub tags: Vec<String>,
    pub scope: LinkScope,
}

// =============================================================================
// Schema Node
// =============================================================================

/// Typed view over a resolved schema fragment
#[derive(Debug, Clone, Copy)]
pub struct SchemaNode<'a> {
    raw: &'a Value,
}

impl<'a> SchemaNode<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    fn str_field(&self, key: &str) -> Option<&'a str> {
        self.raw.get(key).and_then(Value::as_str)
    }

    /// The `modelType` keyword. `Ok(None)` when absent, an error when the
    /// keyword names something outside the closed set.
    pub fn model_type(&self) -> Result<Option<ModelType>> {
        match self.str_field("modelType") {
            None => Ok(None),
            Some(s) => ModelType::parse(s)
                .map(Some)
                .ok_or_else(|| ModelError::UnsupportedModelType(s.to_string())),
        }
    }

    /// The `type` keyword. `Ok(None)` when absent.
    pub fn property_type(&self) -> Result<Option<PropertyType>> {
        match self.raw.get("type") {
            None => Ok(None),
            Some(Value::String(s)) => PropertyType::parse(s)
                .map(Some)
                .ok_or_else(|| ModelError::UnsupportedType(s.clone())),
            Some(other) => Err(ModelError::UnsupportedType(other.to_string())),
        }
    }

    pub fn hidden(&self) -> bool {
        self.raw.get("hidden").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Root schemas: `root: true` or a root `modelType`
    pub fn is_root(&self) -> bool {
        self.raw.get("root").and_then(Value::as_bool).unwrap_or(false)
            || matches!(self.model_type(), Ok(Some(ModelType::RootObject)))
    }

    pub fn id(&self) -> Option<&'a str> {
        self.str_field("$id")
    }

    pub fn title(&self) -> Option<&'a str> {
        self.str_field("title")
    }

    pub fn properties(&self) -> Option<&'a Map<String, Value>> {
        self.raw.get("properties").and_then(Value::as_object)
    }

    pub fn items(&self) -> Option<&'a Value> {
        self.raw.get("items")
    }

    /// `const`, falling back to `default`
    pub fn preset(&self) -> Option<&'a Value> {
        self.raw.get("const").or_else(|| self.raw.get("default"))
    }

    /// The `$link` keyword, if present and well formed
    pub fn link(&self) -> Result<Option<LinkSpec>> {
        match self.raw.get("$link") {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| ModelError::InvalidLink(e.to_string())),
        }
    }
}
