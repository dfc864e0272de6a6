//! Error types for the modelworks core

use std::path::PathBuf;

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model and project errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Schema not found: {id}")]
    SchemaNotFound { id: String },

    #[error("Document {path} declares neither $model nor $schema")]
    MissingModel { path: PathBuf },

    #[error("Unresolved $ref {pointer}: no segment '{segment}'")]
    UnresolvedRef { pointer: String, segment: String },

    #[error("$ref cycle detected at {pointer}")]
    SchemaCycle { pointer: String },

    #[error("$ref chain exceeded depth {depth} at {pointer}")]
    RefDepthExceeded { pointer: String, depth: usize },

    #[error("Unsupported modelType: {0}")]
    UnsupportedModelType(String),

    #[error("Unsupported property type: {0}")]
    UnsupportedType(String),

    #[error("Invalid document shape at /{path}: {message}")]
    Shape { path: String, message: String },

    #[error("Path not found in document: /{0}")]
    PathNotFound(String),

    #[error("No item at {file} /{path}")]
    ItemNotFound { file: PathBuf, path: String },

    #[error("Invalid document name '{0}': must be a plain file name")]
    InvalidName(String),

    #[error("Document not open: {0}")]
    DocumentNotOpen(PathBuf),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl ModelError {
    /// Build a shape error for a path rendered as slash-joined segments
    pub fn shape(path: &[String], message: impl Into<String>) -> Self {
        Self::Shape {
            path: path.join("/"),
            message: message.into(),
        }
    }
}
