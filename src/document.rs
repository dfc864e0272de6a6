//! Open documents
//!
//! A [`Document`] is one instance file: its parsed content (the source of
//! truth), the item tree decoded from it, and its undo history. The tree is
//! only ever rebuilt through [`Document::refresh`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::config::OutputFormat;
use crate::decode::TreeDecoder;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{ModelError, Result};
use crate::history::History;
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaResolver;
use crate::store::ItemStore;

/// Replace `path` with `content` in one atomic step
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    content: Value,
    store: ItemStore,
    history: History,
    last_id_created: Option<String>,
    diagnostics: Diagnostics,
}

impl Document {
    /// Load an existing instance file
    pub fn open(path: impl Into<PathBuf>, max_steps: usize) -> Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let content = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "opened document");
        Ok(Self {
            history: History::new(path.clone(), text, max_steps),
            path,
            content,
            store: ItemStore::new(),
            last_id_created: None,
            diagnostics: Diagnostics::new(),
        })
    }

    /// Write a new instance file and open it
    pub fn create(path: impl Into<PathBuf>, content: &Value, format: OutputFormat, max_steps: usize) -> Result<Self> {
        let path = path.into();
        write_atomic(&path, &format.render(content)?)?;
        tracing::info!(path = %path.display(), "created document");
        Self::open(path, max_steps)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Diagnostics of the last refresh
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Root label: the document's `$label`, else the file stem
    pub fn label(&self) -> String {
        self.content
            .get("$label")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| {
                self.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
    }

    pub fn last_id_created(&self) -> Option<&str> {
        self.last_id_created.as_deref()
    }

    pub fn set_last_id_created(&mut self, id: Option<String>) {
        self.last_id_created = id;
    }

    /// Re-read the file, delivering its text to the history as a change
    /// notification. Returns whether the content changed.
    pub fn reload(&mut self) -> Result<bool> {
        let text = std::fs::read_to_string(&self.path)?;
        self.history.on_document_changed(&text);
        let content: Value = serde_json::from_str(&text)?;
        let changed = content != self.content;
        self.content = content;
        Ok(changed)
    }

    /// Reload and rebuild the item tree.
    ///
    /// A missing or unknown `$model`/`$schema` leaves the tree empty and is
    /// reported as a diagnostic, not an error.
    pub fn refresh(&mut self, registry: &SchemaRegistry, resolver: SchemaResolver) -> Result<&Diagnostics> {
        self.reload()?;

        let schema = match registry.for_document(&self.content, &self.path) {
            Ok(schema) => Arc::new(schema.clone()),
            Err(e) => {
                let code = match e {
                    ModelError::MissingModel { .. } => DiagnosticCode::MissingModel,
                    _ => DiagnosticCode::SchemaNotFound,
                };
                self.store.clear();
                self.diagnostics = Diagnostics::new();
                self.diagnostics.push(code, &[], e.to_string());
                return Ok(&self.diagnostics);
            }
        };

        let label = self.label();
        self.diagnostics = TreeDecoder::new(&mut self.store, resolver, schema)
            .with_last_id(self.last_id_created.clone())
            .decode_document(&self.path, &label, &self.content);
        tracing::debug!(
            path = %self.path.display(),
            items = self.store.len(),
            diagnostics = self.diagnostics.len(),
            "refreshed document"
        );
        Ok(&self.diagnostics)
    }

    /// Replace the content and write it to disk; the write is recorded in the
    /// history
    pub fn write(&mut self, content: Value, format: OutputFormat) -> Result<()> {
        let text = format.render(&content)?;
        write_atomic(&self.path, &text)?;
        self.history.on_document_changed(&text);
        self.content = content;
        tracing::info!(path = %self.path.display(), "wrote document");
        Ok(())
    }

    /// Undo the last write. The file is rewritten; the tree is stale until the
    /// next refresh.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.history.undo()? {
            return Ok(false);
        }
        self.content = serde_json::from_str(self.history.current_content())?;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if !self.history.redo()? {
            return Ok(false);
        }
        self.content = serde_json::from_str(self.history.current_content())?;
        Ok(true)
    }
}
