//! Undo/redo history
//!
//! One [`History`] per open document: a linear stack of full-text snapshots.
//! `undo_stack[current_index]` is always the content on disk. Undo and redo
//! write the file themselves and raise an echo flag first, so the change
//! notification caused by their own write is not recorded as a new edit.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::write_atomic;
use crate::error::Result;

/// Default bound on retained snapshots
pub const DEFAULT_MAX_STEPS: usize = 256;

/// One full-file snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub content: String,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            taken_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct History {
    path: PathBuf,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    current_index: usize,
    current_content: String,
    suppress_echo: bool,
    /// 0 keeps every snapshot
    max_steps: usize,
}

impl History {
    /// Start a history whose only entry is `content`
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>, max_steps: usize) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            undo_stack: vec![Snapshot::new(content.clone())],
            redo_stack: Vec::new(),
            current_index: 0,
            current_content: content,
            suppress_echo: false,
            max_steps,
        }
    }

    /// Start a history from the file's current content
    pub fn open(path: impl AsRef<Path>, max_steps: usize) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(path, content, max_steps))
    }

    /// Change notification for the document. Returns whether a snapshot was
    /// recorded.
    ///
    /// The echo of our own undo/redo write is swallowed once. Content equal to
    /// the current snapshot is ignored. Anything else is a new edit and
    /// discards the redo stack.
    pub fn on_document_changed(&mut self, text: &str) -> bool {
        if self.suppress_echo {
            self.suppress_echo = false;
            if text == self.current_content {
                tracing::trace!(path = %self.path.display(), "swallowed history echo");
                return false;
            }
        }
        if text == self.current_content {
            return false;
        }

        self.undo_stack.truncate(self.current_index + 1);
        self.undo_stack.push(Snapshot::new(text));
        self.redo_stack.clear();
        self.trim();
        self.current_index = self.undo_stack.len() - 1;
        self.current_content = text.to_string();
        tracing::debug!(path = %self.path.display(), index = self.current_index, "recorded snapshot");
        true
    }

    /// Step back one snapshot and write it. `Ok(false)` when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if self.current_index == 0 {
            tracing::info!(path = %self.path.display(), "nothing to undo");
            return Ok(false);
        }
        let target = self.undo_stack[self.current_index - 1].content.clone();
        self.write(&target)?;

        self.redo_stack.push(Snapshot::new(self.current_content.clone()));
        self.current_index -= 1;
        self.current_content = target;
        tracing::info!(path = %self.path.display(), index = self.current_index, "undo");
        Ok(true)
    }

    /// Re-apply the most recently undone snapshot and write it. `Ok(false)`
    /// when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(next) = self.redo_stack.last().cloned() else {
            tracing::info!(path = %self.path.display(), "nothing to redo");
            return Ok(false);
        };
        self.write(&next.content)?;

        self.redo_stack.pop();
        self.current_index += 1;
        if self.current_index < self.undo_stack.len() {
            self.undo_stack[self.current_index] = next.clone();
        } else {
            self.undo_stack.push(next.clone());
        }
        self.current_content = next.content;
        tracing::info!(path = %self.path.display(), index = self.current_index, "redo");
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn current_content(&self) -> &str {
        &self.current_content
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.undo_stack
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, content: &str) -> Result<()> {
        self.suppress_echo = true;
        if let Err(e) = write_atomic(&self.path, content) {
            self.suppress_echo = false;
            return Err(e);
        }
        Ok(())
    }

    fn trim(&mut self) {
        if self.max_steps == 0 || self.undo_stack.len() <= self.max_steps {
            return;
        }
        let excess = self.undo_stack.len() - self.max_steps;
        self.undo_stack.drain(0..excess);
    }
}
