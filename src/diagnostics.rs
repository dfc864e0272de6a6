//! Diagnostics
//!
//! Collects warnings and errors raised while decoding or synthesizing.
//! None of these are fatal: the offending branch is skipped and processing
//! continues for its siblings.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Lookup ===
    /// No schema registered for a document's $model/$schema id
    SchemaNotFound,
    /// Document declares no $model/$schema
    MissingModel,
    /// Object key has no property schema
    MissingProperty,

    // === Shape ===
    /// Value is neither object nor array where structure was expected
    UnexpectedShape,

    // === Discriminators ===
    /// modelType outside the closed set
    UnsupportedModelType,
    /// Property `type` that synthesis cannot produce
    UnsupportedType,
    /// `$link` keyword that does not parse
    InvalidLink,

    // === Resolution ===
    /// $ref could not be resolved (missing segment, cycle, depth)
    UnresolvedRef,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaNotFound => "W001",
            Self::MissingModel => "W002",
            Self::MissingProperty => "W003",
            Self::UnexpectedShape => "E001",
            Self::UnsupportedModelType => "W004",
            Self::UnsupportedType => "W005",
            Self::InvalidLink => "W006",
            Self::UnresolvedRef => "E002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnexpectedShape | Self::UnresolvedRef => Severity::Error,

            Self::SchemaNotFound
            | Self::MissingModel
            | Self::MissingProperty
            | Self::UnsupportedModelType
            | Self::UnsupportedType
            | Self::InvalidLink => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single reported condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    /// JSON path (slash-joined) the condition was raised at
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}: {}", self.code, self.severity(), self.message)
        } else {
            write!(
                f,
                "[{}] {} at /{}: {}",
                self.code,
                self.severity(),
                self.path,
                self.message
            )
        }
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Collected diagnostics from one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a condition and log it at the level matching its severity
    pub fn push(&mut self, code: DiagnosticCode, path: &[String], message: impl Into<String>) {
        let item = Diagnostic {
            code,
            message: message.into(),
            path: path.join("/"),
        };
        match item.severity() {
            Severity::Error => tracing::error!(code = %item.code, path = %item.path, "{}", item.message),
            Severity::Warning => tracing::warn!(code = %item.code, path = %item.path, "{}", item.message),
            Severity::Info => tracing::info!(code = %item.code, path = %item.path, "{}", item.message),
        }
        self.items.push(item);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity() == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Diagnostics carrying the given code
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.items.iter().filter(|d| d.code == code).collect()
    }
}
