//! JSON paths and node identity

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// Ordered object keys / array indices from a document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPath(Vec<String>);

impl JsonPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// This path with one more segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// This path without its last segment; `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn starts_with(&self, prefix: &JsonPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Slash-joined segments, no leading separator
    pub fn joined(&self) -> String {
        self.0.join("/")
    }

    /// Walk a document along this path
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.0 {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Walk a document mutably along this path
    pub fn get_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = document;
        for segment in &self.0 {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Like [`JsonPath::get`] but failing with `PathNotFound`
    pub fn require<'a>(&self, document: &'a Value) -> Result<&'a Value> {
        self.get(document)
            .ok_or_else(|| ModelError::PathNotFound(self.joined()))
    }

    /// Overwrite the value at this path. The parent must already exist.
    pub fn set(&self, document: &mut Value, value: Value) -> Result<()> {
        let Some(parent) = self.parent() else {
            *document = value;
            return Ok(());
        };
        let key = self.0.last().cloned().unwrap_or_default();
        match parent.get_mut(document) {
            Some(Value::Object(map)) => {
                map.insert(key, value);
                Ok(())
            }
            Some(Value::Array(items)) => {
                let slot = key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| ModelError::PathNotFound(self.joined()))?;
                *slot = value;
                Ok(())
            }
            Some(_) => Err(ModelError::shape(parent.segments(), "not a container")),
            None => Err(ModelError::PathNotFound(parent.joined())),
        }
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.joined())
    }
}

/// Parses `/a/b`, `a/b` or `/` (the root)
impl std::str::FromStr for JsonPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

impl From<Vec<String>> for JsonPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for JsonPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for JsonPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

/// Node identity key: file path immediately followed by the joined json path,
/// with no separator in between.
pub fn item_key(file: &Path, path: &JsonPath) -> String {
    format!("{}{}", file.display(), path.joined())
}
