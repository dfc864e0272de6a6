//! Configuration management for the workbench
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (modelworks.toml)
//! - Environment variables (MODELWORKS__*)
//!
//! ## Example config file (modelworks.toml):
//! ```toml
//! [paths]
//! models = "./models"
//! projects = "./projects"
//!
//! [history]
//! max_steps = 256
//!
//! [links]
//! full_propagation = true
//! prune_dangling = false
//!
//! [resolver]
//! max_depth = 64
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the workbench
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkbenchConfig {
    /// Model and project directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Undo/redo settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Link propagation settings
    #[serde(default)]
    pub links: LinksConfig,

    /// $ref resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Document serialization settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `*.model.json` schemas
    #[serde(default = "default_models_dir")]
    pub models: PathBuf,

    /// Directory holding project instance documents
    #[serde(default = "default_projects_dir")]
    pub projects: PathBuf,
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum undo snapshots kept per document (0 = unbounded)
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Re-run propagation for every record after each creation
    #[serde(default = "default_true")]
    pub full_propagation: bool,

    /// Drop `$links` records whose object no longer exists after a removal
    #[serde(default)]
    pub prune_dangling: bool,
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Longest `$ref` chain followed before giving up
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    /// Render a document in this format
    pub fn render(&self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

// Default value functions
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("projects")
}

fn default_max_steps() -> usize {
    256
}

fn default_max_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models: default_models_dir(),
            projects: default_projects_dir(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            full_propagation: true,
            prune_dangling: false,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl WorkbenchConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "modelworks.toml",
            ".modelworks.toml",
            "config/modelworks.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "modelworks", "modelworks") {
            let xdg_config = config_dir.config_dir().join("modelworks.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MODELWORKS__HISTORY__MAX_STEPS=32
        builder = builder.add_source(
            Environment::with_prefix("MODELWORKS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Models directory (resolves relative paths against the working directory)
    pub fn models_dir(&self) -> PathBuf {
        absolutize(&self.paths.models)
    }

    /// Projects directory (resolves relative paths against the working directory)
    pub fn projects_dir(&self) -> PathBuf {
        absolutize(&self.paths.projects)
    }
}

fn absolutize(path: &PathBuf) -> PathBuf {
    if path.is_absolute() {
        path.clone()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}
