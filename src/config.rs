//! File configuration for the seshat CLI.
//!
//! Persisted as TOML at `$XDG_CONFIG_HOME/seshat/config.toml`. Every field
//! has a serde default so a partial (or missing) file is valid; CLI flags
//! override whatever the file says.

use std::path::PathBuf;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::paths::SeshatPaths;

/// Errors from config file operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(seshat::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(seshat::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(seshat::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Persistent configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeshatConfig {
    /// Override for the durable store directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Depth ceiling for traversals when no explicit bound is passed.
    #[serde(default)]
    pub max_traversal_depth: Option<usize>,
    /// Relationship kind used when none is given on the command line.
    #[serde(default = "default_relationship_kind")]
    pub default_relationship_kind: String,
}

fn default_relationship_kind() -> String {
    "derived-from".into()
}

impl Default for SeshatConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_traversal_depth: None,
            default_relationship_kind: default_relationship_kind(),
        }
    }
}

impl SeshatConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &std::path::Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Convert to an [`EngineConfig`], filling the data directory from the
    /// resolved paths when the file does not pin one.
    pub fn to_engine_config(&self, paths: &SeshatPaths) -> EngineConfig {
        EngineConfig {
            data_dir: Some(
                self.data_dir
                    .clone()
                    .unwrap_or_else(|| paths.lineage_dir()),
            ),
            max_traversal_depth: self.max_traversal_depth,
        }
    }
}
