//! XDG-compliant path resolution for seshat.
//!
//! Resolves the config, data, and state directories from the XDG Base
//! Directory environment variables with the standard home-relative
//! fallbacks.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(seshat::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(seshat::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for seshat.
#[derive(Debug, Clone)]
pub struct SeshatPaths {
    /// `$XDG_CONFIG_HOME/seshat/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/seshat/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/seshat/`
    pub state_dir: PathBuf,
}

impl SeshatPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("seshat");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("seshat");

        let state_dir = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/state"))
            .join("seshat");

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
        })
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.state_dir,
            &self.lineage_dir(),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default directory for the durable lineage store.
    pub fn lineage_dir(&self) -> PathBuf {
        self.data_dir.join("lineage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_end_in_seshat() {
        // Read-only: mutating env vars is unsafe in edition 2024.
        let paths = SeshatPaths::resolve().unwrap();
        assert!(paths.config_dir.to_string_lossy().contains("seshat"));
        assert!(paths.data_dir.to_string_lossy().contains("seshat"));
        assert!(paths.state_dir.to_string_lossy().contains("seshat"));
    }

    #[test]
    fn derived_paths_stay_under_their_roots() {
        let paths = SeshatPaths {
            config_dir: PathBuf::from("/cfg/seshat"),
            data_dir: PathBuf::from("/data/seshat"),
            state_dir: PathBuf::from("/state/seshat"),
        };
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/seshat/config.toml"));
        assert_eq!(paths.lineage_dir(), PathBuf::from("/data/seshat/lineage"));
    }
}
