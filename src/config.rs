// src/config.rs

//! Agent configuration
//!
//! Loaded from a TOML file named by `--config`, else by `$CONVEYOR_CONFIG`,
//! else built from defaults. Every field is optional in the file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CONVEYOR_CONFIG";

/// Agent-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Interpreter for `.sh` scripts
    pub bash_executable: String,

    /// Interpreter for `.py` scripts
    pub python_executable: String,

    /// Interpreter for `.ps1` scripts
    pub pwsh_executable: String,

    /// Where inline scripts are staged and packages extracted
    /// (default: a fresh directory under the system temp dir)
    pub work_dir: Option<PathBuf>,

    /// Deployment journal; no journal is kept when unset
    pub journal_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bash_executable: "bash".to_string(),
            python_executable: "python3".to_string(),
            pwsh_executable: "pwsh".to_string(),
            work_dir: None,
            journal_path: None,
        }
    }
}

impl AgentConfig {
    /// Parse TOML text
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        debug!("Loaded agent configuration from {}", path.display());
        Self::parse(&text)
    }

    /// Resolve the config: explicit path, then environment, then defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.python_executable, "python3");
        assert!(config.journal_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AgentConfig::parse(
            r#"
            bash_executable = "/usr/local/bin/bash"
            journal_path = "/var/lib/conveyor/journal.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.bash_executable, "/usr/local/bin/bash");
        assert_eq!(config.pwsh_executable, "pwsh");
        assert_eq!(config.journal_path, Some(PathBuf::from("/var/lib/conveyor/journal.jsonl")));
    }

    #[test]
    fn test_invalid_toml_is_unexpected() {
        let err = AgentConfig::parse("log_level = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_known());
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = AgentConfig::resolve(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
