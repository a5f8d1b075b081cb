// src/scripting/mod.rs

//! Running user scripts in their interpreters
//!
//! A script run goes through three stages:
//!
//! - A [`ScriptBootstrapper`] for the script's syntax writes a configuration
//!   file embedding every variable (sensitive ones encrypted with the
//!   per-run key) and a bootstrap file that loads it and then the script.
//! - Each enabled [`ScriptWrapper`] adjusts the command, in list order.
//! - The [`ScriptEngine`] runs the command through the process runner with
//!   a service message sink attached, and deletes the generated files.

mod bootstrap;
mod engine;
mod wrappers;

pub use bootstrap::{
    BashBootstrapper, EmbeddedValue, PowerShellBootstrapper, PreparedScript, PythonBootstrapper,
    ScriptBootstrapper,
};
pub use engine::ScriptEngine;
pub use wrappers::{EnvironmentWrapper, ProxyWrapper, ScriptWrapper};

use std::fmt;
use std::path::{Path, PathBuf};

/// Script languages the agent can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptSyntax {
    Bash,
    Python,
    PowerShell,
}

impl ScriptSyntax {
    /// All supported syntaxes, in preference order
    pub const ALL: [ScriptSyntax; 3] = [Self::Bash, Self::Python, Self::PowerShell];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Bash => "sh",
            Self::Python => "py",
            Self::PowerShell => "ps1",
        }
    }

    /// Detect syntax from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL.into_iter().find(|s| s.extension() == ext)
    }

    /// Parse a syntax name as written in step variables
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "bash" | "sh" => Some(Self::Bash),
            "python" | "py" => Some(Self::Python),
            "powershell" | "pwsh" | "ps1" => Some(Self::PowerShell),
            _ => None,
        }
    }

    /// Default file name for an inline script body
    pub fn default_file_name(&self) -> String {
        format!("Script.{}", self.extension())
    }
}

impl fmt::Display for ScriptSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bash => "Bash",
            Self::Python => "Python",
            Self::PowerShell => "PowerShell",
        };
        f.write_str(name)
    }
}

/// A script file plus its raw parameter string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub path: PathBuf,
    pub parameters: Option<String>,
}

impl Script {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        let parameters = parameters.into();
        self.parameters = (!parameters.trim().is_empty()).then_some(parameters);
        self
    }

    /// File name for logs and error messages
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Directory the script runs in
    pub fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Parameters split on whitespace, for interpreters taking an argv
    pub fn parameter_args(&self) -> Vec<String> {
        self.parameters
            .as_deref()
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
