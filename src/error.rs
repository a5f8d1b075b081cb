// src/error.rs

//! Crate-wide error type
//!
//! Errors fall into two bands. Known deployment failures are problems the
//! operator can fix (a missing package, a bad variable, a script that exited
//! non-zero); they are reported as a single message and exit with
//! [`KNOWN_FAILURE_EXIT_CODE`]. Everything else is unexpected: it is reported
//! with full diagnostic detail and exits with [`UNEXPECTED_FAILURE_EXIT_CODE`]
//! so automation can tell "your deployment is invalid" from "the agent broke".

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a successful run
pub const SUCCESS_EXIT_CODE: i32 = 0;

/// Exit code for known deployment failures
pub const KNOWN_FAILURE_EXIT_CODE: i32 = 1;

/// Exit code for unexpected failures (agent defects)
pub const UNEXPECTED_FAILURE_EXIT_CODE: i32 = 100;

/// Result type for conveyor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which exit-code band a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A precondition the operator can fix
    Known,
    /// A defect in the agent itself
    Unexpected,
}

impl FailureKind {
    /// Process exit code for this band
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Known => KNOWN_FAILURE_EXIT_CODE,
            Self::Unexpected => UNEXPECTED_FAILURE_EXIT_CODE,
        }
    }
}

/// Errors that can occur while running a deployment
#[derive(Error, Debug)]
pub enum Error {
    /// Package file to deploy does not exist
    #[error("Could not find package file: {}", .0.display())]
    PackageNotFound(PathBuf),

    /// A file the deployment depends on does not exist
    #[error("Could not find file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Required variable is absent or empty
    #[error("The variable '{0}' is required but no value is set")]
    MissingVariable(String),

    /// Variable present but unusable
    #[error("Invalid value for variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    /// Script ran and exited non-zero
    #[error("Script '{script}' returned non-zero exit code: {exit_code}")]
    ScriptFailed { script: String, exit_code: i32 },

    /// Script file type has no known interpreter
    #[error("Unsupported script type: {0}")]
    UnsupportedScript(String),

    /// Interpreter could not be started
    #[error("Could not start interpreter '{interpreter}': {reason}")]
    InterpreterNotFound { interpreter: String, reason: String },

    /// Every credential source was exhausted
    #[error("Unable to resolve credentials: {0}")]
    Credentials(String),

    /// Package extraction failed
    #[error("Failed to extract package: {0}")]
    Extraction(String),

    /// Variables file missing, unreadable or undecryptable
    #[error("{0}")]
    VariablesFile(String),

    /// Generic deployment failure
    #[error("{0}")]
    Deployment(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Encryption or decryption of a sensitive value failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a generic known deployment failure
    pub fn deployment(msg: impl Into<String>) -> Self {
        Self::Deployment(msg.into())
    }

    /// Which band this error belongs to
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PackageNotFound(_)
            | Self::FileNotFound(_)
            | Self::MissingVariable(_)
            | Self::InvalidVariable { .. }
            | Self::ScriptFailed { .. }
            | Self::UnsupportedScript(_)
            | Self::InterpreterNotFound { .. }
            | Self::Credentials(_)
            | Self::Extraction(_)
            | Self::VariablesFile(_)
            | Self::Deployment(_) => FailureKind::Known,
            Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Crypto(_) | Self::Other(_) => {
                FailureKind::Unexpected
            }
        }
    }

    /// True for failures the operator can fix
    pub fn is_known(&self) -> bool {
        self.kind() == FailureKind::Known
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_failures_exit_with_one() {
        let err = Error::PackageNotFound(PathBuf::from("/tmp/missing.tar.gz"));
        assert!(err.is_known());
        assert_eq!(err.exit_code(), KNOWN_FAILURE_EXIT_CODE);
        assert_eq!(err.to_string(), "Could not find package file: /tmp/missing.tar.gz");

        let err = Error::ScriptFailed {
            script: "Deploy.sh".to_string(),
            exit_code: 3,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unexpected_failures_use_separate_band() {
        let err: Error = std::io::Error::other("disk on fire").into();
        assert!(!err.is_known());
        assert_eq!(err.exit_code(), UNEXPECTED_FAILURE_EXIT_CODE);

        let err: Error = anyhow::anyhow!("invariant broken").into();
        assert_eq!(err.kind(), FailureKind::Unexpected);
    }
}
