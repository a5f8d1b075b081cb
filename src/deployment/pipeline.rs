// src/deployment/pipeline.rs

//! Sequencing conventions with fail-fast semantics

use super::{Convention, DeploymentContext};
use crate::error::{Error, FailureKind, SUCCESS_EXIT_CODE};
use crate::log::DeploymentLog;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Where a run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    /// Terminal; nothing more runs
    Failed,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Succeeded,
    Failed {
        /// Convention that failed
        convention: String,
        message: String,
        exit_code: i32,
        kind: FailureKind,
    },
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded => SUCCESS_EXIT_CODE,
            Self::Failed { exit_code, .. } => *exit_code,
        }
    }

    fn from_error(convention: &str, error: &Error) -> Self {
        Self::Failed {
            convention: convention.to_string(),
            message: error.to_string(),
            exit_code: error.exit_code(),
            kind: error.kind(),
        }
    }
}

/// An ordered list of conventions
#[derive(Default)]
pub struct ConventionPipeline {
    conventions: Vec<Box<dyn Convention>>,
}

impl std::fmt::Debug for ConventionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConventionPipeline")
            .field("conventions", &self.names())
            .finish()
    }
}

impl ConventionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a convention; order of addition is order of execution
    pub fn with(mut self, convention: impl Convention + 'static) -> Self {
        self.push(Box::new(convention));
        self
    }

    pub fn push(&mut self, convention: Box<dyn Convention>) {
        self.conventions.push(convention);
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }

    /// Convention names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.conventions.iter().map(|c| c.name()).collect()
    }

    /// Run every applicable convention until one fails
    pub fn run(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> PipelineOutcome {
        let mut state = PipelineState::Running;
        let mut outcome = PipelineOutcome::Succeeded;

        for convention in &self.conventions {
            if state == PipelineState::Failed {
                break;
            }

            if !convention.applicable(context) {
                debug!("Skipping convention '{}': not applicable", convention.name());
                continue;
            }

            debug!("Running convention '{}'", convention.name());
            if let Err(error) = execute_guarded(convention.as_ref(), context, log) {
                context.mark_failed();
                state = PipelineState::Failed;

                if error.is_known() {
                    log.error(error.to_string());
                } else {
                    log.error(format!(
                        "Unexpected failure in convention '{}': {:?}",
                        convention.name(),
                        error
                    ));
                }
                outcome = PipelineOutcome::from_error(convention.name(), &error);
            }
        }

        outcome
    }
}

/// Run one convention, turning a panic into an unexpected failure
fn execute_guarded(
    convention: &dyn Convention,
    context: &mut DeploymentContext,
    log: &DeploymentLog,
) -> crate::error::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| convention.execute(context, log))) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(Error::Other(anyhow::anyhow!(
                "convention '{}' panicked: {}",
                convention.name(),
                detail
            )))
        }
    }
}
