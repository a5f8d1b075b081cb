// src/deployment/convention.rs

//! The unit of work in a deployment
//!
//! A convention decides from the context whether it applies, then acts on
//! it. Conventions talk to each other only through the variable store.

use super::DeploymentContext;
use crate::error::Result;
use crate::log::DeploymentLog;

/// One deployment step
///
/// `applicable` must not change the context; a convention that does not
/// apply is skipped without side effects. `execute` may leave partial work
/// in the variable store when it fails, and that work is kept.
pub trait Convention: Send + Sync {
    /// Name for logs and failure reports
    fn name(&self) -> &str;

    /// Whether this step runs for the current context
    fn applicable(&self, context: &DeploymentContext) -> bool;

    /// Perform the step
    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()>;
}
