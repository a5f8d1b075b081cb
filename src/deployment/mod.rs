// src/deployment/mod.rs

//! Deployment pipeline
//!
//! A deployment is a fixed, ordered list of [`Convention`]s run against one
//! [`DeploymentContext`]. Conventions never talk to each other directly: each
//! one reads and writes the context's variable store, and every later
//! convention sees everything written earlier, including variables a child
//! script set through service messages.
//!
//! # Pipeline Lifecycle
//!
//! ```text
//! RUNNING --(convention not applicable)--> RUNNING      (skipped, no side effects)
//! RUNNING --(convention succeeds)-------> RUNNING
//! RUNNING --(convention fails)----------> FAILED       (terminal, no rollback)
//! ```
//!
//! A failure stops the run immediately. Known failures surface as a single
//! error line with exit code 1; unexpected ones are logged with full detail
//! and exit with 100.

mod context;
mod convention;
pub mod conventions;
mod pipeline;

pub use context::DeploymentContext;
pub use convention::Convention;
pub use pipeline::{ConventionPipeline, PipelineOutcome, PipelineState};
