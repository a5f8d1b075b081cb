// src/lib.rs

//! Conveyor deployment agent
//!
//! Runs a deployment step on a target machine: given a package and a set of
//! named variables, it runs an ordered list of conventions (extract,
//! substitute, run scripts) and reports variables and results back to the
//! caller.
//!
//! # Architecture
//!
//! - Variables: one ordered, case-insensitive store per run, the only channel
//!   between steps
//! - Sensitive values: registered with a shared redactor, masked in every log
//!   line, encrypted with a per-run key when handed to a child process
//! - Service messages: `##octopus[...]` lines in a script's stdout that set
//!   variables and report results while the script runs
//! - Conventions: applicability + action, run fail-fast by the pipeline

pub mod config;
pub mod credentials;
pub mod deployment;
pub mod error;
pub mod fs;
pub mod journal;
pub mod log;
pub mod process;
pub mod scripting;
pub mod sensitive;
pub mod service_message;
pub mod variables;

pub use config::AgentConfig;
pub use credentials::{CredentialAttempt, CredentialChain, CredentialSource, Credentials};
pub use deployment::{Convention, ConventionPipeline, DeploymentContext, PipelineOutcome, PipelineState};
pub use error::{Error, FailureKind, Result};
pub use log::{DeploymentLog, LogLevel, LogSink};
pub use process::{CommandInvocation, OutputHandler, ProcessResult, ProcessRunner};
pub use scripting::{Script, ScriptEngine, ScriptSyntax};
pub use sensitive::{Redactor, VariableEncryptor};
pub use service_message::{ScriptOutputReport, ServiceMessage, ServiceMessageDecoder, ServiceMessageSink};
pub use variables::{Variable, VariableStore};
