// src/deployment/context.rs

//! Mutable state of one pipeline run

use crate::service_message::ScriptOutputReport;
use crate::variables::VariableStore;
use std::path::{Path, PathBuf};

/// State shared by every convention in a run
#[derive(Debug)]
pub struct DeploymentContext {
    /// The run's variables; the only channel between conventions
    pub variables: VariableStore,
    package: Option<PathBuf>,
    working_dir: PathBuf,
    failed: bool,
    reports: Vec<ScriptOutputReport>,
}

impl DeploymentContext {
    pub fn new(variables: VariableStore, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            variables,
            package: None,
            working_dir: working_dir.into(),
            failed: false,
            reports: Vec::new(),
        }
    }

    /// Attach the package being deployed
    pub fn with_package(mut self, package: impl Into<PathBuf>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Resolved package path, if this run deploys one
    pub fn package(&self) -> Option<&Path> {
        self.package.as_deref()
    }

    /// Directory conventions currently work in
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Move the run to another directory, e.g. after extraction
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = dir.into();
    }

    /// Whether the pipeline has stopped on a failure
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Set by the pipeline only. Returns false if the run had already failed.
    pub(crate) fn mark_failed(&mut self) -> bool {
        !std::mem::replace(&mut self.failed, true)
    }

    /// Keep the report of a script that ran to completion
    pub fn record_report(&mut self, report: ScriptOutputReport) {
        self.reports.push(report);
    }

    /// Reports of every script run so far, in run order
    pub fn reports(&self) -> &[ScriptOutputReport] {
        &self.reports
    }

    /// Consume the context, keeping the variables for output
    pub fn into_variables(self) -> VariableStore {
        self.variables
    }
}
