// src/commands/mod.rs

//! Command handlers for the conveyor CLI
//!
//! Each deployment command builds a convention list, runs it against a
//! context seeded from the variable options, then writes outputs. Handlers
//! return the process exit code; errors raised before the pipeline starts
//! (bad config, unreadable variables files) are returned to `main`, which
//! maps them to the same exit-code bands.

mod deploy_package;
mod encode_message;
mod run_script;

pub use deploy_package::cmd_deploy_package;
pub use encode_message::cmd_encode_message;
pub use run_script::cmd_run_script;

use crate::cli::VariableArgs;
use conveyor::config::AgentConfig;
use conveyor::deployment::{ConventionPipeline, DeploymentContext, PipelineOutcome};
use conveyor::fs::{FileSystem, PhysicalFileSystem};
use conveyor::journal::{DeploymentJournal, JournalRecord};
use conveyor::log::{DeploymentLog, FanoutSink, LogSink, MemorySink, TracingSink};
use conveyor::process::SystemProcessRunner;
use conveyor::scripting::ScriptEngine;
use conveyor::sensitive::{Redactor, VariableEncryptor};
use conveyor::variables::{VariableStore, io};
use conveyor::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Everything one agent run shares
pub struct Session {
    pub config: AgentConfig,
    pub fs: Arc<dyn FileSystem>,
    pub log: DeploymentLog,
    pub engine: Arc<ScriptEngine>,
    capture: Option<(PathBuf, Arc<MemorySink>)>,
    work_dir: PathBuf,
    // Removed on drop when no work_dir is configured
    _scratch: Option<TempDir>,
}

impl Session {
    pub fn start(config: AgentConfig, capture_log: Option<PathBuf>) -> Result<Self> {
        let redactor = Redactor::new();
        let fs: Arc<dyn FileSystem> = Arc::new(PhysicalFileSystem);

        let (log, capture) = match capture_log {
            Some(path) => {
                let memory = Arc::new(MemorySink::new());
                let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(TracingSink), memory.clone()];
                let log = DeploymentLog::new(redactor, Arc::new(FanoutSink::new(sinks)));
                (log, Some((path, memory)))
            }
            None => (DeploymentLog::tracing(redactor), None),
        };

        let (work_dir, scratch) = match &config.work_dir {
            Some(dir) => {
                fs.create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let scratch = tempfile::Builder::new().prefix("conveyor-").tempdir()?;
                (scratch.path().to_path_buf(), Some(scratch))
            }
        };
        debug!("Working directory: {}", work_dir.display());

        let engine = Arc::new(ScriptEngine::from_config(
            &config,
            Arc::new(SystemProcessRunner),
            fs.clone(),
            Arc::new(VariableEncryptor::generate()),
        ));

        Ok(Self {
            config,
            fs,
            log,
            engine,
            capture,
            work_dir,
            _scratch: scratch,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Build the variable store from the command's options and the environment
    pub fn load_variables(&self, args: &VariableArgs) -> Result<VariableStore> {
        let mut store = VariableStore::with_redactor(self.log.redactor().clone());

        if let Some(path) = &args.variables {
            io::load_variables_file(self.fs.as_ref(), path, &mut store)?;
        }
        for path in &args.sensitive_variables {
            io::load_sensitive_variables_file(
                self.fs.as_ref(),
                path,
                args.sensitive_variables_password.as_deref(),
                &mut store,
            )?;
        }
        io::import_environment(&mut store, std::env::vars());
        io::load_additional_variables(self.fs.as_ref(), &mut store)?;

        debug!("{} variables loaded", store.len());
        Ok(store)
    }

    /// Run the pipeline, then write outputs; returns the exit code
    pub fn run(
        &self,
        command: &str,
        pipeline: &ConventionPipeline,
        mut context: DeploymentContext,
        args: &VariableArgs,
    ) -> Result<i32> {
        debug!("Conventions: {}", pipeline.names().join(", "));
        let outcome = pipeline.run(&mut context, &self.log);

        if let PipelineOutcome::Failed { convention, .. } = &outcome {
            debug!("Run stopped at convention '{}'", convention);
        }

        let package = context.package().map(Path::to_path_buf);
        let variables = context.into_variables();

        for line in io::describe_for_humans(&variables) {
            self.log.verbose(line);
        }
        let written = match &args.output_variables {
            Some(path) => io::OutputDocument::from_store(&variables)
                .write(self.fs.as_ref(), path)
                .inspect(|_| debug!("Output variables written to {}", path.display())),
            None => Ok(()),
        };

        // The run is journaled even when its outputs could not be written
        self.append_journal(command, package.as_deref(), outcome.exit_code());
        written?;
        Ok(outcome.exit_code())
    }

    fn append_journal(&self, command: &str, package: Option<&Path>, exit_code: i32) {
        let Some(path) = &self.config.journal_path else {
            return;
        };
        let record = JournalRecord::new(command, package, exit_code);
        if let Err(e) = DeploymentJournal::new(path).append(&record) {
            warn!("Could not append to deployment journal {}: {}", path.display(), e);
        }
    }

    /// Write the captured log, if requested
    pub fn finish(self) -> Result<()> {
        if let Some((path, memory)) = &self.capture {
            let mut text = String::new();
            for entry in memory.entries() {
                text.push_str(&format!("{:<9} {}\n", entry.level.as_str(), entry.message));
            }
            self.fs.write_text(path, &text)?;
        }
        Ok(())
    }
}
