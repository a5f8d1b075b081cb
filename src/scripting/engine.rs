// src/scripting/engine.rs

//! Script engine: bootstrap, wrap, run, interpret output

use super::{
    BashBootstrapper, EnvironmentWrapper, PowerShellBootstrapper, ProxyWrapper, PythonBootstrapper, Script,
    ScriptBootstrapper, ScriptSyntax, ScriptWrapper,
};
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::log::DeploymentLog;
use crate::process::ProcessRunner;
use crate::sensitive::VariableEncryptor;
use crate::service_message::{ScriptOutputReport, ServiceMessageSink};
use crate::variables::VariableStore;
use std::sync::Arc;
use tracing::debug;

/// Runs scripts with their variables and collects what they report
pub struct ScriptEngine {
    runner: Arc<dyn ProcessRunner>,
    fs: Arc<dyn FileSystem>,
    encryptor: Arc<VariableEncryptor>,
    bootstrappers: Vec<Box<dyn ScriptBootstrapper>>,
    wrappers: Vec<Box<dyn ScriptWrapper>>,
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("syntaxes", &self.bootstrappers.iter().map(|b| b.syntax()).collect::<Vec<_>>())
            .field("wrappers", &self.wrappers.iter().map(|w| w.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ScriptEngine {
    /// Engine with no bootstrappers or wrappers
    pub fn new(runner: Arc<dyn ProcessRunner>, fs: Arc<dyn FileSystem>, encryptor: Arc<VariableEncryptor>) -> Self {
        Self {
            runner,
            fs,
            encryptor,
            bootstrappers: Vec::new(),
            wrappers: Vec::new(),
        }
    }

    /// Engine with every bootstrapper and the standard wrapper order
    pub fn from_config(
        config: &AgentConfig,
        runner: Arc<dyn ProcessRunner>,
        fs: Arc<dyn FileSystem>,
        encryptor: Arc<VariableEncryptor>,
    ) -> Self {
        Self::new(runner, fs, encryptor)
            .with_bootstrapper(Box::new(BashBootstrapper::new(&config.bash_executable)))
            .with_bootstrapper(Box::new(PythonBootstrapper::new(&config.python_executable)))
            .with_bootstrapper(Box::new(PowerShellBootstrapper::new(&config.pwsh_executable)))
            .with_wrapper(Box::new(EnvironmentWrapper))
            .with_wrapper(Box::new(ProxyWrapper))
    }

    pub fn with_bootstrapper(mut self, bootstrapper: Box<dyn ScriptBootstrapper>) -> Self {
        self.bootstrappers.push(bootstrapper);
        self
    }

    /// Append a wrapper; wrappers run in the order added
    pub fn with_wrapper(mut self, wrapper: Box<dyn ScriptWrapper>) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    /// Whether a script of this syntax can run
    pub fn supports(&self, syntax: ScriptSyntax) -> bool {
        self.bootstrappers.iter().any(|b| b.syntax() == syntax)
    }

    /// Syntaxes this engine can run, in preference order
    pub fn supported_syntaxes(&self) -> Vec<ScriptSyntax> {
        ScriptSyntax::ALL.into_iter().filter(|s| self.supports(*s)).collect()
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Run one script to completion
    ///
    /// Variables set by the script are written to `variables` as their lines
    /// arrive, so they are kept even when the script then fails.
    pub fn execute(
        &self,
        script: &Script,
        variables: &mut VariableStore,
        log: &DeploymentLog,
    ) -> Result<ScriptOutputReport> {
        let syntax = ScriptSyntax::from_path(&script.path)
            .ok_or_else(|| Error::UnsupportedScript(script.file_name()))?;
        let bootstrapper = self
            .bootstrappers
            .iter()
            .find(|b| b.syntax() == syntax)
            .ok_or_else(|| Error::UnsupportedScript(format!("{} ({})", script.file_name(), syntax)))?;

        if !self.fs.exists(&script.path) {
            return Err(Error::FileNotFound(script.path.clone()));
        }

        // The key appears on the command line; keep it out of the log
        log.redactor().register(&self.encryptor.key_hex());

        let mut prepared = bootstrapper.prepare(script, variables, &self.encryptor, &self.fs)?;

        for index in 0..self.wrappers.len() {
            let wrapper = &self.wrappers[index];
            if wrapper.enabled(variables) {
                debug!("Applying script wrapper '{}'", wrapper.name());
                wrapper.wrap(&mut prepared.invocation, variables)?;
            }
        }

        log.verbose(format!("Executing {}", prepared.invocation.command_line()));

        let mut sink = ServiceMessageSink::new(variables, log);
        let outcome = self.runner.run(&prepared.invocation, &mut sink);
        let report = sink.finish();

        // Generated files go before the result is inspected
        drop(prepared);

        let result = outcome?;
        if !result.success() {
            if let Some(message) = &report.result_message {
                log.error(message);
            }
            return Err(Error::ScriptFailed {
                script: script.file_name(),
                exit_code: result.exit_code,
            });
        }

        Ok(report)
    }
}
