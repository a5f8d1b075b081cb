// src/deployment/conventions/script.rs

//! Inline and named script conventions

use crate::deployment::{Convention, DeploymentContext};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::log::DeploymentLog;
use crate::scripting::{Script, ScriptEngine, ScriptSyntax};
use crate::variables::names;
use std::path::PathBuf;
use std::sync::Arc;

/// Writes the inline script body to a file in the working directory
///
/// The file is named by `Octopus.Action.Script.ScriptFileName`, else
/// `Script.<ext>` for the declared syntax. The chosen name is written back to
/// `ScriptFileName` so the execute convention finds it.
pub struct StageScriptConvention {
    fs: Arc<dyn FileSystem>,
}

impl StageScriptConvention {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn file_name(context: &DeploymentContext) -> Result<String> {
        if let Some(name) = context.variables.get(names::SCRIPT_FILE_NAME)
            && !name.trim().is_empty()
        {
            return Ok(name.trim().to_string());
        }

        let declared = context.variables.require(names::SCRIPT_SYNTAX)?;
        let syntax = ScriptSyntax::parse(&declared).ok_or_else(|| Error::UnsupportedScript(declared.clone()))?;
        Ok(syntax.default_file_name())
    }
}

impl Convention for StageScriptConvention {
    fn name(&self) -> &str {
        "stage-script"
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        context.variables.contains(names::SCRIPT_BODY)
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let body = context.variables.get(names::SCRIPT_BODY).unwrap_or_default().to_string();
        let file_name = Self::file_name(context)?;
        let path = context.working_dir().join(&file_name);

        log.verbose(format!("Staging inline script as {}", path.display()));
        self.fs.write_text(&path, &body)?;
        context.variables.set(names::SCRIPT_FILE_NAME, file_name);
        Ok(())
    }
}

/// Runs one script through the engine and keeps its report
///
/// Without an explicit path the script is `ScriptFileName`, resolved against
/// the working directory.
pub struct ExecuteScriptConvention {
    engine: Arc<ScriptEngine>,
    script: Option<PathBuf>,
}

impl ExecuteScriptConvention {
    pub fn new(engine: Arc<ScriptEngine>) -> Self {
        Self { engine, script: None }
    }

    pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    fn resolve(&self, context: &DeploymentContext) -> Result<PathBuf> {
        let path = match &self.script {
            Some(path) => path.clone(),
            None => PathBuf::from(context.variables.require(names::SCRIPT_FILE_NAME)?),
        };
        Ok(if path.is_absolute() {
            path
        } else {
            context.working_dir().join(path)
        })
    }
}

impl Convention for ExecuteScriptConvention {
    fn name(&self) -> &str {
        "execute-script"
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        self.script.is_some() || context.variables.contains(names::SCRIPT_FILE_NAME)
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let mut script = Script::new(self.resolve(context)?);
        if let Some(parameters) = context.variables.get_evaluated(names::SCRIPT_PARAMETERS) {
            script = script.with_parameters(parameters);
        }

        let report = self.engine.execute(&script, &mut context.variables, log)?;
        if let Some(message) = &report.result_message {
            context.variables.set(names::RESULT_MESSAGE, message.clone());
        }
        context.record_report(report);
        Ok(())
    }
}
