// src/commands/run_script.rs

//! `run-script`: run one script with the step's variables

use super::Session;
use crate::cli::VariableArgs;
use conveyor::deployment::conventions::{
    CredentialsConvention, ExecuteScriptConvention, ExtractPackageConvention, StageScriptConvention,
    SubstituteInFilesConvention,
};
use conveyor::deployment::{ConventionPipeline, DeploymentContext};
use conveyor::variables::names;
use conveyor::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Run a script file or the inline body from the variables
///
/// Conventions, in order: extract package (with `--package`), substitute in
/// files, resolve credentials, stage inline script, execute script.
pub fn cmd_run_script(
    session: &Session,
    args: &VariableArgs,
    package: Option<PathBuf>,
    script: Option<PathBuf>,
    script_parameters: Option<String>,
) -> Result<i32> {
    let mut variables = session.load_variables(args)?;
    if let Some(parameters) = script_parameters {
        variables.set(names::SCRIPT_PARAMETERS, parameters);
    }
    if script.is_none() && !variables.contains(names::SCRIPT_BODY) {
        return Err(Error::MissingVariable(names::SCRIPT_BODY.to_string()));
    }

    // A script outside a package is relative to where the agent was started
    let script = match script {
        Some(path) if path.is_relative() && package.is_none() => Some(std::env::current_dir()?.join(path)),
        other => other,
    };

    let mut context = DeploymentContext::new(variables, session.work_dir());
    if let Some(package) = &package {
        context = context.with_package(package);
    }

    let mut execute = ExecuteScriptConvention::new(session.engine.clone());
    let mut pipeline = ConventionPipeline::new()
        .with(ExtractPackageConvention::new(session.fs.clone()))
        .with(SubstituteInFilesConvention::new(session.fs.clone()))
        .with(CredentialsConvention::standard());
    match script {
        Some(path) => {
            info!("Running script {}", path.display());
            execute = execute.with_script(path);
        }
        None => pipeline = pipeline.with(StageScriptConvention::new(session.fs.clone())),
    }
    pipeline = pipeline.with(execute);

    session.run("run-script", &pipeline, context, args)
}
