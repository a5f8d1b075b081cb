// src/commands/deploy_package.rs

//! `deploy-package`: extract a package and run its deployment scripts

use super::Session;
use crate::cli::VariableArgs;
use conveyor::deployment::conventions::{
    CredentialsConvention, DeploymentStage, ExtractPackageConvention, PackagedScriptConvention,
    SubstituteInFilesConvention,
};
use conveyor::deployment::{ConventionPipeline, DeploymentContext};
use conveyor::Result;
use std::path::PathBuf;
use tracing::info;

/// Deploy a package
///
/// Conventions, in order: extract package, resolve credentials, PreDeploy
/// scripts, substitute in files, Deploy scripts, PostDeploy scripts.
pub fn cmd_deploy_package(session: &Session, args: &VariableArgs, package: PathBuf) -> Result<i32> {
    info!("Deploying package {}", package.display());
    let variables = session.load_variables(args)?;
    let context = DeploymentContext::new(variables, session.work_dir()).with_package(&package);

    let engine = &session.engine;
    let pipeline = ConventionPipeline::new()
        .with(ExtractPackageConvention::new(session.fs.clone()))
        .with(CredentialsConvention::standard())
        .with(PackagedScriptConvention::new(engine.clone(), DeploymentStage::PreDeploy))
        .with(SubstituteInFilesConvention::new(session.fs.clone()))
        .with(PackagedScriptConvention::new(engine.clone(), DeploymentStage::Deploy))
        .with(PackagedScriptConvention::new(engine.clone(), DeploymentStage::PostDeploy));

    session.run("deploy-package", &pipeline, context, args)
}
