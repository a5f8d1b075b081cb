// src/deployment/conventions/packaged.rs

//! PreDeploy / Deploy / PostDeploy scripts shipped inside a package

use crate::deployment::{Convention, DeploymentContext};
use crate::error::Result;
use crate::log::DeploymentLog;
use crate::scripting::{Script, ScriptEngine, ScriptSyntax};
use crate::variables::names;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// When in the deployment a packaged script runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStage {
    PreDeploy,
    Deploy,
    PostDeploy,
}

impl DeploymentStage {
    /// File stem scripts for this stage use
    pub fn script_stem(&self) -> &'static str {
        match self {
            Self::PreDeploy => "PreDeploy",
            Self::Deploy => "Deploy",
            Self::PostDeploy => "PostDeploy",
        }
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_stem())
    }
}

/// Runs the package's scripts for one stage
///
/// Scripts are looked up in the root of the installation directory, one per
/// supported syntax, matching the stem case-insensitively.
pub struct PackagedScriptConvention {
    engine: Arc<ScriptEngine>,
    stage: DeploymentStage,
}

impl PackagedScriptConvention {
    pub fn new(engine: Arc<ScriptEngine>, stage: DeploymentStage) -> Self {
        Self { engine, stage }
    }

    fn find_scripts(&self, directory: &Path) -> Vec<PathBuf> {
        let candidates: Vec<PathBuf> = WalkDir::new(directory)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();

        let mut found = Vec::new();
        for syntax in self.engine.supported_syntaxes() {
            let wanted = format!("{}.{}", self.stage.script_stem(), syntax.extension());
            if let Some(path) = candidates.iter().find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(&wanted))
            }) {
                found.push(path.clone());
            }
        }
        found
    }
}

impl Convention for PackagedScriptConvention {
    fn name(&self) -> &str {
        match self.stage {
            DeploymentStage::PreDeploy => "packaged-script:PreDeploy",
            DeploymentStage::Deploy => "packaged-script:Deploy",
            DeploymentStage::PostDeploy => "packaged-script:PostDeploy",
        }
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        context.variables.get_flag(names::RUN_PACKAGE_SCRIPTS, true)
            && context.variables.contains(names::INSTALLATION_DIRECTORY)
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let directory = PathBuf::from(context.variables.require(names::INSTALLATION_DIRECTORY)?);
        let scripts = self.find_scripts(&directory);
        if scripts.is_empty() {
            log.verbose(format!("No {} scripts found in the package", self.stage));
            return Ok(());
        }

        for path in scripts {
            let syntax = ScriptSyntax::from_path(&path);
            log.info(format!(
                "Running {} script '{}'{}",
                self.stage,
                path.display(),
                syntax.map(|s| format!(" ({})", s)).unwrap_or_default()
            ));
            let report = self.engine.execute(&Script::new(path), &mut context.variables, log)?;
            context.record_report(report);
        }
        Ok(())
    }
}
