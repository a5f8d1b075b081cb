// src/deployment/conventions/substitute.rs

//! Variable substitution in deployed files

use crate::deployment::{Convention, DeploymentContext};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::log::DeploymentLog;
use crate::variables::names;
use std::sync::Arc;

/// Replaces `#{..}` references in the files named by the target globs
pub struct SubstituteInFilesConvention {
    fs: Arc<dyn FileSystem>,
}

impl SubstituteInFilesConvention {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl Convention for SubstituteInFilesConvention {
    fn name(&self) -> &str {
        "substitute-in-files"
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        context.variables.get_flag(names::SUBSTITUTE_IN_FILES_ENABLED, false)
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let patterns = context.variables.get_paths(names::SUBSTITUTE_IN_FILES_TARGETS);

        for pattern in patterns {
            let files = self.fs.find_files(context.working_dir(), &pattern)?;
            if files.is_empty() {
                log.warn(format!(
                    "No files were found that match the substitution target pattern '{}'",
                    pattern
                ));
                continue;
            }

            for file in files {
                log.info(format!("Performing variable substitution on '{}'", file.display()));
                let original = self.fs.read_text(&file)?;
                let substituted = context.variables.evaluate(&original);
                if substituted != original {
                    self.fs.write_text(&file, &substituted)?;
                }
            }
        }
        Ok(())
    }
}
