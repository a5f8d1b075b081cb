// src/deployment/conventions/mod.rs

//! Conventions provided by the agent
//!
//! Commands compose these into pipelines; see `commands` for the order each
//! command uses.

mod credentials;
mod delegate;
mod extract;
mod packaged;
mod script;
mod substitute;

pub use credentials::CredentialsConvention;
pub use delegate::DelegateConvention;
pub use extract::{ExtractPackageConvention, PackageExtractor, TarPackageExtractor};
pub use packaged::{DeploymentStage, PackagedScriptConvention};
pub use script::{ExecuteScriptConvention, StageScriptConvention};
pub use substitute::SubstituteInFilesConvention;
