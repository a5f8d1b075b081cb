// src/deployment/conventions/credentials.rs

//! Account credentials for the step

use crate::credentials::{CredentialChain, EnvironmentCredentialSource, VariableCredentialSource};
use crate::deployment::{Convention, DeploymentContext};
use crate::error::Result;
use crate::log::DeploymentLog;
use crate::variables::names::account;

/// Resolves the step's account credentials for later conventions
///
/// Runs when the step names an account. The resolved user name and password
/// are written to `Octopus.Action.Account.Username`/`.Password`, the
/// password as a sensitive variable.
#[derive(Debug)]
pub struct CredentialsConvention {
    chain: CredentialChain,
}

impl CredentialsConvention {
    pub fn new(chain: CredentialChain) -> Self {
        Self { chain }
    }

    /// Named account, then directly supplied credentials, then the agent environment
    pub fn standard() -> Self {
        Self::new(
            CredentialChain::new()
                .with_source(VariableCredentialSource::account(account::VARIABLE))
                .with_source(VariableCredentialSource::new(account::PREFIX))
                .with_source(EnvironmentCredentialSource::new(
                    account::ENVIRONMENT_USERNAME,
                    account::ENVIRONMENT_PASSWORD,
                )),
        )
    }
}

impl Convention for CredentialsConvention {
    fn name(&self) -> &str {
        "credentials"
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        context.variables.contains(account::VARIABLE)
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let (credentials, source) = self.chain.resolve(&context.variables)?;
        context.variables.set_sensitive(account::PASSWORD, credentials.password);
        context.variables.set(account::USERNAME, credentials.username.clone());
        log.verbose(format!("Using credentials for '{}' from {}", credentials.username, source));
        Ok(())
    }
}
