// src/credentials.rs

//! Credential resolution
//!
//! Credentials are looked up by walking an ordered [`CredentialChain`]. Each
//! [`CredentialSource`] either resolves or explains why it could not; only
//! when every source has declined does resolution fail, and the failure
//! lists each source's reason so the operator can see what was tried.

use crate::error::{Error, Result};
use crate::variables::VariableStore;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A user name and secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &crate::sensitive::MASK)
            .finish()
    }
}

/// Result of asking one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialAttempt {
    Resolved(Credentials),
    Unavailable(String),
}

/// One place credentials may come from
pub trait CredentialSource: Send + Sync {
    /// Name for logs and the exhaustion message
    fn name(&self) -> &str;

    fn resolve(&self, variables: &VariableStore) -> CredentialAttempt;
}

/// Where a [`VariableCredentialSource`] finds its prefix
#[derive(Debug, Clone, PartialEq, Eq)]
enum Prefix {
    Fixed(String),
    /// Prefix is the value of this variable (an account name)
    FromVariable(String),
}

/// Reads `<prefix>.Username` and `<prefix>.Password` from the store
#[derive(Debug, Clone)]
pub struct VariableCredentialSource {
    prefix: Prefix,
}

impl VariableCredentialSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Prefix::Fixed(prefix.into()),
        }
    }

    /// Use the account named by `variable` as the prefix
    pub fn account(variable: impl Into<String>) -> Self {
        Self {
            prefix: Prefix::FromVariable(variable.into()),
        }
    }
}

impl CredentialSource for VariableCredentialSource {
    fn name(&self) -> &str {
        match &self.prefix {
            Prefix::Fixed(_) => "variables",
            Prefix::FromVariable(_) => "account",
        }
    }

    fn resolve(&self, variables: &VariableStore) -> CredentialAttempt {
        let prefix = match &self.prefix {
            Prefix::Fixed(prefix) => prefix.clone(),
            Prefix::FromVariable(name) => match variables.get_evaluated(name) {
                Some(account) if !account.trim().is_empty() => account.trim().to_string(),
                _ => return CredentialAttempt::Unavailable(format!("'{}' is not set", name)),
            },
        };

        let username_var = format!("{}.Username", prefix);
        let password_var = format!("{}.Password", prefix);
        match (variables.get_evaluated(&username_var), variables.get_evaluated(&password_var)) {
            (Some(username), Some(password)) if !username.is_empty() => {
                CredentialAttempt::Resolved(Credentials::new(username, password))
            }
            (Some(username), _) if !username.is_empty() => {
                CredentialAttempt::Unavailable(format!("'{}' is not set", password_var))
            }
            _ => CredentialAttempt::Unavailable(format!("'{}' is not set", username_var)),
        }
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads credentials from the agent's own environment
#[derive(Clone)]
pub struct EnvironmentCredentialSource {
    username_key: String,
    password_key: String,
    lookup: Lookup,
}

impl fmt::Debug for EnvironmentCredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentCredentialSource")
            .field("username_key", &self.username_key)
            .field("password_key", &self.password_key)
            .finish_non_exhaustive()
    }
}

impl EnvironmentCredentialSource {
    pub fn new(username_key: impl Into<String>, password_key: impl Into<String>) -> Self {
        Self {
            username_key: username_key.into(),
            password_key: password_key.into(),
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the environment lookup (tests)
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }
}

impl CredentialSource for EnvironmentCredentialSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn resolve(&self, _variables: &VariableStore) -> CredentialAttempt {
        let username = (self.lookup)(&self.username_key).filter(|u| !u.is_empty());
        let password = (self.lookup)(&self.password_key);
        match (username, password) {
            (Some(username), Some(password)) => CredentialAttempt::Resolved(Credentials::new(username, password)),
            (Some(_), None) => CredentialAttempt::Unavailable(format!("${} is not set", self.password_key)),
            (None, _) => CredentialAttempt::Unavailable(format!("${} is not set", self.username_key)),
        }
    }
}

/// Ordered credential sources; the first to resolve wins
#[derive(Default)]
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sources.iter().map(|s| s.name())).finish()
    }
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolve, returning the credentials and the name of the source used
    pub fn resolve(&self, variables: &VariableStore) -> Result<(Credentials, String)> {
        let mut reasons = Vec::new();
        for source in &self.sources {
            match source.resolve(variables) {
                CredentialAttempt::Resolved(credentials) => {
                    debug!("Credentials resolved from {}", source.name());
                    return Ok((credentials, source.name().to_string()));
                }
                CredentialAttempt::Unavailable(reason) => {
                    debug!("Credential source {} unavailable: {}", source.name(), reason);
                    reasons.push(format!("{}: {}", source.name(), reason));
                }
            }
        }

        if reasons.is_empty() {
            return Err(Error::Credentials("no credential sources are configured".to_string()));
        }
        Err(Error::Credentials(reasons.join("; ")))
    }
}
