// src/scripting/wrappers.rs

//! Script wrappers
//!
//! Wrappers adjust a prepared command before it runs. The engine holds them
//! in a plain list and applies every enabled wrapper in list order; there
//! is no nesting and no wrapper sees another's internals.

use crate::error::{Error, Result};
use crate::process::CommandInvocation;
use crate::variables::{VariableStore, names};
use tracing::debug;
use url::Url;

/// Hosts that never go through a custom proxy
const NO_PROXY_HOSTS: &str = "127.0.0.1,localhost,169.254.169.254";

/// One step of command preparation
pub trait ScriptWrapper: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    /// Whether this wrapper applies to the current variables
    fn enabled(&self, variables: &VariableStore) -> bool;

    /// Adjust the command
    fn wrap(&self, invocation: &mut CommandInvocation, variables: &VariableStore) -> Result<()>;
}

/// Exports `Octopus.Action.Script.Environment.<NAME>` variables as `<NAME>`
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentWrapper;

impl ScriptWrapper for EnvironmentWrapper {
    fn name(&self) -> &str {
        "environment"
    }

    fn enabled(&self, variables: &VariableStore) -> bool {
        variables.names().any(|name| strip_environment_prefix(name).is_some())
    }

    fn wrap(&self, invocation: &mut CommandInvocation, variables: &VariableStore) -> Result<()> {
        let exports: Vec<(String, String)> = variables
            .names()
            .filter_map(|name| {
                let key = strip_environment_prefix(name)?;
                let value = variables.get_evaluated(name).unwrap_or_default();
                Some((key.to_string(), value))
            })
            .collect();

        for (key, value) in exports {
            debug!("Exporting {} to the script environment", key);
            invocation.set_env(key, value);
        }
        Ok(())
    }
}

fn strip_environment_prefix(name: &str) -> Option<&str> {
    let prefix = names::SCRIPT_ENVIRONMENT_PREFIX;
    if name.len() > prefix.len() && name.is_char_boundary(prefix.len()) {
        let (head, tail) = name.split_at(prefix.len());
        head.eq_ignore_ascii_case(prefix).then_some(tail)
    } else {
        None
    }
}

/// Exports the agent's proxy settings as `HTTP_PROXY`-style variables
///
/// - A custom proxy host yields an explicit proxy URL, with credentials
///   percent-encoded, plus a `NO_PROXY` list of local addresses.
/// - No host and the system proxy disabled bypasses proxies entirely.
/// - No host with the system proxy enabled leaves the environment alone.
///
/// Proxy variables the agent already has in its environment win.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyWrapper;

impl ProxyWrapper {
    const VARIABLES: [&'static str; 6] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY", "http_proxy", "https_proxy", "no_proxy"];

    fn proxy_url(host: &str, variables: &VariableStore) -> Result<String> {
        let port = variables
            .get(names::proxy::PORT)
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(80);

        let mut url = Url::parse(&format!("http://{}:{}", host, port)).map_err(|e| Error::InvalidVariable {
            name: names::proxy::HOST.to_string(),
            reason: e.to_string(),
        })?;

        let username = variables.get(names::proxy::USERNAME).filter(|u| !u.is_empty());
        if let Some(username) = username {
            let password = variables.get(names::proxy::PASSWORD).filter(|p| !p.is_empty());
            // Only fails for URLs that cannot carry credentials
            let _ = url.set_username(username);
            let _ = url.set_password(password);
        }

        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

impl ScriptWrapper for ProxyWrapper {
    fn name(&self) -> &str {
        "proxy"
    }

    fn enabled(&self, variables: &VariableStore) -> bool {
        !Self::VARIABLES
            .iter()
            .any(|name| variables.contains(&format!("{}{}", names::ENVIRONMENT_PREFIX, name)))
    }

    fn wrap(&self, invocation: &mut CommandInvocation, variables: &VariableStore) -> Result<()> {
        let host = variables.get(names::proxy::HOST).map(str::trim).unwrap_or("");
        let use_default = variables.get_flag(names::proxy::USE_DEFAULT, true);

        let (proxy, no_proxy) = if !host.is_empty() {
            (Self::proxy_url(host, variables)?, NO_PROXY_HOSTS.to_string())
        } else if !use_default {
            (String::new(), "*".to_string())
        } else {
            return Ok(());
        };

        for key in ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"] {
            invocation.set_env(key, proxy.clone());
        }
        invocation.set_env("NO_PROXY", no_proxy.clone());
        invocation.set_env("no_proxy", no_proxy);
        Ok(())
    }
}
