// src/cli/mod.rs

//! CLI definitions for the conveyor agent
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `run-script` - Run one script (a file or an inline body) with variables
//! - `deploy-package` - Extract a package and run its deployment scripts
//! - `encode-message` - Print a service message for script authors

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(author = "Conveyor Contributors")]
#[command(version)]
#[command(about = "Runs deployment steps with variables, scripts and service messages", long_about = None)]
pub struct Cli {
    /// Agent configuration file (TOML); defaults to $CONVEYOR_CONFIG
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write the masked deployment log to this file
    #[arg(long, global = true)]
    pub capture_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where a run's variables come from and where they go
#[derive(Args, Debug, Clone, Default)]
pub struct VariableArgs {
    /// JSON file of variables (name -> value)
    #[arg(long)]
    pub variables: Option<PathBuf>,

    /// JSON file of sensitive variables; repeatable
    #[arg(long = "sensitive-variables")]
    pub sensitive_variables: Vec<PathBuf>,

    /// Password the sensitive variables files are encrypted with
    #[arg(long = "sensitive-variables-password")]
    pub sensitive_variables_password: Option<String>,

    /// Write the final variables as JSON to this file
    #[arg(long = "output-variables")]
    pub output_variables: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script file, or the inline script body from the variables
    RunScript {
        #[command(flatten)]
        variables: VariableArgs,

        /// Package to extract before the script runs
        #[arg(long)]
        package: Option<PathBuf>,

        /// Script file to run (default: Octopus.Action.Script.ScriptBody)
        #[arg(long)]
        script: Option<PathBuf>,

        /// Parameters passed to the script
        #[arg(long = "script-parameters", allow_hyphen_values = true)]
        script_parameters: Option<String>,
    },

    /// Extract a package and run its PreDeploy, Deploy and PostDeploy scripts
    DeployPackage {
        #[command(flatten)]
        variables: VariableArgs,

        /// Package file (.tar.gz, .tgz or .tar)
        #[arg(long)]
        package: PathBuf,
    },

    /// Print one encoded service message
    ///
    /// Example: conveyor encode-message setVariable name=Greeting value=World
    EncodeMessage {
        /// Message name, e.g. setVariable
        name: String,

        /// Attributes as KEY=VALUE
        #[arg(value_parser = parse_key_value)]
        attributes: Vec<(String, String)>,
    },
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", text))?;
    if key.is_empty() {
        return Err(format!("attribute name missing in '{}'", text));
    }
    Ok((key.to_string(), value.to_string()))
}
