// src/main.rs

use clap::Parser;
use conveyor::config::AgentConfig;
use conveyor::error::{KNOWN_FAILURE_EXIT_CODE, UNEXPECTED_FAILURE_EXIT_CODE};
use conveyor::Error;
use tracing::error;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;

fn run(cli: Cli, config: AgentConfig) -> conveyor::Result<i32> {
    let session = Session::start(config, cli.capture_log)?;

    let exit_code = match cli.command {
        Commands::RunScript {
            variables,
            package,
            script,
            script_parameters,
        } => commands::cmd_run_script(&session, &variables, package, script, script_parameters),
        Commands::DeployPackage { variables, package } => commands::cmd_deploy_package(&session, &variables, package),
        Commands::EncodeMessage { name, attributes } => {
            commands::cmd_encode_message(&name, &attributes);
            Ok(0)
        }
    };

    // The captured log is written even when the command failed
    let finished = session.finish();
    let exit_code = exit_code?;
    finished?;
    Ok(exit_code)
}

fn report(err: &Error) -> i32 {
    if err.is_known() {
        error!("{}", err);
        KNOWN_FAILURE_EXIT_CODE
    } else {
        error!("Unexpected failure: {:?}", err);
        UNEXPECTED_FAILURE_EXIT_CODE
    }
}

fn main() {
    let cli = Cli::parse();

    // Config is read before tracing so its log_level can set the default filter
    let config = AgentConfig::resolve(cli.config.as_deref());
    let default_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_level)),
        )
        .init();

    let exit_code = match config.and_then(|config| run(cli, config)) {
        Ok(code) => code,
        Err(err) => report(&err),
    };
    std::process::exit(exit_code);
}
