//! Cairn developer CLI.
//!
//! Binary name: `cairn`
//!
//! Parses CLI arguments, installs tracing, loads the SDK configuration, and
//! dispatches to the command handlers.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cairn_core::config::{load_sdk_config, read_sdk_config};
use cairn_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
use cairn_types::config::SdkConfig;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut options = TracingOptions::with_verbosity(cli.verbose);
    if cli.quiet && cli.verbose == 0 {
        options.default_filter = "error".to_string();
    }
    options.format = cli.log_format.parse::<LogFormat>()?;
    options.enable_otel = cli.otel;
    init_tracing(&options)?;

    let result = run(cli);
    shutdown_tracing();
    result
}

fn sdk_config(cli: &Cli) -> anyhow::Result<SdkConfig> {
    match &cli.config {
        Some(path) => Ok(read_sdk_config(path)?),
        None => Ok(load_sdk_config(&std::env::current_dir()?)),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Check { expression } => {
            cli::condition::check(expression, cli.json)?;
        }

        Commands::Eval {
            expression,
            input,
            input_file,
        } => {
            let inputs = cli::condition::read_inputs(input.as_deref(), input_file.as_deref())?;
            // Exit status 1 when the condition is false.
            if !cli::condition::eval(expression, &inputs, cli.json)? {
                return Ok(ExitCode::from(1));
            }
        }

        Commands::Manifest { types } => {
            let config = sdk_config(&cli)?;
            tracing::info!(service = %config.service, "building demo service");
            cli::manifest::show(config, *types, cli.json)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "cairn", &mut std::io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}
