//! CLI command definitions for the `cairn` binary.
//!
//! Subcommands cover the condition grammar (`check`, `eval`) and the
//! definition pipeline (`manifest`) of a bundled demo service.

pub mod condition;
pub mod demo;
pub mod manifest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Inspect workflow conditions and service manifests.
#[derive(Parser)]
#[command(name = "cairn", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// SDK configuration file (defaults to ./cairn.toml when present).
    #[arg(long, global = true, env = "CAIRN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log line format: text or json.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    /// Export spans through OpenTelemetry to stdout.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a condition and print its canonical form.
    Check {
        /// Condition text, e.g. "ready and !(paused or draining)".
        expression: String,
    },

    /// Evaluate a condition against a JSON object of inputs.
    Eval {
        /// Condition text.
        expression: String,

        /// Inputs as an inline JSON object.
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read inputs from a JSON file.
        #[arg(long)]
        input_file: Option<PathBuf>,
    },

    /// Build the demo service and print its published manifest.
    Manifest {
        /// Also list the type catalog.
        #[arg(long)]
        types: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
