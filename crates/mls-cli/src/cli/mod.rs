//! CLI for the MLS media-loading scheduler.

mod commands;
mod scenario;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use mls_core::config;
use std::path::Path;

use commands::{run_completions, run_config, run_man, run_simulate};

/// Top-level CLI for the MLS media-loading scheduler.
#[derive(Debug, Parser)]
#[command(name = "mls")]
#[command(about = "MLS: adaptive media-loading scheduler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Replay a scenario file against the scheduler and print the outcome.
    Simulate {
        /// Path to the scenario TOML file.
        path: String,

        /// Extra settling time after the last scripted event, in ms.
        #[arg(long, default_value = "5000", value_name = "MS")]
        settle_ms: u64,

        /// Print telemetry records as JSON lines instead of a summary table.
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration and where it was loaded from.
    Config,

    /// Generate shell completions to stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Render the man page to stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Simulate {
                path,
                settle_ms,
                json,
            } => run_simulate(&cfg, Path::new(&path), settle_ms, json).await?,
            CliCommand::Config => run_config(&cfg)?,
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
