//! Capacity Autopause CLI
//!
//! Inspect the managed capacity, run a single autopause cycle by hand,
//! or check the settings the agent would resolve.

mod commands;
mod output;

use anyhow::{Context, Result};
use autopause_lib::{engine::PauseCycle, settings::Settings};
use clap::{Parser, Subcommand};
use commands::{config, run, status};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Capacity Autopause CLI
#[derive(Parser)]
#[command(name = "autopause")]
#[command(author, version, about = "CLI for Capacity Autopause", long_about = None)]
pub struct Cli {
    /// Config file layered under the environment (TOML, JSON or YAML)
    #[arg(long, env = "AUTOPAUSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the capacity's state and current idleness verdict without acting on it
    Status,

    /// Run one full cycle, pausing the capacity if it is idle
    Run {
        /// Evaluate as usual but never issue the suspend
        #[arg(long)]
        dry_run: bool,
    },

    /// Print resolved settings with secrets removed
    Config,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn execute(cli: Cli) -> Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to resolve settings")?;

    match cli.command {
        Commands::Status => {
            let cycle = PauseCycle::from_settings(&settings)?;
            status::show_status(&cycle, cli.format).await?;
        }
        Commands::Run { dry_run } => {
            settings.dry_run |= dry_run;
            let cycle = PauseCycle::from_settings(&settings)?;
            run::run_cycle(&cycle, cli.format).await?;
        }
        Commands::Config => {
            config::show_config(&settings, cli.format)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = execute(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
