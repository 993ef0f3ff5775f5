//! splitter - automatic level splits from stats file writes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use splitter_cli::cmd;
use splitter_cli::cmd::run::RunOverrides;
use splitter_cli::logging;
use splitter_core::config;
use std::path::PathBuf;
use tracing::{info, warn};

/// splitter - emit a timer split whenever a level finish is written to disk
#[derive(Parser)]
#[command(name = "splitter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./splitter.toml, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for level finishes and emit splits (default)
    Run {
        /// Additional directory to watch (repeatable)
        #[arg(long = "path")]
        paths: Vec<PathBuf>,
        /// Override the pulse window in milliseconds
        #[arg(long)]
        pulse_window_ms: Option<u64>,
        /// Only watch configured paths
        #[arg(long)]
        no_default_paths: bool,
    },
    /// List candidate directories and whether they are ready
    Paths,
    /// Show the effective configuration
    Config {
        /// Print an example config file
        #[arg(long)]
        example: bool,
        /// Print the config file search order
        #[arg(long, conflicts_with = "example")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let log_guard = logging::init(&loaded.config.logging)?;

    if let Some(warning) = &log_guard.filter_warning {
        warn!("{}", warning);
    }
    match &loaded.source {
        config::ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        config::ConfigSource::Defaults => info!("No config file found; using only defaults"),
    }
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let command = cli.command.unwrap_or(Commands::Run {
        paths: Vec::new(),
        pulse_window_ms: None,
        no_default_paths: false,
    });

    match command {
        Commands::Run {
            paths,
            pulse_window_ms,
            no_default_paths,
        } => {
            let overrides = RunOverrides {
                paths,
                pulse_window_ms,
                no_default_paths,
            };
            cmd::run::run(loaded, overrides).await
        }
        Commands::Paths => cmd::paths::run(&loaded.config),
        Commands::Config { example, path } => {
            if example {
                cmd::config::run_example()
            } else if path {
                cmd::config::run_path()
            } else {
                cmd::config::run_show(&loaded)
            }
        }
    }
}
