//! ActaLog CLI - session client for the ActaLog workout tracker

mod commands;
mod config;
mod logging;
mod navigator;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "actalog")]
#[command(about = "Log in to ActaLog and call its API with a persisted session")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// State directory holding the session file and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data-dir>/config.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// ActaLog API address, overriding configuration
    #[arg(short = 'u', long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in seconds, overriding configuration
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let state_dir = config::state_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &state_dir, cli.no_file_log)?;

    let client_config = config::load_client_config(
        cli.config.as_deref(),
        &state_dir,
        cli.base_url,
        cli.timeout,
    )?;
    debug!(base_url = %client_config.base_url, state_dir = %state_dir.display(), "Loaded configuration");

    if let Err(e) = cli.command.execute(&client_config, &state_dir).await {
        error!("Command failed: {e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
