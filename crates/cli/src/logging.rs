use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the CLI
pub fn init_logging(log_level: Level, state_dir: &Path, no_file_log: bool) -> Result<()> {
    if no_file_log {
        init_stderr_logging(log_level);
        Ok(())
    } else {
        init_file_logging(log_level, state_dir)
    }
}

fn env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("actalog={level_str},actalog_client={level_str}").into())
}

fn init_file_logging(level: Level, state_dir: &Path) -> Result<()> {
    let log_file_path = log_file_path(state_dir);
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // The file always records debug detail; stderr follows the requested level
    let file_filter = EnvFilter::new("actalog=debug,actalog_client=debug");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_filter(env_filter(level)),
        )
        .init();

    Ok(())
}

fn init_stderr_logging(level: Level) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn log_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join("cli.log")
}
