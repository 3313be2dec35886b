//! Tracing setup for the supervisor.
//!
//! One `init` for the whole process: it prefers a log file under the XDG
//! state dir and falls back to stderr when that file cannot be opened, so a
//! read-only home directory never blocks a run.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,mds_core=debug";

/// Where log lines ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
}

/// Install the global subscriber and report the sink it writes to.
pub fn init() -> LogSink {
    match open_log_file() {
        Ok((file, path)) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
            tracing::info!("logging to {}", path.display());
            LogSink::File(path)
        }
        Err(err) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
            tracing::warn!("log file unavailable ({err:#}), writing to stderr");
            LogSink::Stderr
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let dirs = xdg::BaseDirectories::with_prefix("mds")?;
    let path = dirs
        .place_state_file("mds.log")
        .context("placing log file in the state dir")?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok((file, path))
}
