//! CLI command handlers. Each command is in its own file.

mod audit;
mod get;
mod run;

pub use audit::run_audit;
pub use get::run_single;
pub use run::run_worklist;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::SystemTime;

/// Resolve the download directory, creating it when given explicitly.
pub(crate) fn download_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating download directory {}", dir.display()))?;
            Ok(dir)
        }
        None => std::env::current_dir().context("resolving the current directory"),
    }
}

pub(crate) fn fmt_speed(speed: Option<f64>) -> String {
    match speed {
        Some(rate) if rate >= 1_000_000.0 => format!("{:.1} MB/s", rate / 1_000_000.0),
        Some(rate) if rate >= 1_000.0 => format!("{:.1} kB/s", rate / 1_000.0),
        Some(rate) => format!("{rate:.0} B/s"),
        None => "-".to_string(),
    }
}

pub(crate) fn fmt_eta(eta: Option<SystemTime>) -> String {
    eta.and_then(|when| when.duration_since(SystemTime::now()).ok())
        .map(|left| {
            let secs = left.as_secs();
            if secs >= 60 {
                format!("{}m{:02}s", secs / 60, secs % 60)
            } else {
                format!("{secs}s")
            }
        })
        .unwrap_or_else(|| "-".to_string())
}
