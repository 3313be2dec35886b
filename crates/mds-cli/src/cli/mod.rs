//! CLI for the MDS mass download supervisor.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mds_core::config;
use std::path::PathBuf;

use commands::{run_audit, run_single, run_worklist};

/// Top-level CLI for the MDS mass download supervisor.
#[derive(Debug, Parser)]
#[command(name = "mds")]
#[command(about = "MDS: supervised mass file downloader with stall detection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every URL in a work list under supervision.
    Run {
        /// A URL list file, or a directory of .txt list files.
        list: PathBuf,

        /// Download directory (defaults to the current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Supervise up to N transfers concurrently, overriding the config.
        #[arg(long, value_name = "N")]
        max_active: Option<usize>,

        /// Re-download files that already exist on disk instead of skipping them.
        #[arg(long)]
        overwrite: bool,
    },

    /// Download a single URL under supervision.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Download directory (defaults to the current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Check downloaded files against their server sizes; delete fragments.
    Audit {
        /// A URL list file, or a directory of .txt list files.
        list: PathBuf,

        /// Directory holding the downloaded files (defaults to the current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Directory for verification markers; files marked here are not re-probed.
        #[arg(long, value_name = "DIR")]
        reports: Option<PathBuf>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                list,
                dir,
                max_active,
                overwrite,
            } => run_worklist(cfg, &list, dir, max_active, overwrite)?,
            CliCommand::Get { url, dir } => run_single(cfg, &url, dir)?,
            CliCommand::Audit { list, dir, reports } => run_audit(&list, dir, reports)?,
        }

        Ok(())
    }
}
