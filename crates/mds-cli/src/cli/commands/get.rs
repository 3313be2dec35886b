//! `mds get` – download one URL under supervision.

use anyhow::Result;
use mds_core::case::CaseFactory;
use mds_core::config::SupervisorConfig;
use std::path::PathBuf;

use super::run::supervise;

pub fn run_single(cfg: SupervisorConfig, url: &str, dir: Option<PathBuf>) -> Result<()> {
    let dir = super::download_dir(dir)?;
    let factory = CaseFactory::new(dir);
    let case = factory.case(url)?;
    supervise(cfg, vec![case])
}
