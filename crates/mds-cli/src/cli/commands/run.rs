//! `mds run` – supervise every URL in a work list.

use anyhow::Result;
use mds_core::case::{Case, CaseFactory, CaseId};
use mds_core::config::SupervisorConfig;
use mds_core::officer::{CaseDisposition, CaseOfficer};
use mds_core::transfer::HttpBackend;
use mds_core::worklist;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{fmt_eta, fmt_speed};

pub fn run_worklist(
    mut cfg: SupervisorConfig,
    list: &Path,
    dir: Option<std::path::PathBuf>,
    max_active: Option<usize>,
    overwrite: bool,
) -> Result<()> {
    if let Some(n) = max_active {
        cfg.max_active_agents = n;
    }
    let dir = super::download_dir(dir)?;
    let factory = CaseFactory::new(dir);

    let sources = worklist::collect_sources(list)?;
    println!("{} URL(s) in work list", sources.len());

    let mut cases = Vec::with_capacity(sources.len());
    for source in &sources {
        match factory.case(source) {
            Ok(case) => cases.push(case),
            Err(err) => {
                tracing::warn!(source, error = %err, "skipping malformed URL");
                eprintln!("skipping {source}: {err}");
            }
        }
    }

    let cases = if overwrite {
        cases
    } else {
        let (to_download, present) = worklist::split_already_present(cases);
        if !present.is_empty() {
            println!(
                "skipping {} file(s) already on disk (run `mds audit` to verify them)",
                present.len()
            );
        }
        to_download
    };

    supervise(cfg, cases)
}

/// Submit the cases to a case officer, run it to completion, and print per-tick
/// progress plus a final disposition summary.
pub(super) fn supervise(cfg: SupervisorConfig, cases: Vec<Case>) -> Result<()> {
    if cases.is_empty() {
        println!("nothing to download");
        return Ok(());
    }

    let mut officer = CaseOfficer::new(cfg, Arc::new(HttpBackend::new()))?;
    let mut names: HashMap<CaseId, String> = HashMap::new();
    for case in cases {
        let name = case
            .destination()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| case.source().to_string());
        match officer.submit(case) {
            Ok(id) => {
                names.insert(id, name);
            }
            Err(err) => eprintln!("skipping duplicate: {err}"),
        }
    }
    println!("supervising {} transfer(s)", names.len());

    officer.run(|tick| {
        for (id, report) in &tick.reports {
            let name = names.get(id).map(String::as_str).unwrap_or("?");
            println!(
                "{:<32} {:<9} {:>12}  eta {}",
                name,
                report.status.to_string(),
                fmt_speed(report.speed_bytes_per_sec),
                fmt_eta(report.eta),
            );
        }
    })?;

    let outcomes = officer.outcomes();
    let closed = outcomes
        .iter()
        .filter(|o| o.disposition == CaseDisposition::Closed)
        .count();
    println!("done: {} closed, {} quarantined", closed, outcomes.len() - closed);
    for outcome in &outcomes {
        if outcome.disposition == CaseDisposition::Quarantined {
            let dominant = outcome
                .dominant_error
                .as_ref()
                .map(|(kind, count)| format!("{kind} x{count}"))
                .unwrap_or_else(|| "no recorded errors".to_string());
            println!("  quarantined {} ({dominant})", outcome.source);
        }
    }

    Ok(())
}
