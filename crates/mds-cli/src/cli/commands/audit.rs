//! `mds audit` – verify downloaded files against their server sizes.

use anyhow::Result;
use mds_core::audit::{self, AuditVerdict};
use mds_core::case::CaseFactory;
use mds_core::transfer::HttpBackend;
use mds_core::worklist;
use std::path::{Path, PathBuf};

pub fn run_audit(list: &Path, dir: Option<PathBuf>, reports: Option<PathBuf>) -> Result<()> {
    let dir = super::download_dir(dir)?;
    let factory = CaseFactory::new(dir);

    let sources = worklist::collect_sources(list)?;
    let mut cases = Vec::with_capacity(sources.len());
    for source in &sources {
        match factory.case(source) {
            Ok(case) => cases.push(case),
            Err(err) => eprintln!("skipping {source}: {err}"),
        }
    }

    let (missing, present) = worklist::split_already_present(cases);
    if !missing.is_empty() {
        println!("{} file(s) not on disk; nothing to audit for them", missing.len());
    }
    if present.is_empty() {
        println!("no downloaded files to audit");
        return Ok(());
    }

    let backend = HttpBackend::new();
    let outcomes = audit::audit_cases(&present, &backend, reports.as_deref())?;

    let mut intact = 0usize;
    let mut fragmented = 0usize;
    for outcome in &outcomes {
        match &outcome.verdict {
            AuditVerdict::Intact => {
                intact += 1;
                println!("intact      {}", outcome.destination.display());
            }
            AuditVerdict::AlreadyVerified => {
                intact += 1;
                println!("verified    {}", outcome.destination.display());
            }
            AuditVerdict::Fragmented => {
                fragmented += 1;
                println!("fragment    {} (deleted)", outcome.destination.display());
            }
            AuditVerdict::ProbeFailed(reason) => {
                eprintln!("probe fail  {}: {reason}", outcome.source);
            }
        }
    }
    println!("audit done: {intact} intact, {fragmented} fragment(s) removed");
    if fragmented > 0 {
        println!("re-run `mds run` to fetch the removed fragments again");
    }

    Ok(())
}
