//! Completeness audit for files already on disk.
//!
//! A file that exists locally may still be a fragment of an interrupted run.
//! The audit compares disk size against one HEAD probe per file: fragments
//! are deleted so the next supervision run re-queues them, intact files get
//! an empty marker in a reports directory so later audits skip the probe
//! (one server round-trip per file is the expensive part).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::case::Case;
use crate::transfer::TransferBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditVerdict {
    /// Disk size reached server size.
    Intact,
    /// Smaller than the server copy; the fragment was deleted.
    Fragmented,
    /// A marker from an earlier audit exists; not re-probed.
    AlreadyVerified,
    /// The server size could not be fetched; the file was left alone.
    ProbeFailed(String),
}

#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub source: String,
    pub destination: PathBuf,
    pub verdict: AuditVerdict,
}

/// Audit each case's destination file. `reports_dir`, when given, holds the
/// per-file markers recording which files have already been verified.
pub fn audit_cases(
    cases: &[Case],
    backend: &dyn TransferBackend,
    reports_dir: Option<&Path>,
) -> Result<Vec<AuditOutcome>> {
    if let Some(dir) = reports_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating reports directory {}", dir.display()))?;
    }
    cases
        .iter()
        .map(|case| audit_one(case, backend, reports_dir))
        .collect()
}

fn audit_one(
    case: &Case,
    backend: &dyn TransferBackend,
    reports_dir: Option<&Path>,
) -> Result<AuditOutcome> {
    let outcome = |verdict| AuditOutcome {
        source: case.source().to_string(),
        destination: case.destination().to_path_buf(),
        verdict,
    };

    let marker = reports_dir.and_then(|dir| {
        case.destination()
            .file_name()
            .map(|name| dir.join(name))
    });
    if let Some(marker) = &marker {
        if marker.exists() {
            return Ok(outcome(AuditVerdict::AlreadyVerified));
        }
    }

    let size_on_server = match backend.size_on_server(case.source()) {
        Ok(size) => size,
        Err(error) => {
            tracing::warn!(source = case.source(), error = %error, "audit probe failed");
            return Ok(outcome(AuditVerdict::ProbeFailed(error.to_string())));
        }
    };
    let size_on_disk = fs::metadata(case.destination())
        .map(|m| m.len())
        .unwrap_or(0);

    if size_on_disk >= size_on_server {
        if let Some(marker) = &marker {
            fs::write(marker, [])
                .with_context(|| format!("writing audit marker {}", marker.display()))?;
        }
        Ok(outcome(AuditVerdict::Intact))
    } else {
        tracing::info!(
            source = case.source(),
            size_on_disk,
            size_on_server,
            "fragmented file deleted for re-download"
        );
        fs::remove_file(case.destination())
            .with_context(|| format!("deleting fragment {}", case.destination().display()))?;
        Ok(outcome(AuditVerdict::Fragmented))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseFactory;
    use crate::transfer::testing::ScriptedBackend;

    #[test]
    fn intact_file_gets_a_marker_and_is_skipped_next_time() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let factory = CaseFactory::new(dir.path().to_path_buf());
        let case = factory.case("https://example.com/whole.gz").unwrap();
        fs::write(case.destination(), vec![0u8; 10]).unwrap();
        let backend = ScriptedBackend::healthy(10);

        let cases = vec![case];
        let outcomes = audit_cases(&cases, &backend, Some(&reports)).unwrap();
        assert_eq!(outcomes[0].verdict, AuditVerdict::Intact);
        assert!(reports.join("whole.gz").exists());

        let outcomes = audit_cases(&cases, &backend, Some(&reports)).unwrap();
        assert_eq!(outcomes[0].verdict, AuditVerdict::AlreadyVerified);
    }

    #[test]
    fn fragment_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let factory = CaseFactory::new(dir.path().to_path_buf());
        let case = factory.case("https://example.com/part.gz").unwrap();
        fs::write(case.destination(), vec![0u8; 4]).unwrap();
        let backend = ScriptedBackend::healthy(10);

        let outcomes = audit_cases(&[case], &backend, None).unwrap();
        assert_eq!(outcomes[0].verdict, AuditVerdict::Fragmented);
        assert!(!outcomes[0].destination.exists());
    }
}
