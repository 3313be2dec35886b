//! Disposition policy applied to each active case's status report.

use crate::agent::StatusReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Disposition {
    /// Still in play: active, comatose, or dead with restart budget left.
    Continue,
    /// Transferred successfully; release the agent.
    Close,
    /// Kill the agent and freeze the case for manual review.
    Quarantine,
}

/// Evaluated in fixed order per case. Quarantine takes precedence over
/// completion: a case that errored heavily and then looks complete is still
/// frozen, because its completion signal is as suspect as the rest of its
/// history.
pub(super) fn decide(report: &StatusReport, max_allowable_error_count: u32) -> Disposition {
    if report.record.total_error_count() > max_allowable_error_count {
        return Disposition::Quarantine;
    }
    if report.is_complete() {
        return Disposition::Close;
    }
    if report.abandoned {
        return Disposition::Quarantine;
    }
    Disposition::Continue
}
