//! Per-tick status snapshot handed from an agent to the case officer.

use std::time::{Duration, SystemTime};

use crate::case::CaseRecord;

use super::AgentStatus;

/// Read-only snapshot produced fresh on every poll; never retained by the
/// agent.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: AgentStatus,
    /// Restart budget exhausted; the case should be quarantined, not retried.
    pub abandoned: bool,
    /// Bytes per second over the current run. None when elapsed time is zero.
    pub speed_bytes_per_sec: Option<f64>,
    /// Time since the most recent (re)start.
    pub current_run_time: Duration,
    /// Time since the agent was first started.
    pub total_run_time: Duration,
    /// Estimated completion time. None when the rate is unknown or zero.
    pub eta: Option<SystemTime>,
    /// Copy of the case's error/outcome history at poll time.
    pub record: CaseRecord,
}

impl StatusReport {
    pub fn is_complete(&self) -> bool {
        self.status == AgentStatus::Complete
    }
}

/// Transfer rate over the current run; None rather than a division by zero.
pub(super) fn speed(size_on_disk: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(size_on_disk as f64 / secs)
}

/// Estimated completion time. Unknown (None) when the server size has not
/// been fetched yet or the observed rate is zero.
pub(super) fn eta(
    now: SystemTime,
    size_on_disk: u64,
    size_on_server: Option<u64>,
    speed_bytes_per_sec: Option<f64>,
) -> Option<SystemTime> {
    let remaining = size_on_server?.saturating_sub(size_on_disk);
    if remaining == 0 {
        return Some(now);
    }
    let rate = speed_bytes_per_sec?;
    if rate <= 0.0 {
        return None;
    }
    Some(now + Duration::from_secs_f64(remaining as f64 / rate))
}
