//! One scheduling tick and the blocking supervision loop.

use std::sync::Arc;

use crate::agent::StatusReport;
use crate::case::CaseId;

use super::dispose::{self, Disposition};
use super::{CaseOfficer, OfficerError};

/// Everything that happened during one tick: the stream of status reports a
/// caller can render, plus the set changes.
#[derive(Debug, Default)]
pub struct TickReport {
    pub admitted: Vec<CaseId>,
    pub reports: Vec<(CaseId, StatusReport)>,
    pub closed: Vec<CaseId>,
    pub quarantined: Vec<CaseId>,
}

impl CaseOfficer {
    /// One scheduling cycle: admission pass, poll every active agent,
    /// disposition. The caller owns pacing between ticks.
    pub fn tick(&mut self) -> Result<TickReport, OfficerError> {
        let admitted = self.admission_pass()?;

        let backend = Arc::clone(&self.backend);
        let mut reports: Vec<(CaseId, StatusReport)> = Vec::with_capacity(self.active.len());
        let mut decisions: Vec<Disposition> = Vec::with_capacity(self.active.len());

        for index in 0..self.active.len() {
            let id = self.active[index].id;
            let case = self
                .registry
                .get_mut(id)
                .ok_or(OfficerError::UnknownCase { id })?;
            let report = self.active[index]
                .agent
                .poll(case, backend.as_ref())
                .map_err(|source| OfficerError::Agent { id, source })?;
            decisions.push(dispose::decide(
                &report,
                self.config.max_allowable_error_count,
            ));
            reports.push((id, report));
        }

        // Apply dispositions back to front so indices stay valid.
        let mut closed = Vec::new();
        let mut quarantined = Vec::new();
        for index in (0..decisions.len()).rev() {
            match decisions[index] {
                Disposition::Continue => {}
                Disposition::Close => {
                    let mut entry = self.active.remove(index);
                    entry.agent.shutdown();
                    tracing::info!(id = %entry.id, "case closed");
                    closed.push(entry.id);
                    self.closed.push(entry.id);
                }
                Disposition::Quarantine => {
                    let mut entry = self.active.remove(index);
                    entry.agent.shutdown();
                    if let Some(case) = self.registry.get(entry.id) {
                        // A quarantined transfer leaves no partial artifact;
                        // a complete-looking file is kept for the review.
                        if !case.record().is_complete() {
                            entry.agent.discard_artifact(case);
                        }
                    }
                    tracing::warn!(id = %entry.id, "case quarantined");
                    quarantined.push(entry.id);
                    self.quarantined.push(entry.id);
                }
            }
        }
        closed.reverse();
        quarantined.reverse();

        Ok(TickReport {
            admitted,
            reports,
            closed,
            quarantined,
        })
    }

    /// Drive ticks until every case is closed or quarantined, sleeping the
    /// configured poll interval between cycles. `on_tick` receives each
    /// tick's report stream.
    pub fn run(&mut self, mut on_tick: impl FnMut(&TickReport)) -> Result<(), OfficerError> {
        while !self.is_idle() {
            let tick = self.tick()?;
            on_tick(&tick);
            if self.is_idle() {
                break;
            }
            std::thread::sleep(self.config.poll_interval());
        }
        tracing::info!(
            closed = self.closed.len(),
            quarantined = self.quarantined.len(),
            "all cases disposed"
        );
        Ok(())
    }
}
