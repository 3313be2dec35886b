//! Admission pass: fill the active set from the pending queue.

use std::sync::Arc;

use crate::agent::AgentError;
use crate::case::CaseId;

use super::{ActiveAgent, CaseOfficer, OfficerError};

impl CaseOfficer {
    /// Admit pending cases FIFO until the cap is reached. Each pending case
    /// is attempted at most once per tick, so a case that fails to start
    /// cannot monopolize the pass; it is re-queued (or quarantined once its
    /// error budget is spent) and the pass moves on.
    pub(super) fn admission_pass(&mut self) -> Result<Vec<CaseId>, OfficerError> {
        let backend = Arc::clone(&self.backend);
        let mut admitted = Vec::new();
        let mut attempts = self.pending.len();

        while self.active.len() < self.config.max_active_agents && attempts > 0 {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            attempts -= 1;

            let mut agent = self.factory.assign();
            let started = {
                let case = self
                    .registry
                    .get(id)
                    .ok_or(OfficerError::UnknownCase { id })?;
                agent.start(case, backend.as_ref())
            };

            match started {
                Ok(()) => {
                    let source = self
                        .registry
                        .get(id)
                        .map(|c| c.source().to_string())
                        .unwrap_or_default();
                    tracing::info!(%id, source, "transfer admitted");
                    self.active.push(ActiveAgent { id, agent });
                    admitted.push(id);
                    if let Some(delay) = self.config.admission_delay() {
                        if !self.pending.is_empty()
                            && self.active.len() < self.config.max_active_agents
                        {
                            std::thread::sleep(delay);
                        }
                    }
                }
                Err(error @ AgentError::Invariant(_)) => {
                    return Err(OfficerError::Agent { id, source: error });
                }
                Err(error) => {
                    let case = self
                        .registry
                        .get_mut(id)
                        .ok_or(OfficerError::UnknownCase { id })?;
                    if let Some(kind) = error.error_kind() {
                        case.record_mut().log_error(kind);
                    }
                    tracing::warn!(%id, source = case.source(), error = %error, "admission failed");
                    if case.record().total_error_count() > self.config.max_allowable_error_count {
                        tracing::warn!(%id, source = case.source(), "error budget spent, quarantining");
                        self.quarantined.push(id);
                    } else {
                        self.pending.push_back(id);
                    }
                }
            }
        }

        Ok(admitted)
    }
}
