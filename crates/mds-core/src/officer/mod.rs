//! Case officer: the bounded-concurrency scheduler.
//!
//! Holds every known case in an id-indexed registry and drives them through
//! pending → active → closed/quarantined. One level-triggered tick admits
//! pending cases up to the concurrency cap, polls every active agent, and
//! disposes of cases by policy. The loop makes no forward progress between
//! ticks and never acts on stale reports.

mod admit;
mod dispose;
mod run;

pub use run::TickReport;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{Agent, AgentError, AgentFactory};
use crate::case::{Case, CaseId, CaseRegistry, DuplicateCaseError, ErrorKind};
use crate::config::{ConfigError, SupervisorConfig};
use crate::transfer::TransferBackend;

/// Fatal scheduler failures. Everything recoverable is absorbed into case
/// records; only invariant violations reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum OfficerError {
    #[error("agent failure on {id}: {source}")]
    Agent {
        id: CaseId,
        #[source]
        source: AgentError,
    },
    #[error("{id} is scheduled but not registered")]
    UnknownCase { id: CaseId },
}

/// Final classification of a case once it has left scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseDisposition {
    /// Transferred successfully.
    Closed,
    /// Frozen for manual review after exceeding the error or restart budget.
    Quarantined,
}

/// Summary row for one disposed case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub id: CaseId,
    pub source: String,
    pub destination: PathBuf,
    pub disposition: CaseDisposition,
    pub dominant_error: Option<(ErrorKind, u32)>,
    pub total_errors: u32,
}

struct ActiveAgent {
    id: CaseId,
    agent: Agent,
}

pub struct CaseOfficer {
    config: SupervisorConfig,
    backend: Arc<dyn TransferBackend>,
    factory: AgentFactory,
    registry: CaseRegistry,
    pending: VecDeque<CaseId>,
    active: Vec<ActiveAgent>,
    closed: Vec<CaseId>,
    quarantined: Vec<CaseId>,
}

impl CaseOfficer {
    pub fn new(
        config: SupervisorConfig,
        backend: Arc<dyn TransferBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let factory = AgentFactory::from_config(&config);
        Ok(Self {
            config,
            backend,
            factory,
            registry: CaseRegistry::new(),
            pending: VecDeque::new(),
            active: Vec::new(),
            closed: Vec::new(),
            quarantined: Vec::new(),
        })
    }

    /// Register a case and queue it for admission. An identical
    /// `(source, destination)` pair is rejected, never silently merged.
    pub fn submit(&mut self, case: Case) -> Result<CaseId, DuplicateCaseError> {
        let source = case.source().to_string();
        let id = self.registry.register(case)?;
        self.pending.push_back(id);
        tracing::debug!(%id, source, "case submitted");
        Ok(id)
    }

    /// True when every submitted case has reached closed or quarantined.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn closed(&self) -> &[CaseId] {
        &self.closed
    }

    pub fn quarantined(&self) -> &[CaseId] {
        &self.quarantined
    }

    pub fn case(&self, id: CaseId) -> Option<&Case> {
        self.registry.get(id)
    }

    /// Final classification of every disposed case, with the dominant error
    /// kind and count for quarantine diagnosis.
    pub fn outcomes(&self) -> Vec<CaseOutcome> {
        let row = |id: &CaseId, disposition: CaseDisposition| {
            self.registry.get(*id).map(|case| CaseOutcome {
                id: *id,
                source: case.source().to_string(),
                destination: case.destination().to_path_buf(),
                disposition,
                dominant_error: case.record().dominant_error(),
                total_errors: case.record().total_error_count(),
            })
        };
        self.closed
            .iter()
            .filter_map(|id| row(id, CaseDisposition::Closed))
            .chain(
                self.quarantined
                    .iter()
                    .filter_map(|id| row(id, CaseDisposition::Quarantined)),
            )
            .collect()
    }
}
