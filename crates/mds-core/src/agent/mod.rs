//! Agent: the health state machine supervising exactly one case's worker.
//!
//! The agent never receives a completion signal from the worker. It infers
//! health from destination file growth: growth means alive, no growth means
//! comatose, too many comatose polls means dead, and dead triggers a bounded
//! restart. Size on disk catching up to size on server is the only
//! definition of complete.

mod poll;
mod report;

pub use report::StatusReport;

use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::case::{Case, ErrorKind};
use crate::config::SupervisorConfig;
use crate::transfer::{TransferBackend, WorkerError, WorkerHandle};

/// Lifecycle status of one supervised transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Constructed but not started. Observable only before the first poll.
    Staging,
    /// Destination grew since the last poll.
    Active,
    /// No growth observed, but not yet over the dead-poll threshold.
    Comatose,
    /// Over the dead-poll threshold; the worker is presumed hung.
    Dead,
    /// Size on disk reached size on server.
    Complete,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Staging => "staging",
            AgentStatus::Active => "active",
            AgentStatus::Comatose => "comatose",
            AgentStatus::Dead => "dead",
            AgentStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the supervision limits an agent needs, taken from
/// `SupervisorConfig` at assignment time.
#[derive(Debug, Clone, Copy)]
pub struct AgentLimits {
    pub dead_poll_threshold: u32,
    pub restart_attempt_threshold: u32,
    pub file_creation_timeout: Duration,
    pub mailbox_read_timeout: Duration,
}

impl AgentLimits {
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self {
            dead_poll_threshold: cfg.dead_poll_threshold,
            restart_attempt_threshold: cfg.restart_attempt_threshold,
            file_creation_timeout: cfg.file_creation_timeout(),
            mailbox_read_timeout: cfg.mailbox_read_timeout(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The worker was launched but the destination never appeared.
    #[error("destination {path} not created within {waited:?}")]
    FileCreationTimeout {
        path: std::path::PathBuf,
        waited: Duration,
    },
    /// The backend could not launch a worker at all.
    #[error("worker spawn failed: {0}")]
    Spawn(WorkerError),
    /// Programming-logic error; fatal to the affected agent, never coerced
    /// into a valid state.
    #[error("agent invariant violated: {0}")]
    Invariant(String),
}

impl AgentError {
    /// The record entry for this error, when it is recoverable.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            AgentError::FileCreationTimeout { .. } => Some(ErrorKind::FileCreationTimeout),
            AgentError::Spawn(e) => Some(e.kind),
            AgentError::Invariant(_) => None,
        }
    }
}

/// Supervises the complete transfer of one case from server to local disk.
pub struct Agent {
    status: AgentStatus,
    limits: AgentLimits,
    worker: Option<Box<dyn WorkerHandle>>,
    mailbox: Option<mpsc::Receiver<WorkerError>>,
    last_observed_size: u64,
    dead_poll_count: u32,
    restart_count: u32,
    started_at: Instant,
    most_recent_start: Instant,
    cached_server_size: Option<u64>,
    abandoned: bool,
}

impl Agent {
    fn new(limits: AgentLimits) -> Self {
        let now = Instant::now();
        Self {
            status: AgentStatus::Staging,
            limits,
            worker: None,
            mailbox: None,
            last_observed_size: 0,
            dead_poll_count: 0,
            restart_count: 0,
            started_at: now,
            most_recent_start: now,
            cached_server_size: None,
            abandoned: false,
        }
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Launch the transfer worker and block until the destination exists or
    /// the file-creation timeout elapses. On timeout the worker is killed,
    /// any partial file is removed, and the error is returned to the caller.
    pub fn start(
        &mut self,
        case: &Case,
        backend: &dyn TransferBackend,
    ) -> Result<(), AgentError> {
        if self.status != AgentStatus::Staging {
            return Err(AgentError::Invariant(format!(
                "start() called on a {} agent",
                self.status
            )));
        }
        self.spawn_worker(case, backend)?;
        self.status = AgentStatus::Active;
        Ok(())
    }

    fn spawn_worker(
        &mut self,
        case: &Case,
        backend: &dyn TransferBackend,
    ) -> Result<(), AgentError> {
        let (tx, rx) = mpsc::channel();
        let worker = backend
            .spawn(case.source(), case.destination(), tx)
            .map_err(AgentError::Spawn)?;
        self.worker = Some(worker);
        self.mailbox = Some(rx);
        self.most_recent_start = Instant::now();
        self.wait_for_file_creation(case.destination())
    }

    fn wait_for_file_creation(&mut self, path: &Path) -> Result<(), AgentError> {
        let wait_started = Instant::now();
        while !path.exists() {
            if wait_started.elapsed() >= self.limits.file_creation_timeout {
                self.shutdown();
                // The file may have appeared between the check and the kill.
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial file");
                    }
                }
                return Err(AgentError::FileCreationTimeout {
                    path: path.to_path_buf(),
                    waited: wait_started.elapsed(),
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    /// Terminate the worker. Synchronous: does not return until the worker
    /// can no longer touch the destination. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.kill();
        }
        self.mailbox = None;
    }

    /// Remove the partial destination artifact left by a killed transfer.
    pub fn discard_artifact(&self, case: &Case) {
        let path = case.destination();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove partial file");
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Constructs agents bound to cases; keeps the case→agent wiring a single
/// seam. One agent per case at a time is enforced structurally: the officer's
/// registry rejects duplicate `(source, destination)` pairs at registration
/// and a case id appears in at most one scheduling container.
#[derive(Debug, Clone)]
pub struct AgentFactory {
    limits: AgentLimits,
}

impl AgentFactory {
    pub fn new(limits: AgentLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self::new(AgentLimits::from_config(cfg))
    }

    pub fn assign(&self) -> Agent {
        Agent::new(self.limits)
    }
}
