//! Transfer backend seam.
//!
//! The supervisor never talks HTTP itself: it spawns opaque workers through
//! `TransferBackend` and observes them indirectly (destination file size plus
//! a one-way error mailbox). `http` is the production curl implementation.

mod classify;
pub mod http;
mod probe;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{classify_curl_error, classify_http_status};
pub use http::HttpBackend;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::mpsc;

use crate::case::ErrorKind;

/// Failure report sent from a worker to its agent over the mailbox.
///
/// Plain data only: the worker and the agent never share live objects, so the
/// report stays valid after the worker has exited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl WorkerError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Handle to one in-flight transfer worker.
pub trait WorkerHandle: Send {
    /// Terminate the worker and wait for it to stop. Must be idempotent and
    /// must not return before the worker can no longer touch the destination.
    fn kill(&mut self);
}

/// Spawns transfer workers and answers size probes. Implementations decide
/// how bytes actually move; the supervisor only watches the destination grow.
pub trait TransferBackend: Send + Sync {
    /// Start a background transfer of `source` into `destination`. Failures
    /// after this call returns are reported through `mailbox`.
    fn spawn(
        &self,
        source: &str,
        destination: &Path,
        mailbox: mpsc::Sender<WorkerError>,
    ) -> Result<Box<dyn WorkerHandle>, WorkerError>;

    /// Size of the source object in bytes. Fetched once per case and cached
    /// by the agent; the source is assumed immutable for the transfer's life.
    fn size_on_server(&self, source: &str) -> Result<u64, WorkerError>;
}
