//! Per-case error ledger consulted by quarantine policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a recoverable failure attributed to a case.
///
/// One exhaustive enum shared by the worker mailbox, the case record, and
/// officer policy, so counts aggregate by kind no matter where the failure
/// surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Destination file never appeared after the worker was spawned.
    FileCreationTimeout,
    /// Operation timed out (connect/read).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Non-2xx HTTP status from the server.
    Http(u16),
    /// Local disk read/write failure.
    Io,
    /// Anything else.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FileCreationTimeout => write!(f, "file creation timeout"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Http(code) => write!(f, "HTTP {}", code),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Error and completion history for one case.
///
/// Counts are monotonically non-decreasing; `complete` is set at most once
/// and never cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    errors: BTreeMap<ErrorKind, u32>,
    complete: bool,
}

impl CaseRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of an error kind.
    pub fn log_error(&mut self, kind: ErrorKind) {
        *self.errors.entry(kind).or_insert(0) += 1;
    }

    /// Total errors across all kinds.
    pub fn total_error_count(&self) -> u32 {
        self.errors.values().sum()
    }

    /// The kind seen most often with its count, for quarantine diagnosis.
    /// None if no error has been recorded.
    pub fn dominant_error(&self) -> Option<(ErrorKind, u32)> {
        self.errors
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(kind, count)| (*kind, *count))
    }

    pub fn count(&self, kind: ErrorKind) -> u32 {
        self.errors.get(&kind).copied().unwrap_or(0)
    }

    /// Mark the transfer complete. Idempotent.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
