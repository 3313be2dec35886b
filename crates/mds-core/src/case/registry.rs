//! Id-indexed case arena.
//!
//! Cases are owned here for their whole life; the officer's pending, active,
//! closed, and quarantined containers hold `CaseId`s, never case references,
//! so moving a case between containers is an id move with nothing to
//! invalidate.

use std::collections::HashMap;

use super::Case;

/// Opaque handle to a registered case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseId(u64);

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "case#{}", self.0)
    }
}

/// Raised when a `(source, destination)` pair is registered twice. The second
/// submission is rejected, never silently merged.
#[derive(Debug, thiserror::Error)]
#[error("case already registered for {url} -> {destination}")]
pub struct DuplicateCaseError {
    pub url: String,
    pub destination: String,
}

#[derive(Debug, Default)]
pub struct CaseRegistry {
    cases: HashMap<CaseId, Case>,
    next: u64,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case, rejecting an identical `(source, destination)` pair.
    ///
    /// The scan covers every case ever registered, closed and quarantined
    /// ones included, so a pair stays taken for the registry's whole
    /// lifetime. Re-fetching a finished pair takes a fresh officer, which is
    /// the natural unit of one batch run.
    pub fn register(&mut self, case: Case) -> Result<CaseId, DuplicateCaseError> {
        let duplicate = self
            .cases
            .values()
            .any(|known| known.source() == case.source() && known.destination() == case.destination());
        if duplicate {
            return Err(DuplicateCaseError {
                url: case.source().to_string(),
                destination: case.destination().display().to_string(),
            });
        }
        let id = CaseId(self.next);
        self.next += 1;
        self.cases.insert(id, case);
        Ok(id)
    }

    pub fn get(&self, id: CaseId) -> Option<&Case> {
        self.cases.get(&id)
    }

    pub fn get_mut(&mut self, id: CaseId) -> Option<&mut Case> {
        self.cases.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
