//! Scripted in-memory backend for agent and officer tests.
//!
//! Workers are inert: the tests drive the health state machine by writing to
//! the destination file themselves, which is exactly the indirect observation
//! channel the supervisor uses in production.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};

use crate::case::ErrorKind;

use super::{TransferBackend, WorkerError, WorkerHandle};

pub(crate) struct NoopWorker;

impl WorkerHandle for NoopWorker {
    fn kill(&mut self) {}
}

pub(crate) struct ScriptedBackend {
    remote_size: u64,
    create_file: bool,
    probe_failure: Mutex<Option<ErrorKind>>,
    spawn_failure: Mutex<Option<ErrorKind>>,
    queued_errors: Mutex<Vec<WorkerError>>,
    spawns: AtomicUsize,
}

impl ScriptedBackend {
    /// Workers create the destination (empty) as soon as they spawn.
    pub(crate) fn healthy(remote_size: u64) -> Self {
        Self {
            remote_size,
            create_file: true,
            probe_failure: Mutex::new(None),
            spawn_failure: Mutex::new(None),
            queued_errors: Mutex::new(Vec::new()),
            spawns: AtomicUsize::new(0),
        }
    }

    /// Workers never create the destination, forcing file-creation timeouts.
    pub(crate) fn never_creates_file(remote_size: u64) -> Self {
        Self {
            create_file: false,
            ..Self::healthy(remote_size)
        }
    }

    /// Size probes fail with `kind` until `heal_probe` is called.
    pub(crate) fn probe_fails(remote_size: u64, kind: ErrorKind) -> Self {
        let backend = Self::healthy(remote_size);
        *backend.probe_failure.lock().unwrap() = Some(kind);
        backend
    }

    pub(crate) fn heal_probe(&self) {
        *self.probe_failure.lock().unwrap() = None;
    }

    /// Spawns fail with `kind` until `heal_spawns` is called.
    pub(crate) fn fail_spawns(&self, kind: ErrorKind) {
        *self.spawn_failure.lock().unwrap() = Some(kind);
    }

    pub(crate) fn heal_spawns(&self) {
        *self.spawn_failure.lock().unwrap() = None;
    }

    /// Errors delivered through the mailbox of the next spawned worker.
    pub(crate) fn queue_errors(&self, errors: Vec<WorkerError>) {
        self.queued_errors.lock().unwrap().extend(errors);
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::Relaxed)
    }
}

impl TransferBackend for ScriptedBackend {
    fn spawn(
        &self,
        _source: &str,
        destination: &Path,
        mailbox: mpsc::Sender<WorkerError>,
    ) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        self.spawns.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = *self.spawn_failure.lock().unwrap() {
            return Err(WorkerError::new(kind, "scripted spawn failure"));
        }
        if self.create_file && !destination.exists() {
            File::create(destination)
                .map_err(|e| WorkerError::new(ErrorKind::Io, e.to_string()))?;
        }
        for error in self.queued_errors.lock().unwrap().drain(..) {
            let _ = mailbox.send(error);
        }
        Ok(Box::new(NoopWorker))
    }

    fn size_on_server(&self, source: &str) -> Result<u64, WorkerError> {
        match *self.probe_failure.lock().unwrap() {
            Some(kind) => Err(WorkerError::new(kind, format!("probe failed for {}", source))),
            None => Ok(self.remote_size),
        }
    }
}
