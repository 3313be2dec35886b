//! One scheduling tick of the agent: drain the worker mailbox, observe the
//! destination size, classify health, restart if dead, report.

use std::cmp::Ordering;
use std::path::Path;
use std::time::SystemTime;

use crate::case::Case;
use crate::transfer::{TransferBackend, WorkerError};

use super::{report, Agent, AgentError, AgentStatus, StatusReport};

impl Agent {
    /// Administer the case for one tick and produce a fresh status report.
    ///
    /// Recoverable trouble (worker errors, probe failures, failed respawns)
    /// is absorbed into the case record; only invariant violations surface
    /// as `Err`.
    pub fn poll(
        &mut self,
        case: &mut Case,
        backend: &dyn TransferBackend,
    ) -> Result<StatusReport, AgentError> {
        if self.status == AgentStatus::Staging {
            return Err(AgentError::Invariant(
                "poll() called on a staging agent".to_string(),
            ));
        }

        self.drain_mailbox(case);

        let size_on_disk = disk_size(case.destination());
        let size_on_server = self.server_size(case, backend);
        self.classify(case, size_on_disk, size_on_server);

        if self.status == AgentStatus::Dead {
            self.handle_dead(case, backend);
        }

        Ok(self.report(case))
    }

    /// One bounded wait, then a non-blocking sweep. The agent never blocks
    /// indefinitely on a worker that may have exited or hung.
    fn drain_mailbox(&mut self, case: &mut Case) {
        let Some(mailbox) = self.mailbox.as_ref() else {
            return;
        };
        let mut received: Vec<WorkerError> = Vec::new();
        if let Ok(first) = mailbox.recv_timeout(self.limits.mailbox_read_timeout) {
            received.push(first);
            while let Ok(more) = mailbox.try_recv() {
                received.push(more);
            }
        }
        for error in received {
            tracing::warn!(source = case.source(), error = %error, "worker reported failure");
            case.record_mut().log_error(error.kind);
        }
    }

    /// Fetch the server size once and reuse it; a failed probe is a
    /// recordable error, not a crash, and is retried on the next poll.
    fn server_size(&mut self, case: &mut Case, backend: &dyn TransferBackend) -> Option<u64> {
        if self.cached_server_size.is_none() {
            match backend.size_on_server(case.source()) {
                Ok(size) => self.cached_server_size = Some(size),
                Err(error) => {
                    tracing::warn!(source = case.source(), error = %error, "server size probe failed");
                    case.record_mut().log_error(error.kind);
                }
            }
        }
        self.cached_server_size
    }

    fn classify(&mut self, case: &mut Case, size_on_disk: u64, size_on_server: Option<u64>) {
        if let Some(server) = size_on_server {
            if size_on_disk >= server {
                self.status = AgentStatus::Complete;
                case.record_mut().mark_complete();
                return;
            }
        }
        match size_on_disk.cmp(&self.last_observed_size) {
            Ordering::Greater => {
                self.last_observed_size = size_on_disk;
                self.dead_poll_count = 0;
                self.status = AgentStatus::Active;
            }
            Ordering::Less => {
                // Anomaly: status is left as it was.
                tracing::warn!(
                    source = case.source(),
                    was = self.last_observed_size,
                    now = size_on_disk,
                    "destination shrank since last poll"
                );
            }
            Ordering::Equal => {
                self.dead_poll_count += 1;
                self.status = if self.dead_poll_count > self.limits.dead_poll_threshold {
                    AgentStatus::Dead
                } else {
                    AgentStatus::Comatose
                };
            }
        }
    }

    fn handle_dead(&mut self, case: &mut Case, backend: &dyn TransferBackend) {
        if self.restart_count >= self.limits.restart_attempt_threshold {
            if !self.abandoned {
                tracing::warn!(
                    source = case.source(),
                    restarts = self.restart_count,
                    "restart budget exhausted, abandoning transfer"
                );
                self.abandoned = true;
            }
            return;
        }
        self.restart(case, backend);
    }

    /// Kill the worker, delete the partial destination, respawn. The restart
    /// itself counts against the budget whether or not the respawn sticks.
    fn restart(&mut self, case: &mut Case, backend: &dyn TransferBackend) {
        tracing::info!(
            source = case.source(),
            attempt = self.restart_count + 1,
            "restarting dead transfer"
        );
        self.shutdown();
        self.discard_artifact(case);
        self.restart_count += 1;
        self.dead_poll_count = 0;
        self.last_observed_size = 0;
        match self.spawn_worker(case, backend) {
            Ok(()) => self.status = AgentStatus::Active,
            Err(error) => {
                // Stays dead for this tick. The counters were already reset,
                // so the next respawn comes after another full dead-poll
                // cycle, budget permitting.
                if let Some(kind) = error.error_kind() {
                    case.record_mut().log_error(kind);
                }
                tracing::warn!(source = case.source(), error = %error, "respawn failed");
            }
        }
    }

    fn report(&self, case: &Case) -> StatusReport {
        let size_on_disk = disk_size(case.destination());
        let current_run_time = self.most_recent_start.elapsed();
        let speed = report::speed(size_on_disk, current_run_time);
        let eta = report::eta(
            SystemTime::now(),
            size_on_disk,
            self.cached_server_size,
            speed,
        );
        StatusReport {
            status: self.status,
            abandoned: self.abandoned,
            speed_bytes_per_sec: speed,
            current_run_time,
            total_run_time: self.started_at.elapsed(),
            eta,
            record: case.record().clone(),
        }
    }
}

fn disk_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;

    use crate::case::{Case, CaseFactory, ErrorKind};
    use crate::transfer::testing::ScriptedBackend;
    use crate::transfer::WorkerError;

    use super::super::{AgentError, AgentFactory, AgentLimits, AgentStatus};

    fn limits() -> AgentLimits {
        AgentLimits {
            dead_poll_threshold: 5,
            restart_attempt_threshold: 5,
            file_creation_timeout: Duration::from_millis(200),
            mailbox_read_timeout: Duration::from_millis(5),
        }
    }

    fn case_in(dir: &std::path::Path) -> Case {
        CaseFactory::new(dir.to_path_buf())
            .case("https://example.com/data/payload.bin")
            .unwrap()
    }

    fn append(case: &Case, bytes: &[u8]) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(case.destination())
            .unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn flat_size_sequence_dies_on_sixth_poll_with_one_restart() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();

        agent.start(&case, &backend).unwrap();
        assert_eq!(backend.spawn_count(), 1);

        // Five no-growth polls stay comatose.
        for _ in 0..5 {
            let report = agent.poll(&mut case, &backend).unwrap();
            assert_eq!(report.status, AgentStatus::Comatose);
            assert_eq!(backend.spawn_count(), 1);
        }

        // The sixth crosses the threshold: dead, then exactly one restart.
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);
        assert_eq!(backend.spawn_count(), 2);
        assert_eq!(agent.restart_count(), 1);

        // Dead-poll counter was reset by the restart.
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Comatose);
        assert_eq!(backend.spawn_count(), 2);
    }

    #[test]
    fn growth_resets_the_dead_poll_counter() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();
        agent.start(&case, &backend).unwrap();

        for _ in 0..4 {
            let report = agent.poll(&mut case, &backend).unwrap();
            assert_eq!(report.status, AgentStatus::Comatose);
        }
        append(&case, b"xxxxxxxxxx");
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);

        // The counter starts over: five more flat polls are needed before
        // the next one crosses the threshold.
        for _ in 0..5 {
            let report = agent.poll(&mut case, &backend).unwrap();
            assert_eq!(report.status, AgentStatus::Comatose);
        }
        assert_eq!(backend.spawn_count(), 1);
    }

    #[test]
    fn completes_when_disk_catches_server() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(10);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();
        agent.start(&case, &backend).unwrap();

        append(&case, b"0123456789");
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Complete);
        assert!(report.record.is_complete());
        assert!(case.record().is_complete());
    }

    #[test]
    fn shrinking_destination_is_an_anomaly_not_a_transition() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(1000);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();
        agent.start(&case, &backend).unwrap();

        append(&case, &[0u8; 50]);
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);

        std::fs::write(case.destination(), &[0u8; 10]).unwrap();
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);
        assert_eq!(backend.spawn_count(), 1);
    }

    #[test]
    fn restart_budget_exhaustion_reports_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(AgentLimits {
            dead_poll_threshold: 1,
            restart_attempt_threshold: 1,
            ..limits()
        })
        .assign();
        agent.start(&case, &backend).unwrap();

        // First death consumes the single restart.
        agent.poll(&mut case, &backend).unwrap();
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);
        assert_eq!(agent.restart_count(), 1);

        // Second death must not restart again.
        agent.poll(&mut case, &backend).unwrap();
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Dead);
        assert!(report.abandoned);
        assert_eq!(backend.spawn_count(), 2);

        // And it stays abandoned on every subsequent poll.
        let report = agent.poll(&mut case, &backend).unwrap();
        assert!(report.abandoned);
        assert_eq!(backend.spawn_count(), 2);
    }

    #[test]
    fn failed_probe_lands_on_record_and_is_retried_next_poll() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::probe_fails(10, ErrorKind::Connection);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();
        agent.start(&case, &backend).unwrap();

        // No server size yet: the probe error is recorded and the poll
        // falls through to plain growth classification.
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Comatose);
        assert_eq!(report.record.count(ErrorKind::Connection), 1);

        // Once the server recovers the re-probe succeeds and completion
        // detection works again.
        backend.heal_probe();
        append(&case, b"0123456789");
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Complete);
        assert_eq!(report.record.count(ErrorKind::Connection), 1);
    }

    #[test]
    fn failed_respawn_stays_dead_and_consumes_the_restart() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(AgentLimits {
            dead_poll_threshold: 1,
            ..limits()
        })
        .assign();
        agent.start(&case, &backend).unwrap();

        agent.poll(&mut case, &backend).unwrap();
        backend.fail_spawns(ErrorKind::Connection);
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Dead);
        assert_eq!(report.record.count(ErrorKind::Connection), 1);
        assert_eq!(agent.restart_count(), 1);
        assert_eq!(backend.spawn_count(), 2);

        // The counters were reset by the restart attempt, so recovery takes
        // another full dead-poll cycle before the respawn that sticks.
        backend.heal_spawns();
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Comatose);
        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.status, AgentStatus::Active);
        assert_eq!(agent.restart_count(), 2);
        assert_eq!(backend.spawn_count(), 3);
    }

    #[test]
    fn worker_errors_land_on_the_record_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        backend.queue_errors(vec![
            WorkerError::new(ErrorKind::Connection, "reset by peer"),
            WorkerError::new(ErrorKind::Connection, "reset by peer"),
            WorkerError::new(ErrorKind::Http(503), "unavailable"),
        ]);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();
        agent.start(&case, &backend).unwrap();

        let report = agent.poll(&mut case, &backend).unwrap();
        assert_eq!(report.record.count(ErrorKind::Connection), 2);
        assert_eq!(report.record.count(ErrorKind::Http(503)), 1);
        assert_eq!(report.record.total_error_count(), 3);
    }

    #[test]
    fn start_times_out_when_file_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::never_creates_file(100);
        let case = case_in(dir.path());
        let mut agent = AgentFactory::new(AgentLimits {
            file_creation_timeout: Duration::from_millis(50),
            ..limits()
        })
        .assign();

        let err = agent.start(&case, &backend).unwrap_err();
        assert!(matches!(err, AgentError::FileCreationTimeout { .. }));
        assert_eq!(err.error_kind(), Some(ErrorKind::FileCreationTimeout));
        assert_eq!(agent.status(), AgentStatus::Staging);
        assert!(!case.destination().exists());
    }

    #[test]
    fn polling_a_staging_agent_is_an_invariant_violation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::healthy(100);
        let mut case = case_in(dir.path());
        let mut agent = AgentFactory::new(limits()).assign();

        let err = agent.poll(&mut case, &backend).unwrap_err();
        assert!(matches!(err, AgentError::Invariant(_)));
        assert_eq!(err.error_kind(), None);
    }
}
