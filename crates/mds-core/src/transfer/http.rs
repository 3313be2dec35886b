//! Curl-backed transfer worker.
//!
//! Each spawn runs one GET on its own OS thread, streaming into the
//! destination file. The file is created lazily on the first received byte so
//! the agent's file-creation wait observes real data flow, not an empty
//! placeholder. `kill()` flips an abort flag checked from curl's progress
//! callback and joins the thread, so it returns only once the worker can no
//! longer write.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::case::ErrorKind;

use super::classify::{classify_curl_error, classify_http_status};
use super::{probe, TransferBackend, WorkerError, WorkerHandle};

/// Production backend: HTTP(S) via libcurl.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    connect_timeout: Duration,
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl HttpBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferBackend for HttpBackend {
    fn spawn(
        &self,
        source: &str,
        destination: &Path,
        mailbox: mpsc::Sender<WorkerError>,
    ) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        let abort = Arc::new(AtomicBool::new(false));
        let worker_abort = Arc::clone(&abort);
        let source = source.to_string();
        let destination = destination.to_path_buf();
        let connect_timeout = self.connect_timeout;

        let join = thread::Builder::new()
            .name("mds-transfer".to_string())
            .spawn(move || {
                if let Err(err) = perform(&source, &destination, connect_timeout, &worker_abort) {
                    if worker_abort.load(Ordering::Relaxed) {
                        // Killed on purpose; nothing to report.
                        return;
                    }
                    tracing::debug!(source = %source, error = %err, "transfer worker failed");
                    let _ = mailbox.send(err);
                }
            })
            .map_err(|e| WorkerError::new(ErrorKind::Other, format!("spawn failed: {}", e)))?;

        Ok(Box::new(HttpWorker {
            abort,
            join: Some(join),
        }))
    }

    fn size_on_server(&self, source: &str) -> Result<u64, WorkerError> {
        probe::content_length(source)
    }
}

struct HttpWorker {
    abort: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle for HttpWorker {
    fn kill(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for HttpWorker {
    fn drop(&mut self) {
        self.kill();
    }
}

fn perform(
    source: &str,
    destination: &PathBuf,
    connect_timeout: Duration,
    abort: &AtomicBool,
) -> Result<(), WorkerError> {
    let curl_err = |e: curl::Error| WorkerError::new(classify_curl_error(&e), e.to_string());

    let mut easy = curl::easy::Easy::new();
    easy.url(source).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(connect_timeout).map_err(curl_err)?;
    // Progress callbacks fire even while no data arrives, which is what makes
    // kill() bounded on a fully stalled connection.
    easy.progress(true).map_err(curl_err)?;
    easy.fail_on_error(false).map_err(curl_err)?;

    let mut file: Option<File> = None;
    let mut io_error: Option<std::io::Error> = None;

    let result = {
        let mut transfer = easy.transfer();
        transfer
            .progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))
            .map_err(curl_err)?;
        transfer
            .write_function(|data| {
                if abort.load(Ordering::Relaxed) {
                    return Ok(0);
                }
                let f = match file.as_mut() {
                    Some(f) => f,
                    None => match File::create(destination) {
                        Ok(created) => file.insert(created),
                        Err(e) => {
                            io_error = Some(e);
                            return Ok(0);
                        }
                    },
                };
                match f.write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        io_error = Some(e);
                        Ok(0)
                    }
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Err(e) = result {
        if let Some(io) = io_error {
            return Err(WorkerError::new(ErrorKind::Io, io.to_string()));
        }
        return Err(curl_err(e));
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(WorkerError::new(
            classify_http_status(code),
            format!("GET {} returned HTTP {}", source, code),
        ));
    }

    Ok(())
}
