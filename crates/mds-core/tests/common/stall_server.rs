//! Minimal HTTP/1.1 server for supervision tests.
//!
//! Serves a single static body. HEAD answers with Content-Length; GET can be
//! scripted to stall mid-body on the first N connections, which is how the
//! tests produce a transfer that looks alive, then flatlines.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StallServerOptions {
    /// Number of leading GETs that stall instead of finishing.
    pub stall_first_gets: usize,
    /// Bytes sent before a stalling GET goes quiet.
    pub stall_after_bytes: usize,
    /// How long a stalling GET holds the connection open without data.
    pub stall_hold: Duration,
}

impl Default for StallServerOptions {
    fn default() -> Self {
        Self {
            stall_first_gets: 0,
            stall_after_bytes: 0,
            stall_hold: Duration::from_secs(60),
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base
/// URL (e.g. "http://127.0.0.1:12345/"). Runs until the process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, StallServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: StallServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets_seen = Arc::new(AtomicUsize::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let gets_seen = Arc::clone(&gets_seen);
            thread::spawn(move || handle(stream, &body, opts, &gets_seen));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: StallServerOptions,
    gets_seen: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let method = request.split_whitespace().next().unwrap_or("");
    let total = body.len();

    if method.eq_ignore_ascii_case("HEAD") {
        let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", total);
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", total);
        if stream.write_all(response.as_bytes()).is_err() {
            return;
        }
        let seen = gets_seen.fetch_add(1, Ordering::SeqCst);
        if seen < opts.stall_first_gets {
            let sent = opts.stall_after_bytes.min(total);
            let _ = stream.write_all(&body[..sent]);
            let _ = stream.flush();
            // Hold the connection open without data; the supervisor is the
            // one that must notice and act.
            thread::sleep(opts.stall_hold);
            return;
        }
        let _ = stream.write_all(body);
        return;
    }

    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
}
