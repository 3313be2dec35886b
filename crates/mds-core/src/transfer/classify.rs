//! Classify curl and HTTP failures into record error kinds.

use crate::case::ErrorKind;

/// Classify a non-2xx HTTP status.
pub fn classify_http_status(code: u32) -> ErrorKind {
    ErrorKind::Http(code.min(u16::MAX as u32) as u16)
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    if e.is_write_error() {
        // Our own write callback failed, which means a local I/O problem.
        return ErrorKind::Io;
    }
    ErrorKind::Other
}
