//! HEAD probe for the size of a file on the server.

use std::str;
use std::time::Duration;

use crate::case::ErrorKind;

use super::classify::{classify_curl_error, classify_http_status};
use super::WorkerError;

/// Performs one HEAD request and returns the advertised `Content-Length`.
///
/// Follows redirects. One network round-trip; the agent caches the result
/// for the life of the case.
pub fn content_length(source: &str) -> Result<u64, WorkerError> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    let curl_err = |e: curl::Error| WorkerError::new(classify_curl_error(&e), e.to_string());

    easy.url(source).map_err(curl_err)?;
    easy.nobody(true).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(15)).map_err(curl_err)?;
    easy.timeout(Duration::from_secs(30)).map_err(curl_err)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(WorkerError::new(
            classify_http_status(code),
            format!("HEAD {} returned HTTP {}", source, code),
        ));
    }

    parse_content_length(&headers).ok_or_else(|| {
        WorkerError::new(
            ErrorKind::Other,
            format!("HEAD {} returned no Content-Length", source),
        )
    })
}

/// Finds the last `Content-Length` header (redirect chains repeat headers;
/// the final response wins).
fn parse_content_length(headers: &[String]) -> Option<u64> {
    headers
        .iter()
        .rev()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<u64>().ok()
            } else {
                None
            }
        })
}
