//! Destination filename derivation from a source URL.

/// Fallback when the URL path yields nothing usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// Derives a safe local filename from the last path segment of `source`.
///
/// The segment is percent-decoded by the `url` crate already; the result is
/// sanitized (no `/`, NUL, or control chars; no leading/trailing dots or
/// spaces) and falls back to `download.bin` when empty or reserved.
pub fn filename_from_source(source: &url::Url) -> String {
    let candidate = source
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);

    let raw = match candidate {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Replaces separator and control characters, collapses runs of `_`, trims
/// leading/trailing dots and spaces, and caps the length at NAME_MAX.
fn sanitize(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() || c == ' ' {
            '_'
        } else {
            c
        };
        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
