//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

/// Parse collected header lines into HeadResult.
///
/// A status line resets all fields, so only the last response in the
/// collected block counts (interim responses, proxy CONNECT replies).
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            out = HeadResult {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|code| code.parse::<u32>().ok()),
                ..HeadResult::default()
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                out.content_length = value.parse::<u64>().ok();
            }
            if name.eq_ignore_ascii_case("accept-ranges") {
                out.accept_ranges = value
                    .split(',')
                    .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));
            }
            if name.eq_ignore_ascii_case("location") && !value.is_empty() {
                out.location = Some(value.to_string());
            }
        }
    }

    out
}
