//! Endpoint resolution: HEAD probing with explicit redirect walking.
//!
//! Uses the curl crate (libcurl) with redirect following disabled so each hop is
//! visible. The final hop must advertise `Accept-Ranges: bytes` and a positive
//! `Content-Length`; the resolved [`Endpoint`] is then fixed for the whole job.

mod parse;

use std::str;
use std::time::Duration;

use crate::error::DownloadError;
use crate::http::RequestHeaders;

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Headers of interest from one HEAD response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Status code from the status line, if one was seen.
    pub status: Option<u32>,
    /// Total size in bytes, if `Content-Length` is present and numeric.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Location` value on redirects.
    pub location: Option<String>,
}

/// A resolved download target: post-redirect URL and total size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub final_url: String,
    pub content_length: u64,
}

/// Outcome of evaluating one HEAD response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Redirect(String),
    Resolved(Endpoint),
}

fn is_redirect(code: u32) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

/// Decide what one HEAD response means for `url`. Pure; no I/O.
pub fn evaluate(url: &str, code: u32, head: &HeadResult) -> Result<Step, DownloadError> {
    if is_redirect(code) {
        let location = head
            .location
            .as_deref()
            .ok_or_else(|| DownloadError::resolution(url, format!("HTTP {} without location", code)))?;
        let next = url::Url::parse(url)
            .and_then(|base| base.join(location))
            .map_err(|e| DownloadError::resolution(url, format!("bad location {:?}: {}", location, e)))?;
        return Ok(Step::Redirect(next.to_string()));
    }
    if !(200..300).contains(&code) {
        return Err(DownloadError::resolution(url, format!("HEAD returned HTTP {}", code)));
    }
    if !head.accept_ranges {
        return Err(DownloadError::RangeUnsupported {
            url: url.to_string(),
        });
    }
    match head.content_length {
        Some(n) if n > 0 => Ok(Step::Resolved(Endpoint {
            final_url: url.to_string(),
            content_length: n,
        })),
        _ => Err(DownloadError::LengthUnknown {
            url: url.to_string(),
        }),
    }
}

/// Performs one HEAD request without following redirects.
/// Returns the status code and the parsed headers.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn head(url: &str, headers: &RequestHeaders) -> Result<(u32, HeadResult), curl::Error> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.nobody(true)?; // HEAD request
    easy.follow_location(false)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;
    easy.http_headers(headers.curl_list(None)?)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok((code, parse::parse_headers(&lines)))
}

/// Resolve `url` to its final endpoint, walking up to [`MAX_REDIRECTS`] hops.
///
/// Blocking; see [`resolve_async`] for async callers.
pub fn resolve(url: &str, headers: &RequestHeaders) -> Result<Endpoint, DownloadError> {
    let mut current = url.to_string();
    let mut visited: Vec<String> = Vec::new();

    for _ in 0..=MAX_REDIRECTS {
        let (code, head_result) = head(&current, headers)
            .map_err(|e| DownloadError::resolution(&current, format!("HEAD request failed: {}", e)))?;
        match evaluate(&current, code, &head_result)? {
            Step::Resolved(endpoint) => return Ok(endpoint),
            Step::Redirect(next) => {
                if next == current || visited.contains(&next) {
                    return Err(DownloadError::resolution(url, format!("redirect loop at {}", next)));
                }
                tracing::debug!(from = %current, to = %next, status = code, "following redirect");
                visited.push(std::mem::replace(&mut current, next));
            }
        }
    }

    Err(DownloadError::resolution(
        url,
        format!("more than {} redirects", MAX_REDIRECTS),
    ))
}

/// [`resolve`] on the blocking pool.
pub async fn resolve_async(url: String, headers: RequestHeaders) -> Result<Endpoint, DownloadError> {
    let probe_url = url.clone();
    tokio::task::spawn_blocking(move || resolve(&probe_url, &headers))
        .await
        .map_err(|e| DownloadError::resolution(&url, format!("resolver task failed: {}", e)))?
}

/// Re-probe a resource and return its current size in bytes.
pub async fn refresh_size(url: &str, headers: &RequestHeaders) -> Result<u64, DownloadError> {
    let endpoint = resolve_async(url.to_string(), headers.clone()).await?;
    tracing::debug!(url, size = endpoint.content_length, "refreshed size");
    Ok(endpoint.content_length)
}
