//! Chunk fetcher: one ranged GET per attempt, retried under the job's policy.

use std::time::Duration;

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::http::RequestHeaders;
use crate::planner::ChunkTask;
use crate::retry::{run_with_retry, ErrorKind, FetchError, RetryFailure, RetryPolicy};

/// Maximum number of response-body bytes kept for diagnosis on HTTP errors.
const ERROR_BODY_LIMIT: usize = 512;

/// Performs one ranged GET for `chunk` and returns exactly `chunk.len()` bytes.
///
/// A non-2xx status, a short body or a body longer than the range all fail the
/// attempt. Runs in the current thread; call from `spawn_blocking`.
pub fn fetch_range(
    url: &str,
    headers: &RequestHeaders,
    chunk: &ChunkTask,
) -> Result<Vec<u8>, FetchError> {
    let expected = chunk.len();
    let mut body: Vec<u8> = Vec::with_capacity(expected as usize);
    let mut seen = 0u64;
    let mut overflow = false;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(false)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Abort if throughput drops below 1 KiB/s for 60s instead of a hard wall-clock timeout.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.http_headers(headers.curl_list(Some(&chunk.range_header_value()))?)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            seen += data.len() as u64;
            // Error pages may be larger than a tiny range; keep a bounded prefix either way.
            let limit = (expected as usize).max(ERROR_BODY_LIMIT);
            if body.len() + data.len() > limit {
                overflow = true;
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    let code = easy.response_code()?;
    if code != 0 && !(200..300).contains(&code) {
        body.truncate(ERROR_BODY_LIMIT);
        return Err(FetchError::Http {
            status: code,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    if let Err(e) = perform_result {
        if !(e.is_write_error() && overflow) {
            return Err(FetchError::Curl(e));
        }
    }

    if seen != expected {
        return Err(FetchError::PayloadSize {
            expected,
            received: seen,
        });
    }
    Ok(body)
}

/// Fetches chunks of one resolved endpoint with retry. Cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct ChunkFetcher {
    context_id: String,
    url: String,
    headers: RequestHeaders,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl ChunkFetcher {
    pub fn new(
        context_id: impl Into<String>,
        url: impl Into<String>,
        headers: RequestHeaders,
        policy: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            context_id: context_id.into(),
            url: url.into(),
            headers,
            policy,
            cancel,
        }
    }

    /// Fetch `chunk`, retrying every failure until the attempt budget is spent.
    pub async fn fetch(&self, chunk: ChunkTask) -> Result<Vec<u8>, DownloadError> {
        let context_id = self.context_id.as_str();
        let policy = self.policy;

        let on_failure = |attempt: u32, err: &FetchError, kind: ErrorKind| {
            tracing::warn!(
                context_id,
                start = chunk.start,
                end = chunk.end,
                attempt,
                remaining = policy.remaining(attempt),
                ?kind,
                error = %err,
                "chunk fetch failed"
            );
            if let Some(body) = err.body() {
                tracing::debug!(context_id, start = chunk.start, end = chunk.end, body, "bad response body");
            }
        };

        let attempt = |_attempt: u32| {
            let url = self.url.clone();
            let headers = self.headers.clone();
            async move {
                match tokio::task::spawn_blocking(move || fetch_range(&url, &headers, &chunk)).await {
                    Ok(res) => res,
                    Err(join_err) => Err(FetchError::Task(join_err.to_string())),
                }
            }
        };

        match run_with_retry(&policy, &self.cancel, on_failure, attempt).await {
            Ok(bytes) => Ok(bytes),
            Err(RetryFailure::Cancelled) => Err(DownloadError::Cancelled),
            Err(RetryFailure::Exhausted { attempts, last_error }) => {
                Err(DownloadError::ChunkRetryExhausted {
                    start: chunk.start,
                    end: chunk.end,
                    attempts,
                    last_error,
                })
            }
        }
    }
}
