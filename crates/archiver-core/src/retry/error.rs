//! Per-attempt chunk fetch error, classified before any retry decision.

/// Error returned by a single ranged GET attempt.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status. `body` is a truncated, lossy copy
    /// of the response body for diagnosis.
    #[error("HTTP {status}")]
    Http { status: u32, body: String },
    /// Transfer completed but the payload length did not match the range
    /// (server closed early, or ignored the range and sent more).
    #[error("wrong payload size: expected {expected} bytes, got {received}")]
    PayloadSize { expected: u64, received: u64 },
    /// The blocking task running the attempt panicked or was cancelled.
    #[error("fetch task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Response body captured with the failure, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchError::Http { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}
