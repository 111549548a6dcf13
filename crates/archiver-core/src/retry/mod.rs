//! Retry and backoff policy for chunk fetches.
//!
//! Error classification (timeouts, throttling, connection failures), the
//! attempt budget with jittered backoff, and the async retry loop used by the
//! chunk fetcher.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryFailure};
