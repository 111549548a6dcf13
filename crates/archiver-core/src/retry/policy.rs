use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of an error, used to shape the backoff delay.
///
/// Every kind is retried until the attempt budget runs out; the kind only
/// changes how long we wait and how the failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body).
    Connection,
    /// HTTP 5xx other than 503.
    Http5xx(u16),
    /// Anything else (4xx, protocol errors).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt budget exhausted.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed attempt budget with jittered exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff. Zero retries immediately.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(cfg.max_delay_secs.max(0.0)),
        }
    }
}

impl RetryPolicy {
    /// Attempts left after `attempt` (1-based) failed.
    pub fn remaining(&self, attempt: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt)
    }

    /// Upper bound of the delay before attempt `attempt + 1`, without jitter.
    pub fn ceiling(&self, attempt: u32, kind: ErrorKind) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let mut raw = self.base_delay.saturating_mul(exp);
        if kind == ErrorKind::Throttled {
            raw = raw.saturating_mul(2);
        }
        raw.min(self.max_delay)
    }

    /// Decide whether attempt `attempt + 1` happens and after how long.
    ///
    /// `attempt` is 1-based (1 = first attempt). The delay is drawn from
    /// `[ceiling / 2, ceiling]`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let ceiling = self.ceiling(attempt, kind);
        if ceiling.is_zero() {
            return RetryDecision::RetryAfter(Duration::ZERO);
        }
        let half = ceiling / 2;
        let jitter_ms = rand::rng().random_range(0..=half.as_millis() as u64);
        RetryDecision::RetryAfter(half + Duration::from_millis(jitter_ms))
    }
}
