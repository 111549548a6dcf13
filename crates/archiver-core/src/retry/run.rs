//! Retry loop: run an attempt until success, budget exhaustion or cancellation.

use std::future::Future;

use super::classify;
use super::error::FetchError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::CancelToken;

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryFailure {
    /// Every attempt failed; carries the error of the last one.
    Exhausted { attempts: u32, last_error: FetchError },
    /// The cancel token was tripped between attempts.
    Cancelled,
}

/// Runs `attempt_fn` until it succeeds or the policy says to stop.
///
/// `attempt_fn` receives the 1-based attempt number. `on_failure` is called for
/// every failed attempt with the attempt number, the error and its kind, before
/// any backoff sleep. The cancel token is checked before each attempt.
pub async fn run_with_retry<T, F, Fut, L>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut on_failure: L,
    mut attempt_fn: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    L: FnMut(u32, &FetchError, ErrorKind),
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryFailure::Cancelled);
        }
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = classify::classify(&e);
                on_failure(attempt, &e, kind);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryFailure::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        if !d.is_zero() {
                            tokio::time::sleep(d).await;
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn http(status: u32) -> FetchError {
        FetchError::Http {
            status,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut failures = Vec::new();
        let out = run_with_retry(
            &instant_policy(10),
            &CancelToken::new(),
            |attempt, _, kind| failures.push((attempt, kind)),
            |attempt| async move {
                if attempt < 3 {
                    Err(http(503))
                } else {
                    Ok(attempt)
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(
            failures,
            vec![(1, ErrorKind::Throttled), (2, ErrorKind::Throttled)]
        );
    }

    #[tokio::test]
    async fn exhausts_budget_with_last_error() {
        let mut calls = 0u32;
        let res: Result<(), _> = run_with_retry(
            &instant_policy(10),
            &CancelToken::new(),
            |_, _, _| {},
            |attempt| {
                calls += 1;
                async move { Err(http(400 + attempt)) }
            },
        )
        .await;
        assert_eq!(calls, 10);
        match res {
            Err(RetryFailure::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 10);
                assert!(matches!(last_error, FetchError::Http { status: 410, .. }));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let res: Result<(), _> = run_with_retry(
            &instant_policy(10),
            &cancel,
            |_, _, _| {},
            |_| async { Ok(()) },
        )
        .await;
        assert!(matches!(res, Err(RetryFailure::Cancelled)));
    }
}
