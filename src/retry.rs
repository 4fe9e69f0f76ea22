//! Generic retry with exponential backoff.
//!
//! One wrapper serves two retry shapes the pipeline needs:
//!
//! * **Transient-failure retry** — the operation returned `Err` (network
//!   blip, 429/5xx from the model API). Retried up to `max_retries` times.
//! * **Result-triggered retry** — the operation returned `Ok` but the value
//!   is unacceptable (a refusal, an empty classification). The caller
//!   supplies a `retry_on_result` predicate; a predicate-true value is
//!   retried on the same schedule.
//!
//! Exhaustion semantics differ on purpose: exhausting retries on an `Err`
//! returns a [`RetryFailure`], but exhausting them on a predicate-true value
//! returns the last value with `exhausted: true` — the caller still gets a
//! result to inspect (a persistent refusal is an outcome, not an error).
//!
//! The backoff schedule is `min(2^attempt * base, max)` — with the default
//! 500 ms base and 8 s cap: 500 ms → 1 s → 2 s → 4 s → 8 s → 8 s.

use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Backoff schedule and retry bound, passed explicitly to [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Ceiling on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom retry bound and the default backoff schedule.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Backoff delay before retrying attempt `attempt` (0-based):
    /// `min(2^attempt * base, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// A value that came back from [`with_retry`], annotated with how it got out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Retries performed before this value was accepted (or given up on).
    pub retries: u32,
    /// The `retry_on_result` predicate was still true when retries ran out.
    pub exhausted: bool,
}

/// Terminal failure: every attempt returned `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub retries: u32,
}

/// Run `operation` with retry on error or on a predicate-true result.
///
/// The operation is attempted `1 + policy.max_retries` times at most. Between
/// attempts the task sleeps for [`RetryPolicy::delay_for`] of the attempt
/// just failed.
pub async fn with_retry<T, E, F, Fut, P>(
    mut operation: F,
    policy: &RetryPolicy,
    mut retry_on_result: P,
) -> Result<RetryOutcome<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if !retry_on_result(&value) {
                    return Ok(RetryOutcome {
                        value,
                        retries: attempt,
                        exhausted: false,
                    });
                }
                if attempt >= policy.max_retries {
                    return Ok(RetryOutcome {
                        value,
                        retries: attempt,
                        exhausted: true,
                    });
                }
            }
            Err(error) => {
                if attempt >= policy.max_retries {
                    return Err(RetryFailure {
                        error,
                        retries: attempt,
                    });
                }
                warn!(
                    "attempt {}/{} failed — {}",
                    attempt + 1,
                    policy.max_retries + 1,
                    error
                );
            }
        }
        sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}

/// Retry on thrown errors only; any `Ok` value is accepted.
pub async fn retry_transient<T, E, F, Fut>(
    operation: F,
    policy: &RetryPolicy,
) -> Result<RetryOutcome<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry(operation, policy, |_| false).await
}
