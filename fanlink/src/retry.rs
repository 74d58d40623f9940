//! Bounded retry with exponential backoff.
//!
//! [`run_with_retry`] knows nothing about what it retries. The operation must
//! be safe to repeat, which holds for fan commands since the appliance treats
//! every datagram independently.
//!
//! [`run_with_retry_if`] adds two escape hatches: errors the caller marks as
//! permanent end the sequence at once, and an optional token cuts a pending
//! backoff short so the next attempt runs immediately.

use serde::Serialize;
use std::{fmt, future::Future, time::Duration};
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::tracing::prelude::*;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubles after each failure.
    pub base_delay: Duration,
    /// Deadline applied to each individual attempt.
    pub per_attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, per_attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            per_attempt_timeout,
        }
    }

    /// Delay to wait after attempt `attempt` (1-indexed) fails.
    ///
    /// `base_delay * 2^(attempt - 1)`, saturating instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_millis(5000))
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// The operation did not succeed.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    /// An attempt failed with an error that retrying cannot fix.
    #[error("gave up on attempt {attempts}: {last_error}")]
    Aborted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } | RetryError::Aborted { last_error, .. } => {
                last_error
            }
        }
    }

    /// Number of attempts made, including the last one.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Aborted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 1-indexed attempt number. Between attempts the task
/// sleeps without blocking the runtime, so other operations keep running.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    run_with_retry_if(policy, op, |_| true, None).await
}

/// Like [`run_with_retry`], but stops at the first error for which
/// `is_retryable` returns false, and skips the rest of a backoff wait once
/// `interrupt` is cancelled.
pub async fn run_with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_retryable: P,
    interrupt: Option<&CancellationToken>,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        trace!(attempt, max_attempts, "Attempt started");

        match op(attempt).await {
            Ok(value) => {
                debug!(attempt, "Operation succeeded");
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => {
                error!(attempts = attempt, error = %e, "Attempt failed permanently");
                return Err(RetryError::Aborted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) if attempt >= max_attempts => {
                error!(attempts = attempt, error = %e, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    retry_in_ms = millis(delay),
                    "Attempt failed"
                );
                backoff(delay, interrupt).await;
                attempt += 1;
            }
        }
    }
}

async fn backoff(delay: Duration, interrupt: Option<&CancellationToken>) {
    let Some(token) = interrupt else {
        time::sleep(delay).await;
        return;
    };

    tokio::select! {
        _ = time::sleep(delay) => {}
        _ = token.cancelled() => trace!("Backoff interrupted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(u64::MAX / 2), Duration::ZERO);
        assert_eq!(policy.delay_after(64), Duration::MAX);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_failures() {
        let start = Instant::now();
        let attempts_at = Mutex::new(Vec::new());

        let result = run_with_retry(&policy(), |attempt| {
            attempts_at.lock().unwrap().push(start.elapsed());
            async move {
                if attempt < 3 {
                    Err("boom")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            *attempts_at.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(300),
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_does_not_wait() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);

        let result: Result<&str, RetryError<&str>> = run_with_retry(&policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = run_with_retry(&policy(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {}", attempt)) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.last_error(), "failure 3");
        assert_eq!(
            err.to_string(),
            "retries exhausted after 3 attempts: failure 3"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_lets_concurrent_work_proceed() {
        let start = Instant::now();
        let failing_calls = AtomicU32::new(0);

        // Fails twice: backs off 100ms then 200ms, finishing at 300ms.
        let retried = async {
            let result = run_with_retry(&policy(), |attempt| {
                failing_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("busy")
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
            (result, start.elapsed())
        };

        // Starts and completes in the middle of the first backoff.
        let other = async {
            time::sleep(Duration::from_millis(50)).await;
            let result: Result<u32, RetryError<&str>> =
                run_with_retry(&policy(), |attempt| async move { Ok(attempt) }).await;
            (result, start.elapsed(), failing_calls.load(Ordering::SeqCst))
        };

        let ((retried, retried_at), (other, other_at, calls_seen)) =
            tokio::join!(retried, other);

        assert!(retried.is_ok());
        assert_eq!(retried_at, Duration::from_millis(300));
        assert_eq!(other.unwrap(), 1);
        assert_eq!(other_at, Duration::from_millis(50));
        // The other operation finished while the first was still backing off.
        assert_eq!(calls_seen, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_immediately() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = run_with_retry_if(
            &policy(),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(if attempt == 1 { "flaky" } else { "fatal" }) }
            },
            |e: &&str| *e != "fatal",
            None,
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Aborted { attempts: 2, .. }));
        assert_eq!(*err.last_error(), "fatal");
        assert_eq!(err.to_string(), "gave up on attempt 2: fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cuts_backoff_short() {
        let start = Instant::now();
        let token = CancellationToken::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(10), Duration::from_secs(1));

        let canceller = async {
            time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        };
        let retried = run_with_retry_if(
            &policy,
            |attempt| async move { Err::<(), _>(format!("failure {}", attempt)) },
            |_| true,
            Some(&token),
        );

        let (_, result) = tokio::join!(canceller, retried);

        // Remaining attempts run back to back once the token fires.
        assert_eq!(result.unwrap_err().attempts(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_millis_clamps() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
