use std::fmt::Display;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Backoff;

#[derive(Debug, Error, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-retryable error ended the loop early.
    #[error("{0}")]
    Fatal(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or
/// `max_retries` retries have been spent. The first attempt is not a retry,
/// so `op` runs at most `max_retries + 1` times.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, B, F, Fut, P>(
    max_retries: u32,
    backoff: &mut B,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    E: Display,
    B: Backoff + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_transient(&e) => return Err(RetryError::Fatal(e)),
            Err(e) if attempt > max_retries => {
                warn!(attempts = attempt, error = %e, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                debug!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinearBackoff;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast() -> LinearBackoff {
        LinearBackoff::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, RetryError<String>> = retry(
            3,
            &mut fast(),
            |attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err("timeout".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RetryError<String>> = retry(
            3,
            &mut fast(),
            |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("timeout".to_string())
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: "timeout".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RetryError<String>> = retry(
            3,
            &mut fast(),
            |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("reverted".to_string())
                }
            },
            |e| e != "reverted",
        )
        .await;

        assert_eq!(result, Err(RetryError::Fatal("reverted".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
