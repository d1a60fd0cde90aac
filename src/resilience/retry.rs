//! Backoff retrier.
//!
//! Re-invokes a failing operation with exponentially growing, jittered
//! delays until it succeeds, the error is not retryable, or the attempt
//! budget is spent. The final error is the operation's own error.

use std::future::Future;

use crate::{config::RetryPolicy, error::Classify};

/// Runs `operation` under `policy`.
///
/// The operation is a factory: each attempt calls it again to obtain a fresh
/// future. Attempts never overlap; attempt `n + 1` starts only after attempt
/// `n` has failed and its delay has elapsed. At least one attempt is always
/// made.
///
/// ## Example
///
/// ```rust
/// use bulwark::{Error, RetryPolicy, retry_with_backoff};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let calls = AtomicU32::new(0);
/// let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(1));
///
/// let value = retry_with_backoff(
///     || async {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(Error::connection("network unreachable"))
///         } else {
///             Ok("minted")
///         }
///     },
///     &policy,
/// )
/// .await?;
///
/// assert_eq!(value, "minted");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # Ok::<(), Error>(())
/// # });
/// ```
pub async fn retry_with_backoff<T, E, F, Fut>(mut operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) => {
                if !policy.should_retry(attempt, &err) {
                    if attempt > 1 {
                        tracing::debug!(attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );
                policy.notify_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            },
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` under this policy.
    ///
    /// Shorthand for [`retry_with_backoff`].
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        retry_with_backoff(operation, self).await
    }
}
