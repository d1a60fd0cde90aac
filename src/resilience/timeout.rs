//! Timeout racer.
//!
//! Races an in-flight operation against a deadline. Whichever settles first
//! decides the outcome; there is no retry and no state.

use std::future::Future;

use crate::{config::TimeoutConfig, error::TimeoutError};

/// Races `operation` against `timeout`.
///
/// If the operation settles first its `Ok`/`Err` is returned unchanged. If
/// the deadline wins, the call fails with a [`TimeoutError`] converted into
/// the caller's error type. The losing operation is dropped, which cancels
/// it at its next suspension point; see [`with_timeout_detached`] for
/// operations that must keep running.
///
/// ## Example
///
/// ```rust
/// use bulwark::{Error, TimeoutConfig, with_timeout};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let value = with_timeout(async { Ok::<_, Error>(7) }, Duration::from_millis(100)).await?;
/// assert_eq!(value, 7);
///
/// let slow = async {
///     tokio::time::sleep(Duration::from_millis(200)).await;
///     Ok::<_, Error>(())
/// };
/// let err = with_timeout(slow, TimeoutConfig::new(Duration::from_millis(50)).with_message("Timeout!"))
///     .await
///     .unwrap_err();
/// assert_eq!(err.message(), "Timeout!");
/// # Ok::<(), Error>(())
/// # });
/// ```
pub async fn with_timeout<F, T, E>(operation: F, timeout: impl Into<TimeoutConfig>) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    let timeout = timeout.into();
    match tokio::time::timeout(timeout.duration, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.duration.as_millis() as u64, "operation timed out");
            Err(timeout.error().into())
        },
    }
}

/// Races `operation` against `timeout` without cancelling it.
///
/// The operation is spawned onto the current Tokio runtime. When the deadline
/// wins, the task keeps running in the background and its result is
/// discarded. Use this only for work that must finish once started (for
/// example a submitted blockchain transaction whose receipt is still useful
/// to other observers).
///
/// Panics inside the operation are propagated to the caller. Must be called
/// from within a Tokio runtime.
pub async fn with_timeout_detached<F, T, E>(
    operation: F,
    timeout: impl Into<TimeoutConfig>,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<TimeoutError> + Send + 'static,
{
    let timeout = timeout.into();
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(timeout.duration, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) if join_error.is_panic() => {
            std::panic::resume_unwind(join_error.into_panic())
        },
        // The task can only be cancelled by runtime shutdown.
        Ok(Err(_)) => Err(TimeoutError::with_message(
            timeout.duration,
            "operation task was cancelled before completing",
        )
        .into()),
        Err(_) => {
            tracing::debug!(
                timeout_ms = timeout.duration.as_millis() as u64,
                "operation timed out, leaving it running in the background"
            );
            Err(timeout.error().into())
        },
    }
}
