//! Instrumented operations.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::time::Instant;

use super::Metrics;

/// Wraps an operation factory so every call is timed and counted.
///
/// The returned factory has the same shape as `operation`, so it can be
/// handed to [`retry_with_backoff`](crate::retry_with_backoff) or a
/// [`CircuitBreaker`](crate::CircuitBreaker) unchanged. Each produced future
/// records one call into `metrics` under `name` when it completes; futures
/// dropped before completion record nothing.
///
/// ## Example
///
/// ```rust
/// use bulwark::{Error, monitoring::{Metrics, instrument}};
///
/// # tokio_test::block_on(async {
/// let metrics = Metrics::default();
/// let mut fetch_price = instrument(&metrics, "price-oracle", || async { Ok::<_, Error>(42.5) });
///
/// assert_eq!(fetch_price().await?, 42.5);
/// assert_eq!(metrics.snapshot().operations["price-oracle"].calls, 1);
/// # Ok::<(), Error>(())
/// # });
/// ```
pub fn instrument<F, Fut, T, E>(
    metrics: &Metrics,
    name: impl Into<String>,
    mut operation: F,
) -> impl FnMut() -> Instrumented<Fut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let metrics = metrics.clone();
    let name: Arc<str> = Arc::from(name.into());
    move || Instrumented {
        inner: Box::pin(operation()),
        recorder: Some(Recorder {
            metrics: metrics.clone(),
            name: Arc::clone(&name),
            started: Instant::now(),
        }),
    }
}

/// Future returned by an [`instrument`]ed operation.
#[must_use = "futures do nothing unless polled"]
pub struct Instrumented<Fut> {
    inner: Pin<Box<Fut>>,
    recorder: Option<Recorder>,
}

struct Recorder {
    metrics: Metrics,
    name: Arc<str>,
    started: Instant,
}

impl<Fut, T, E> Future for Instrumented<Fut>
where
    Fut: Future<Output = Result<T, E>>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = std::task::ready!(this.inner.as_mut().poll(cx));
        if let Some(recorder) = this.recorder.take() {
            recorder.metrics.record_call(&recorder.name, recorder.started.elapsed(), output.is_ok());
        }
        Poll::Ready(output)
    }
}
