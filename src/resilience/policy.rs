//! All three primitives applied around one call site.

use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use futures::FutureExt;
use tokio::time::Instant;

use super::{BreakerRegistry, CircuitBreaker, retry_with_backoff, with_timeout};
use crate::{
    config::{ResilienceConfig, RetryPolicy, TimeoutConfig},
    error::{CircuitOpenError, Classify, ErrorKind, Result, TimeoutError},
    monitoring::Metrics,
};

/// Composes a circuit breaker, a backoff retrier and a timeout race.
///
/// The layers nest in a fixed order:
///
/// ```text
/// breaker.execute(|| retry_with_backoff(|| with_timeout(operation(), timeout)))
/// ```
///
/// Each attempt gets its own deadline, and the breaker records one outcome
/// per logical call rather than one per attempt. Every layer is optional.
///
/// ## Example
///
/// ```rust
/// use bulwark::{CircuitBreaker, Error, ResiliencePolicy, RetryPolicy};
/// use std::{sync::Arc, time::Duration};
///
/// # tokio_test::block_on(async {
/// let policy = ResiliencePolicy::new("rpc")
///     .with_breaker(Arc::new(CircuitBreaker::with_defaults("rpc")))
///     .with_retry(RetryPolicy::new().with_base_delay(Duration::from_millis(1)))
///     .with_timeout(Duration::from_secs(2));
///
/// let block = policy.execute(|| async { Ok::<_, Error>(19_000_000u64) }).await?;
/// assert_eq!(block, 19_000_000);
/// # Ok::<(), Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct ResiliencePolicy {
    name: String,
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<RetryPolicy>,
    timeout: Option<TimeoutConfig>,
    metrics: Option<Metrics>,
}

impl ResiliencePolicy {
    /// Creates a policy with no layers for the named call site.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), breaker: None, retry: None, timeout: None, metrics: None }
    }

    /// Builds the policy for `dependency` from a configuration document.
    ///
    /// The breaker is taken from `registry` so that every policy for the same
    /// dependency shares it. A breaker not yet in the registry is created
    /// with the document's `circuit_breaker` section for `dependency`; an
    /// existing breaker configured differently is a configuration error.
    pub fn from_config(
        config: &ResilienceConfig,
        registry: &BreakerRegistry,
        dependency: &str,
    ) -> Result<Self> {
        let breaker = registry.get_or_create_with(dependency, config.breaker_config(dependency)?)?;
        let mut policy = Self::new(dependency)
            .with_breaker(breaker)
            .with_retry(config.retry_policy(dependency)?);
        policy.timeout = config.timeout(dependency);
        Ok(policy)
    }

    /// Guards calls with `breaker`.
    #[must_use]
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Retries failed attempts under `retry`.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Races each attempt against `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<TimeoutConfig>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Records calls, retries, timeouts and rejections into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the call site name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the circuit breaker, if any.
    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Returns the retry policy, if any.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Returns the timeout, if any.
    pub fn timeout(&self) -> Option<&TimeoutConfig> {
        self.timeout.as_ref()
    }

    /// Runs `operation` through every configured layer.
    ///
    /// `operation` is called once per attempt. The result is the operation's
    /// own value or error, or one of the synthetic [`TimeoutError`] and
    /// [`CircuitOpenError`] converted into `E`.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Classify + From<TimeoutError> + From<CircuitOpenError>,
    {
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let metrics = self.metrics.as_ref();
        let name = self.name.as_str();
        let timeout = self.timeout.as_ref();

        let mut attempt = move || {
            counter.fetch_add(1, Ordering::Relaxed);
            let fut = operation();
            let timeout = timeout.cloned();
            async move {
                let Some(timeout) = timeout else {
                    return fut.await;
                };
                match with_timeout(fut.map(Ok::<_, TimeoutError>), timeout).await {
                    Ok(result) => result,
                    Err(elapsed) => {
                        if let Some(metrics) = metrics {
                            metrics.record_timeout(name);
                        }
                        Err(elapsed.into())
                    },
                }
            }
        };

        let retry = self.retry.as_ref();
        let attempt_ref = &mut attempt;
        let guarded = move || async move {
            match retry {
                Some(policy) => retry_with_backoff(attempt_ref, policy).await,
                None => attempt_ref().await,
            }
        };

        let result = match &self.breaker {
            Some(breaker) => breaker.execute(guarded).await,
            None => guarded().await,
        };

        if let Some(metrics) = metrics {
            let retries = attempts.load(Ordering::Relaxed).saturating_sub(1);
            metrics.record_retries(name, u64::from(retries));
            if let Err(err) = &result
                && err.kind() == Some(ErrorKind::CircuitOpen)
            {
                metrics.record_rejection(name);
            }
            metrics.record_call(name, start.elapsed(), result.is_ok());
        }
        result
    }
}

impl fmt::Debug for ResiliencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResiliencePolicy")
            .field("name", &self.name)
            .field("breaker", &self.breaker.as_ref().map(|b| b.name()))
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
