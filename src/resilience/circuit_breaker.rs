//! Circuit breaker.
//!
//! A per-dependency state machine that stops calling a dependency after a
//! run of consecutive failures, then tries it again once a cooldown has
//! passed:
//!
//! ```text
//!            failure_threshold consecutive failures
//!   Closed ─────────────────────────────────────────► Open
//!     ▲                                                │
//!     │ successes_to_close                             │ reset_timeout elapsed,
//!     │ consecutive successes                          │ next call admitted
//!     │                                                ▼
//!     └───────────────────────────────────────────── HalfOpen
//!                       any failure ─► Open
//! ```
//!
//! State is guarded by a synchronous mutex that is never held across an
//! await. Each transition bumps a generation counter; outcomes of calls
//! admitted under an older generation update statistics only, so a slow
//! call that started before a transition cannot drive another one.

use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::{
    config::{CircuitBreakerConfig, CircuitEvent, CircuitState, CircuitStats},
    error::CircuitOpenError,
};

type EventListener = Arc<dyn Fn(&str, &CircuitEvent) + Send + Sync>;

/// Guards calls to a single dependency.
///
/// Share one breaker per dependency (wrap it in an [`Arc`] or keep it in a
/// [`BreakerRegistry`](super::BreakerRegistry)); every call site that talks
/// to the dependency should go through the same instance.
///
/// ## Example
///
/// ```rust
/// use bulwark::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Error};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::new(
///     "payment-gateway",
///     CircuitBreakerConfig::builder()
///         .failure_threshold(2)
///         .reset_timeout(Duration::from_secs(30))
///         .build(),
/// );
///
/// for _ in 0..2 {
///     let _ = breaker.execute(|| async { Err::<(), _>(Error::connection("refused")) }).await;
/// }
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let err = breaker.execute(|| async { Ok::<_, Error>(()) }).await.unwrap_err();
/// assert_eq!(err.message(), "Circuit breaker is OPEN");
/// # });
/// ```
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    listeners: RwLock<Vec<EventListener>>,
}

struct BreakerInner {
    state: CircuitState,
    generation: u64,
    failure_count: u32,
    half_open_successes: u32,
    last_failure: Option<Instant>,
    total_calls: u64,
    failed_calls: u64,
    rejected_calls: u64,
    last_failure_at: Option<DateTime<Utc>>,
    last_opened_at: Option<DateTime<Utc>>,
    last_closed_at: Option<DateTime<Utc>>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            failure_count: 0,
            half_open_successes: 0,
            last_failure: None,
            total_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            last_failure_at: None,
            last_opened_at: None,
            last_closed_at: None,
        }
    }

    fn transition_to_open(&mut self, last_error: String) -> CircuitEvent {
        self.state = CircuitState::Open;
        self.generation = self.generation.wrapping_add(1);
        self.half_open_successes = 0;
        self.last_failure = Some(Instant::now());
        self.last_opened_at = Some(Utc::now());
        CircuitEvent::Opened { failure_count: self.failure_count, last_error }
    }

    fn transition_to_half_open(&mut self) -> CircuitEvent {
        self.state = CircuitState::HalfOpen;
        self.generation = self.generation.wrapping_add(1);
        self.half_open_successes = 0;
        CircuitEvent::HalfOpened
    }

    fn transition_to_closed(&mut self) -> CircuitEvent {
        let success_count = self.half_open_successes;
        self.state = CircuitState::Closed;
        self.generation = self.generation.wrapping_add(1);
        self.failure_count = 0;
        self.half_open_successes = 0;
        self.last_closed_at = Some(Utc::now());
        CircuitEvent::Closed { success_count }
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates a breaker with the default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the dependency name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the current state.
    ///
    /// An open breaker whose cooldown has elapsed still reports `Open`; it
    /// moves to `HalfOpen` when the next call is admitted.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns `true` if a call made now would be admitted.
    pub fn is_call_permitted(&self) -> bool {
        let inner = self.inner.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => self.cooldown_remaining(&inner).is_none(),
        }
    }

    /// Returns a snapshot of the breaker's counters.
    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock();
        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_successes: inner.half_open_successes,
            total_calls: inner.total_calls,
            failed_calls: inner.failed_calls,
            rejected_calls: inner.rejected_calls,
            last_failure_at: inner.last_failure_at,
            last_opened_at: inner.last_opened_at,
            last_closed_at: inner.last_closed_at,
        }
    }

    /// Registers a listener called on every state transition.
    ///
    /// Listeners run synchronously on the task that caused the transition,
    /// after the breaker's lock has been released.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&str, &CircuitEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Forces the breaker closed and clears its failure counters.
    pub fn reset(&self) {
        let event = {
            let mut inner = self.inner.lock();
            if inner.state.is_closed() {
                inner.failure_count = 0;
                None
            } else {
                inner.half_open_successes = 0;
                Some(inner.transition_to_closed())
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    /// Forces the breaker open, as if the failure threshold had been hit.
    pub fn trip(&self) {
        let event = {
            let mut inner = self.inner.lock();
            if inner.state.is_open() {
                None
            } else {
                Some(inner.transition_to_open("circuit tripped manually".to_string()))
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    /// Runs `operation` if the breaker admits it.
    ///
    /// When the breaker is open and the cooldown has not elapsed, the call is
    /// rejected with a [`CircuitOpenError`] and `operation` is never invoked.
    /// Otherwise the operation runs and its outcome is recorded before the
    /// result is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError> + fmt::Display,
    {
        let generation = match self.admit() {
            Ok(generation) => generation,
            Err(rejection) => return Err(rejection.into()),
        };

        match operation().await {
            Ok(value) => {
                self.record_success(generation);
                Ok(value)
            },
            Err(err) => {
                self.record_failure(generation, err.to_string());
                Err(err)
            },
        }
    }

    fn cooldown_remaining(&self, inner: &BreakerInner) -> Option<std::time::Duration> {
        let elapsed = inner.last_failure.map(|at| at.elapsed()).unwrap_or_default();
        self.config.reset_timeout().checked_sub(elapsed).filter(|remaining| !remaining.is_zero())
    }

    fn admit(&self) -> Result<u64, CircuitOpenError> {
        let (admission, event) = {
            let mut inner = self.inner.lock();
            let state = inner.state;
            match state {
                CircuitState::Closed | CircuitState::HalfOpen => {
                    inner.total_calls += 1;
                    (Ok(inner.generation), None)
                },
                CircuitState::Open => match self.cooldown_remaining(&inner) {
                    Some(remaining) => {
                        inner.rejected_calls += 1;
                        (Err(CircuitOpenError::new(self.name.clone(), Some(remaining))), None)
                    },
                    None => {
                        let event = inner.transition_to_half_open();
                        inner.total_calls += 1;
                        (Ok(inner.generation), Some(event))
                    },
                },
            }
        };

        if let Some(event) = event {
            self.emit(&event);
        }
        if admission.is_err() {
            tracing::debug!(breaker = %self.name, "circuit open, rejecting call");
        }
        admission
    }

    fn record_success(&self, generation: u64) {
        let event = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            let state = inner.state;
            match state {
                CircuitState::Closed => {
                    inner.failure_count = 0;
                    None
                },
                CircuitState::HalfOpen => {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.successes_to_close() {
                        Some(inner.transition_to_closed())
                    } else {
                        None
                    }
                },
                CircuitState::Open => None,
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    fn record_failure(&self, generation: u64, error: String) {
        let event = {
            let mut inner = self.inner.lock();
            inner.failed_calls += 1;
            inner.last_failure_at = Some(Utc::now());
            if inner.generation != generation {
                return;
            }
            let state = inner.state;
            match state {
                CircuitState::Closed => {
                    inner.failure_count += 1;
                    if inner.failure_count >= self.config.failure_threshold() {
                        Some(inner.transition_to_open(error))
                    } else {
                        None
                    }
                },
                CircuitState::HalfOpen => {
                    inner.failure_count += 1;
                    Some(inner.transition_to_open(error))
                },
                CircuitState::Open => None,
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    fn emit(&self, event: &CircuitEvent) {
        match event {
            CircuitEvent::Opened { failure_count, last_error } => tracing::warn!(
                breaker = %self.name,
                failure_count,
                last_error = %last_error,
                "circuit breaker opened"
            ),
            CircuitEvent::HalfOpened => {
                tracing::info!(breaker = %self.name, "circuit breaker half-open, probing")
            },
            CircuitEvent::Closed { success_count } => {
                tracing::info!(breaker = %self.name, success_count, "circuit breaker closed")
            },
        }

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&self.name, event);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
