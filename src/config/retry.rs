//! Retry policy for the backoff retrier.

use std::{fmt, sync::Arc, time::Duration};

use crate::error::{Classify, Error, ErrorKind, Result};

/// Observer invoked with `(attempt, error)` before each retry sleep.
pub type RetryObserver = Arc<dyn Fn(u32, &dyn Classify) + Send + Sync>;

/// Selects which errors are worth retrying.
///
/// Substring matchers compare case-insensitively against the error's
/// `Display` text and its category name; kind matchers compare against the
/// category tag exposed through [`Classify::kind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMatcher {
    /// Case-insensitive containment.
    Contains(String),
    /// Exact category tag.
    Kind(ErrorKind),
}

impl ErrorMatcher {
    /// Creates a substring matcher.
    pub fn contains(pattern: impl AsRef<str>) -> Self {
        ErrorMatcher::Contains(pattern.as_ref().to_lowercase())
    }

    /// Creates a category matcher.
    pub fn kind(kind: ErrorKind) -> Self {
        ErrorMatcher::Kind(kind)
    }

    fn matches(&self, text: &str, kind: Option<ErrorKind>) -> bool {
        match self {
            ErrorMatcher::Contains(pattern) => {
                let pattern = pattern.to_lowercase();
                text.contains(&pattern)
                    || kind.is_some_and(|k| {
                        k.as_tag().contains(&pattern) || k.to_string().contains(&pattern)
                    })
            },
            ErrorMatcher::Kind(expected) => kind == Some(*expected),
        }
    }
}

impl From<&str> for ErrorMatcher {
    fn from(pattern: &str) -> Self {
        ErrorMatcher::contains(pattern)
    }
}

impl From<String> for ErrorMatcher {
    fn from(pattern: String) -> Self {
        ErrorMatcher::contains(pattern)
    }
}

impl From<ErrorKind> for ErrorMatcher {
    fn from(kind: ErrorKind) -> Self {
        ErrorMatcher::Kind(kind)
    }
}

/// Configuration for retrying a failing operation with exponential backoff.
///
/// ## Default Values
///
/// - `max_attempts`: 3 (the first call plus two retries)
/// - `base_delay`: 100ms
/// - `max_delay`: 10s
/// - `multiplier`: 2.0
/// - `jitter`: 0.1 (±10%)
/// - `retryable`: empty (every error is retried)
///
/// ## Example
///
/// ```rust
/// use bulwark::{ErrorKind, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_attempts(5)
///     .with_base_delay(Duration::from_millis(200))
///     .with_max_delay(Duration::from_secs(5))
///     .retry_on("network")
///     .retry_on(ErrorKind::RateLimited)
///     .on_retry(|attempt, err| eprintln!("attempt {attempt} failed: {err}"));
///
/// assert_eq!(policy.max_attempts, 5);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Always at least 1.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on any single delay. `None` means uncapped.
    pub max_delay: Option<Duration>,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0); delays vary within `±jitter` of nominal.
    pub jitter: f64,

    /// Errors eligible for retry. Empty means all errors.
    pub retryable: Vec<ErrorMatcher>,

    on_retry: Option<RetryObserver>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter", &self.jitter)
            .field("retryable", &self.retryable)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Some(Duration::from_secs(10)),
            multiplier: 2.0,
            jitter: 0.1,
            retryable: Vec::new(),
            on_retry: None,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Sets the total number of attempts. Zero is treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Caps every delay at `delay`.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Removes the delay cap.
    #[must_use]
    pub fn without_max_delay(mut self) -> Self {
        self.max_delay = None;
        self
    }

    /// Sets the exponential backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Adds one retryable-error matcher.
    #[must_use]
    pub fn retry_on(mut self, matcher: impl Into<ErrorMatcher>) -> Self {
        self.retryable.push(matcher.into());
        self
    }

    /// Replaces the retryable-error matchers.
    #[must_use]
    pub fn with_retryable<I, M>(mut self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ErrorMatcher>,
    {
        self.retryable = matchers.into_iter().map(Into::into).collect();
        self
    }

    /// Registers an observer called before each retry sleep.
    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &dyn Classify) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Returns `true` if more than one attempt is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Returns `true` if `error` matches the retryable set.
    pub fn is_retryable(&self, error: &dyn Classify) -> bool {
        if self.retryable.is_empty() {
            return true;
        }
        let text = error.to_string().to_lowercase();
        let kind = error.kind();
        self.retryable.iter().any(|m| m.matches(&text, kind))
    }

    /// Decides whether a failure on `attempt` (1-based) should be retried.
    pub fn should_retry(&self, attempt: u32, error: &dyn Classify) -> bool {
        attempt < self.max_attempts && self.is_retryable(error)
    }

    /// Delay after failed attempt `attempt` (1-based) before jitter.
    ///
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        self.cap(secs)
    }

    /// Calculates the jittered delay after failed attempt `attempt`.
    ///
    /// The result lies within `nominal * (1 ± jitter)` and never exceeds
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let range = nominal.as_secs_f64() * self.jitter;
        let offset = (fastrand::f64() - 0.5) * 2.0 * range;
        self.cap((nominal.as_secs_f64() + offset).max(0.0))
    }

    /// Checks invariants that builders cannot enforce on their own.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::configuration(format!(
                "retry multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::configuration(format!(
                "retry jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if let Some(max) = self.max_delay
            && max < self.base_delay
        {
            return Err(Error::configuration("retry max_delay is smaller than base_delay"));
        }
        Ok(())
    }

    pub(crate) fn notify_retry(&self, attempt: u32, error: &dyn Classify) {
        if let Some(observer) = &self.on_retry {
            observer(attempt, error);
        }
    }

    fn cap(&self, secs: f64) -> Duration {
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
