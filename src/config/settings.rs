//! File-backed resilience settings.
//!
//! A single JSON document describes defaults for every guarded dependency
//! plus per-dependency overrides:
//!
//! ```json
//! {
//!   "retry": { "max_attempts": 3, "base_delay_ms": 200, "retryable_errors": ["network"] },
//!   "circuit_breaker": { "failure_threshold": 5, "reset_timeout_ms": 30000 },
//!   "timeout_ms": 10000,
//!   "dependencies": {
//!     "payments": { "timeout_ms": 20000, "retry": { "max_attempts": 2 } },
//!     "kyc": { "circuit_breaker": { "failure_threshold": 3 } }
//!   }
//! }
//! ```
//!
//! An override section replaces the corresponding default section as a whole;
//! fields missing from it take the built-in defaults.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use super::{CircuitBreakerConfig, ErrorMatcher, RetryPolicy, TimeoutConfig};
use crate::error::{ErrorKind, Result};

/// Retry section of a [`ResilienceConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(rename = "base_delay_ms", with = "duration_millis")]
    pub base_delay: Duration,
    /// Cap on any single delay; `null` for uncapped.
    #[serde(rename = "max_delay_ms", with = "duration_millis_opt")]
    pub max_delay: Option<Duration>,
    /// Backoff growth factor.
    pub multiplier: f64,
    /// Jitter factor in `0.0..=1.0`.
    pub jitter: f64,
    /// Case-insensitive substrings that make an error retryable.
    pub retryable_errors: Vec<String>,
    /// Error categories that make an error retryable.
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay: policy.base_delay,
            max_delay: policy.max_delay,
            multiplier: policy.multiplier,
            jitter: policy.jitter,
            retryable_errors: Vec::new(),
            retryable_kinds: Vec::new(),
        }
    }
}

impl RetrySettings {
    /// Converts the section into a validated [`RetryPolicy`].
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let matchers = self
            .retryable_errors
            .iter()
            .map(ErrorMatcher::contains)
            .chain(self.retryable_kinds.iter().copied().map(ErrorMatcher::Kind));
        let mut policy = RetryPolicy::new()
            .with_base_delay(self.base_delay)
            .with_multiplier(self.multiplier)
            .with_retryable(matchers);
        policy.max_attempts = self.max_attempts;
        policy.max_delay = self.max_delay;
        policy.jitter = self.jitter;
        policy.validate()?;
        Ok(policy)
    }
}

/// Circuit breaker section of a [`ResilienceConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cooldown before a trial call.
    #[serde(rename = "reset_timeout_ms", with = "duration_millis")]
    pub reset_timeout: Duration,
    /// Half-open successes needed to close.
    pub successes_to_close: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold(),
            reset_timeout: config.reset_timeout(),
            successes_to_close: config.successes_to_close(),
        }
    }
}

impl BreakerSettings {
    /// Converts the section into a validated [`CircuitBreakerConfig`].
    pub fn to_config(&self) -> Result<CircuitBreakerConfig> {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(self.failure_threshold)
            .reset_timeout(self.reset_timeout)
            .successes_to_close(self.successes_to_close)
            .build();
        config.validate()?;
        Ok(config)
    }
}

/// Overrides for one named dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencySettings {
    /// Replaces the default retry section.
    pub retry: Option<RetrySettings>,
    /// Replaces the default breaker section.
    pub circuit_breaker: Option<BreakerSettings>,
    /// Replaces the default timeout.
    #[serde(rename = "timeout_ms", with = "duration_millis_opt")]
    pub timeout: Option<Duration>,
}

/// Resilience settings for an application, usually loaded at startup.
///
/// ## Example
///
/// ```rust
/// use bulwark::ResilienceConfig;
///
/// let config = ResilienceConfig::from_json_str(r#"{
///     "timeout_ms": 5000,
///     "dependencies": { "payments": { "retry": { "max_attempts": 2 } } }
/// }"#)?;
///
/// assert_eq!(config.retry_policy("payments")?.max_attempts, 2);
/// assert_eq!(config.retry_policy("email")?.max_attempts, 3);
/// # Ok::<(), bulwark::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Default retry section.
    pub retry: RetrySettings,
    /// Default breaker section.
    pub circuit_breaker: BreakerSettings,
    /// Default timeout; `null` disables the timeout race.
    #[serde(rename = "timeout_ms", with = "duration_millis_opt")]
    pub timeout: Option<Duration>,
    /// Per-dependency overrides keyed by dependency name.
    pub dependencies: BTreeMap<String, DependencySettings>,
}

impl ResilienceConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document from bytes.
    pub fn from_json_slice(json: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the defaults and every override.
    pub fn validate(&self) -> Result<()> {
        self.retry.to_policy()?;
        self.circuit_breaker.to_config()?;
        for settings in self.dependencies.values() {
            if let Some(retry) = &settings.retry {
                retry.to_policy()?;
            }
            if let Some(breaker) = &settings.circuit_breaker {
                breaker.to_config()?;
            }
        }
        Ok(())
    }

    /// Returns the retry policy for `dependency`.
    pub fn retry_policy(&self, dependency: &str) -> Result<RetryPolicy> {
        self.dependencies
            .get(dependency)
            .and_then(|d| d.retry.as_ref())
            .unwrap_or(&self.retry)
            .to_policy()
    }

    /// Returns the breaker configuration for `dependency`.
    pub fn breaker_config(&self, dependency: &str) -> Result<CircuitBreakerConfig> {
        self.dependencies
            .get(dependency)
            .and_then(|d| d.circuit_breaker.as_ref())
            .unwrap_or(&self.circuit_breaker)
            .to_config()
    }

    /// Returns the timeout for `dependency`, if any.
    pub fn timeout(&self, dependency: &str) -> Option<TimeoutConfig> {
        self.dependencies
            .get(dependency)
            .and_then(|d| d.timeout)
            .or(self.timeout)
            .map(TimeoutConfig::new)
    }
}

/// Serde helper for `Duration` as milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde helper for `Option<Duration>` as milliseconds.
mod duration_millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => u64::try_from(d.as_millis()).unwrap_or(u64::MAX).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<u64>::deserialize(deserializer)?;
        Ok(opt.map(Duration::from_millis))
    }
}
