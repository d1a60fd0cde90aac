//! Named circuit breakers, one per dependency.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::CircuitBreaker;
use crate::{
    config::{CircuitBreakerConfig, CircuitStats, ResilienceConfig},
    error::{Error, Result},
};

/// Hands out one shared [`CircuitBreaker`] per dependency name.
///
/// Breakers are created lazily on first lookup, using a per-name override
/// when one is registered and the default configuration otherwise. Cloning
/// the registry is cheap and clones share the same breakers.
///
/// ## Example
///
/// ```rust
/// use bulwark::{BreakerRegistry, CircuitBreakerConfig};
/// use std::sync::Arc;
///
/// let registry = BreakerRegistry::new(CircuitBreakerConfig::default())
///     .with_config("kyc", CircuitBreakerConfig::builder().failure_threshold(3).build());
///
/// let a = registry.get_or_create("kyc");
/// let b = registry.get_or_create("kyc");
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.config().failure_threshold(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
}

impl BreakerRegistry {
    /// Creates an empty registry with `default_config` for unknown names.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self { default_config, overrides: HashMap::new(), breakers: Arc::default() }
    }

    /// Creates a registry from a configuration document.
    ///
    /// Every dependency with a `circuit_breaker` section gets its own
    /// configuration; all others use the document's default.
    pub fn from_config(config: &ResilienceConfig) -> Result<Self> {
        let mut registry = Self::new(config.circuit_breaker.to_config()?);
        for name in config.dependencies.keys() {
            let breaker_config = config.breaker_config(name)?;
            registry.overrides.insert(name.clone(), breaker_config);
        }
        Ok(registry)
    }

    /// Registers a configuration for `name`.
    ///
    /// Only affects breakers created after this call.
    #[must_use]
    pub fn with_config(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Returns the breaker for `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let config = self.overrides.get(name).unwrap_or(&self.default_config).clone();
            tracing::debug!(breaker = name, "creating circuit breaker");
            Arc::new(CircuitBreaker::new(name, config))
        });
        Arc::clone(breaker)
    }

    /// Returns the breaker for `name`, creating it with `config` if needed.
    ///
    /// Fails with a configuration error when a breaker for `name` already
    /// exists under a different configuration.
    pub fn get_or_create_with(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>> {
        let breaker = {
            let mut breakers = self.breakers.write();
            Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
                tracing::debug!(breaker = name, "creating circuit breaker");
                Arc::new(CircuitBreaker::new(name, config.clone()))
            }))
        };

        if *breaker.config() != config {
            return Err(Error::configuration(format!(
                "circuit breaker '{name}' already exists with a different configuration"
            )));
        }
        Ok(breaker)
    }

    /// Returns the breaker for `name` if it has been created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Returns the names of all created breakers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns statistics for every created breaker, sorted by name.
    pub fn stats(&self) -> Vec<CircuitStats> {
        let breakers: Vec<_> = self.breakers.read().values().cloned().collect();
        let mut stats: Vec<_> = breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Forces every breaker closed.
    pub fn reset_all(&self) {
        let breakers: Vec<_> = self.breakers.read().values().cloned().collect();
        for breaker in breakers {
            breaker.reset();
        }
    }
}
