//! Metrics collection for guarded calls.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Configuration for metrics collection.
///
/// ## Example
///
/// ```rust
/// use bulwark::monitoring::MetricsConfig;
/// use std::time::Duration;
///
/// let config = MetricsConfig::builder()
///     .slow_call_threshold(Duration::from_millis(500))
///     .per_operation(true)
///     .build();
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct MetricsConfig {
    /// Calls slower than this are logged at `warn` level.
    pub slow_call_threshold: Option<Duration>,
    /// Whether to keep separate counters per operation name.
    #[builder(default = true)]
    pub per_operation: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::builder().slow_call_threshold(Duration::from_secs(5)).build()
    }
}

/// A metrics collector shared by every guarded call site.
///
/// Cloning is cheap; clones record into the same counters.
///
/// ## Example
///
/// ```rust
/// use bulwark::monitoring::Metrics;
/// use std::time::Duration;
///
/// let metrics = Metrics::default();
/// metrics.record_call("payments", Duration::from_millis(120), true);
/// metrics.record_retries("payments", 2);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.calls_total, 1);
/// assert_eq!(snapshot.operations["payments"].retries, 2);
/// ```
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    config: MetricsConfig,
    totals: CallCounters,
    operations: RwLock<HashMap<String, Arc<CallCounters>>>,
    custom_counters: RwLock<HashMap<String, AtomicU64>>,
}

#[derive(Debug, Default)]
struct CallCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    rejections: AtomicU64,
    latency_sum_ns: AtomicU64,
    latency_max_ns: AtomicU64,
}

impl CallCounters {
    fn snapshot(&self) -> OperationSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let sum = self.latency_sum_ns.load(Ordering::Relaxed);
        OperationSnapshot {
            calls,
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            latency_avg_ns: if calls > 0 { sum / calls } else { 0 },
            latency_max_ns: self.latency_max_ns.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.calls,
            &self.failures,
            &self.retries,
            &self.timeouts,
            &self.rejections,
            &self.latency_sum_ns,
            &self.latency_max_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Metrics {
    /// Creates a new metrics collector with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                config,
                totals: CallCounters::default(),
                operations: RwLock::new(HashMap::new()),
                custom_counters: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the metrics configuration.
    pub fn config(&self) -> &MetricsConfig {
        &self.inner.config
    }

    /// Records a finished call to `operation`.
    pub fn record_call(&self, operation: &str, latency: Duration, success: bool) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.update(operation, |c| {
            c.calls.fetch_add(1, Ordering::Relaxed);
            if !success {
                c.failures.fetch_add(1, Ordering::Relaxed);
            }
            c.latency_sum_ns.fetch_add(nanos, Ordering::Relaxed);
            c.latency_max_ns.fetch_max(nanos, Ordering::Relaxed);
        });

        if let Some(threshold) = self.inner.config.slow_call_threshold
            && latency > threshold
        {
            tracing::warn!(
                operation,
                elapsed_ms = latency.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                success,
                "slow operation"
            );
        }
    }

    /// Records `count` retries of `operation`.
    pub fn record_retries(&self, operation: &str, count: u64) {
        if count > 0 {
            self.update(operation, |c| {
                c.retries.fetch_add(count, Ordering::Relaxed);
            });
        }
    }

    /// Records an attempt of `operation` that lost its timeout race.
    pub fn record_timeout(&self, operation: &str) {
        self.update(operation, |c| {
            c.timeouts.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Records a call to `operation` rejected by an open circuit.
    pub fn record_rejection(&self, operation: &str) {
        self.update(operation, |c| {
            c.rejections.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Returns a custom counter, creating it if it doesn't exist.
    pub fn counter(&self, name: &str) -> Counter {
        if !self.inner.custom_counters.read().contains_key(name) {
            self.inner
                .custom_counters
                .write()
                .entry(name.to_string())
                .or_insert_with(|| AtomicU64::new(0));
        }
        Counter { name: name.to_string(), metrics: self.clone() }
    }

    /// Returns a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = self.inner.totals.snapshot();
        let operations = self
            .inner
            .operations
            .read()
            .iter()
            .map(|(name, counters)| (name.clone(), counters.snapshot()))
            .collect();
        let counters = self
            .inner
            .custom_counters
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            calls_total: totals.calls,
            calls_failed: totals.failures,
            retries_total: totals.retries,
            timeouts_total: totals.timeouts,
            circuit_rejections: totals.rejections,
            latency_avg_ns: totals.latency_avg_ns,
            latency_max_ns: totals.latency_max_ns,
            operations,
            counters,
        }
    }

    /// Resets all metrics to zero.
    pub fn reset(&self) {
        self.inner.totals.reset();
        self.inner.operations.write().clear();
        for counter in self.inner.custom_counters.read().values() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn update(&self, operation: &str, apply: impl Fn(&CallCounters)) {
        apply(&self.inner.totals);
        if !self.inner.config.per_operation {
            return;
        }

        let existing = self.inner.operations.read().get(operation).cloned();
        let counters = match existing {
            Some(counters) => counters,
            None => Arc::clone(
                self.inner.operations.write().entry(operation.to_string()).or_default(),
            ),
        };
        apply(&counters);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

/// Counters for one operation name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    /// Finished calls.
    pub calls: u64,
    /// Calls that ended in an error.
    pub failures: u64,
    /// Retries performed across all calls.
    pub retries: u64,
    /// Attempts that lost their timeout race.
    pub timeouts: u64,
    /// Calls rejected by an open circuit.
    pub rejections: u64,
    /// Average call latency in nanoseconds.
    pub latency_avg_ns: u64,
    /// Slowest call latency in nanoseconds.
    pub latency_max_ns: u64,
}

impl OperationSnapshot {
    /// Returns the failure rate (0.0 - 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.failures as f64 / self.calls as f64
    }
}

/// A snapshot of metrics values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total finished calls.
    pub calls_total: u64,
    /// Calls that ended in an error.
    pub calls_failed: u64,
    /// Total retries.
    pub retries_total: u64,
    /// Attempts that lost their timeout race.
    pub timeouts_total: u64,
    /// Calls rejected by an open circuit.
    pub circuit_rejections: u64,
    /// Average call latency in nanoseconds.
    pub latency_avg_ns: u64,
    /// Slowest call latency in nanoseconds.
    pub latency_max_ns: u64,
    /// Per-operation counters, keyed by operation name.
    pub operations: BTreeMap<String, OperationSnapshot>,
    /// Custom counter values.
    pub counters: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Returns the average latency as a Duration.
    pub fn latency_avg(&self) -> Duration {
        Duration::from_nanos(self.latency_avg_ns)
    }

    /// Returns the failure rate (0.0 - 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.calls_total == 0 {
            return 0.0;
        }
        self.calls_failed as f64 / self.calls_total as f64
    }
}

/// A counter metric that can only be incremented.
#[derive(Debug, Clone)]
pub struct Counter {
    name: String,
    metrics: Metrics,
}

impl Counter {
    /// Returns the counter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increments the counter by 1.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds the given value to the counter.
    pub fn add(&self, value: u64) {
        let counters = self.metrics.inner.custom_counters.read();
        if let Some(counter) = counters.get(&self.name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> u64 {
        let counters = self.metrics.inner.custom_counters.read();
        counters.get(&self.name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}
