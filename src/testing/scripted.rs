//! Scripted operations for exercising the resilience primitives.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone)]
enum Step<T> {
    Succeed(T),
    Fail(ErrorKind, String),
}

impl<T> Step<T> {
    fn into_result(self) -> Result<T, Error> {
        match self {
            Step::Succeed(value) => Ok(value),
            Step::Fail(kind, message) => Err(Error::new(kind, message)),
        }
    }
}

/// An operation whose outcomes follow a fixed script.
///
/// Each call takes the next step of the script; once the script is used up,
/// the last step repeats. Every call is counted when it is made, before its
/// future is polled, so tests can assert exactly how often a primitive
/// invoked the operation.
///
/// Clones share the script and the call count.
///
/// ## Example
///
/// ```rust
/// use bulwark::{Error, ErrorKind, RetryPolicy, retry_with_backoff, testing::ScriptedOperation};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let op = ScriptedOperation::new()
///     .fail_times(2, ErrorKind::Connection, "network unreachable")
///     .succeed("0xabc");
///
/// let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(1));
/// let tx = retry_with_backoff(|| op.call(), &policy).await?;
///
/// assert_eq!(tx, "0xabc");
/// assert_eq!(op.calls(), 3);
/// # Ok::<(), Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedOperation<T> {
    script: Arc<Mutex<VecDeque<Step<T>>>>,
    last: Arc<Mutex<Option<Step<T>>>>,
    calls: Arc<AtomicU32>,
    latency: Option<Duration>,
}

impl<T> Default for ScriptedOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScriptedOperation<T> {
    /// Creates an operation with an empty script.
    ///
    /// Calling it before adding a step fails with an internal error.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicU32::new(0)),
            latency: None,
        }
    }

    /// Creates an operation that always succeeds with `value`.
    pub fn succeeding(value: T) -> Self {
        Self::new().succeed(value)
    }

    /// Creates an operation that always fails.
    pub fn failing(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new().fail(kind, message)
    }

    /// Appends a successful step.
    #[must_use]
    pub fn succeed(self, value: T) -> Self {
        self.script.lock().push_back(Step::Succeed(value));
        self
    }

    /// Appends a failing step.
    #[must_use]
    pub fn fail(self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.script.lock().push_back(Step::Fail(kind, message.into()));
        self
    }

    /// Appends `times` identical failing steps.
    #[must_use]
    pub fn fail_times(self, times: u32, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        {
            let mut script = self.script.lock();
            for _ in 0..times {
                script.push_back(Step::Fail(kind, message.clone()));
            }
        }
        self
    }

    /// Makes every call take `latency` before it settles.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns how many times the operation has been called.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> ScriptedOperation<T>
where
    T: Clone + Send + 'static,
{
    /// Calls the operation, taking the next scripted step.
    pub fn call(&self) -> impl Future<Output = Result<T, Error>> + Send + use<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        let latency = self.latency;
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            step.into_result()
        }
    }

    fn next_step(&self) -> Step<T> {
        let mut last = self.last.lock();
        if let Some(step) = self.script.lock().pop_front() {
            *last = Some(step.clone());
            return step;
        }
        last.clone().unwrap_or_else(|| {
            Step::Fail(ErrorKind::Internal, "scripted operation has no steps".to_string())
        })
    }
}
