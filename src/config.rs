use std::time::Duration;

/// Wall-clock ceiling for the deadlock retry loop of a single execution.
pub const DEADLOCK_MAX_RETRY_TIME: Duration = Duration::from_millis(60_000);

/// Configuration for a [`TransactionExecutor`](crate::TransactionExecutor)
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How long a deadlocked transaction keeps being retried, measured from the first retry
    deadlock_retry_ceiling: Duration,
}

impl ExecutorConfig {
    /// Create a configuration with the default retry ceiling
    pub fn new() -> Self {
        Self {
            deadlock_retry_ceiling: DEADLOCK_MAX_RETRY_TIME,
        }
    }

    /// Set the wall-clock ceiling for deadlock retries (default: 60 seconds)
    ///
    /// The ceiling is checked between attempts, so an attempt that is in flight
    /// when it passes still completes.
    pub fn with_deadlock_retry_ceiling(mut self, ceiling: Duration) -> Self {
        self.deadlock_retry_ceiling = ceiling;
        self
    }

    /// Get the deadlock retry ceiling
    pub fn deadlock_retry_ceiling(&self) -> Duration {
        self.deadlock_retry_ceiling
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}
