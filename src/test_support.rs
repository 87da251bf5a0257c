//! Scripted connection used by the unit tests.

use crate::connection::TransactionConnection;
use crate::error::{Error, Result};
use crate::transaction::{Operation, Transaction};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks how many retries are in flight at once across connections.
#[derive(Debug, Default)]
pub(crate) struct RetryProbe {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl RetryProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Answers each attempt with the next scripted status code (0 = success),
/// then keeps answering `then` once the script runs out.
pub(crate) struct ScriptedConnection {
    script: VecDeque<u16>,
    then: u16,
    delay: Duration,
    attempts: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Vec<Vec<Operation>>>>,
    probe: Option<Arc<RetryProbe>>,
}

impl ScriptedConnection {
    pub(crate) fn scripted(script: impl IntoIterator<Item = u16>, then: u16) -> Self {
        Self {
            script: script.into_iter().collect(),
            then,
            delay: Duration::ZERO,
            attempts: Arc::new(AtomicUsize::new(0)),
            submitted: Arc::new(Mutex::new(Vec::new())),
            probe: None,
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::scripted([], 0)
    }

    pub(crate) fn failing_with(code: u16) -> Self {
        Self::scripted([], code)
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every attempt after the first one is reported to `probe`.
    pub(crate) fn with_probe(mut self, probe: Arc<RetryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn attempt_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }

    pub(crate) fn submitted(&self) -> Vec<Vec<Operation>> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl TransactionConnection for ScriptedConnection {
    async fn execute_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().push(transaction.operations());

        let probe = self.probe.as_ref().filter(|_| attempt > 1);
        if let Some(probe) = probe {
            probe.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(probe) = probe {
            probe.leave();
        }

        match self.script.pop_front().unwrap_or(self.then) {
            0 => Ok(()),
            code => Err(Error::Engine(code)),
        }
    }
}
