use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;

/// Eventual outcome of a transaction executed elsewhere: `true` once committed.
pub type TransactionFuture = BoxFuture<'static, bool>;

type Callback = Box<dyn FnOnce(bool) + Send>;

/// Delivers the outcome of an asynchronous transaction to a callback, on demand.
///
/// Nothing happens in the background: the owner calls
/// [`invoke_if_ready`](Self::invoke_if_ready) from its own loop (a game tick,
/// a timer, a UI frame) and the callback runs on that caller, once.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use sqlx_deadlock_retry::TransactionCallback;
///
/// let committed = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&committed);
///
/// let mut callback = TransactionCallback::new(async { true }, move |ok| {
///     flag.store(ok, Ordering::SeqCst);
/// });
///
/// assert!(callback.invoke_if_ready());
/// assert!(committed.load(Ordering::SeqCst));
/// assert!(!callback.invoke_if_ready());
/// ```
pub struct TransactionCallback {
    future: Option<TransactionFuture>,
    callback: Option<Callback>,
}

impl TransactionCallback {
    pub fn new<Fut, F>(future: Fut, callback: F) -> Self
    where
        Fut: Future<Output = bool> + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        Self {
            future: Some(future.boxed()),
            callback: Some(Box::new(callback)),
        }
    }

    /// Polls the outcome without blocking and, if it is there, hands it to the callback.
    ///
    /// Returns `true` only on the call that delivered. Before the outcome is
    /// available, and on every call after delivery, it returns `false` and does
    /// nothing.
    pub fn invoke_if_ready(&mut self) -> bool {
        let Some(future) = self.future.as_mut() else {
            return false;
        };

        let Some(committed) = future.now_or_never() else {
            return false;
        };

        self.future = None;
        if let Some(callback) = self.callback.take() {
            callback(committed);
        }
        true
    }

    /// Whether the callback has already run.
    pub fn is_delivered(&self) -> bool {
        self.future.is_none()
    }
}

impl fmt::Debug for TransactionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCallback")
            .field("delivered", &self.is_delivered())
            .finish()
    }
}

/// A set of pending [`TransactionCallback`]s driven from one polling loop.
///
/// # Examples
///
/// ```
/// use sqlx_deadlock_retry::{CallbackQueue, TransactionCallback};
///
/// let mut queue = CallbackQueue::new();
/// queue.add(TransactionCallback::new(async { true }, |_| {}));
/// queue.add(TransactionCallback::new(futures::future::pending(), |_| {}));
///
/// assert_eq!(queue.process_ready_callbacks(), 1);
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CallbackQueue {
    callbacks: Vec<TransactionCallback>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: TransactionCallback) {
        self.callbacks.push(callback);
    }

    /// Polls every pending callback once and drops the ones that delivered.
    ///
    /// Returns how many callbacks ran during this call.
    pub fn process_ready_callbacks(&mut self) -> usize {
        let before = self.callbacks.len();
        self.callbacks.retain_mut(|callback| !callback.invoke_if_ready());
        before - self.callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ER_LOCK_DEADLOCK;
    use crate::test_support::ScriptedConnection;
    use crate::transaction::Transaction;
    use crate::TransactionExecutor;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl FnOnce(bool) + Send + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |committed| sink.lock().push(committed))
    }

    #[test]
    fn test_pending_result_is_not_delivered() {
        let (sender, receiver) = oneshot::channel::<bool>();
        let (calls, record) = recorder();
        let mut callback =
            TransactionCallback::new(async move { receiver.await.unwrap_or(false) }, record);

        for _ in 0..3 {
            assert!(!callback.invoke_if_ready());
        }
        assert!(calls.lock().is_empty());

        sender.send(true).unwrap();

        assert!(callback.invoke_if_ready());
        assert_eq!(*calls.lock(), vec![true]);
        assert!(callback.is_delivered());

        assert!(!callback.invoke_if_ready());
        assert!(!callback.invoke_if_ready());
        assert_eq!(*calls.lock(), vec![true]);
    }

    #[test]
    fn test_failure_outcome_is_delivered() {
        let (calls, record) = recorder();
        let mut callback = TransactionCallback::new(async { false }, record);

        assert!(callback.invoke_if_ready());
        assert_eq!(*calls.lock(), vec![false]);
    }

    #[test]
    fn test_queue_delivers_each_callback_once() {
        let (first_tx, first_rx) = oneshot::channel::<bool>();
        let (second_tx, second_rx) = oneshot::channel::<bool>();
        let (calls, record_first) = recorder();
        let sink = Arc::clone(&calls);

        let mut queue = CallbackQueue::new();
        queue.add(TransactionCallback::new(
            async move { first_rx.await.unwrap_or(false) },
            record_first,
        ));
        queue.add(TransactionCallback::new(
            async move { second_rx.await.unwrap_or(false) },
            move |committed| sink.lock().push(committed),
        ));

        assert_eq!(queue.process_ready_callbacks(), 0);
        assert_eq!(queue.len(), 2);

        second_tx.send(false).unwrap();
        assert_eq!(queue.process_ready_callbacks(), 1);
        assert_eq!(queue.len(), 1);

        first_tx.send(true).unwrap();
        assert_eq!(queue.process_ready_callbacks(), 1);
        assert!(queue.is_empty());
        assert_eq!(*calls.lock(), vec![false, true]);

        assert_eq!(queue.process_ready_callbacks(), 0);
    }

    #[test]
    fn test_dropped_sender_counts_as_failure() {
        let (sender, receiver) = oneshot::channel::<bool>();
        let (calls, record) = recorder();
        let mut callback =
            TransactionCallback::new(async move { receiver.await.unwrap_or(false) }, record);

        drop(sender);

        assert!(callback.invoke_if_ready());
        assert_eq!(*calls.lock(), vec![false]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_polls_outcome_of_executed_transaction() {
        let conn = ScriptedConnection::scripted([ER_LOCK_DEADLOCK, 0], 0)
            .with_delay(Duration::from_millis(20));
        let mut tx = Transaction::new();
        tx.append("INSERT INTO mail (id) VALUES (1)");

        let future = TransactionExecutor::default().execute_async(conn, Arc::new(tx));
        let (calls, record) = recorder();
        let mut callback = TransactionCallback::new(future, record);

        let mut polls = 0;
        while !callback.invoke_if_ready() {
            polls += 1;
            assert!(polls < 500, "transaction outcome never arrived");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(polls > 0);
        assert_eq!(*calls.lock(), vec![true]);
        assert!(!callback.invoke_if_ready());
    }
}
