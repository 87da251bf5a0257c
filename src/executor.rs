use crate::callback::TransactionFuture;
use crate::config::ExecutorConfig;
use crate::connection::TransactionConnection;
use crate::transaction::Transaction;
use futures::FutureExt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, warn};

const LOG_TARGET: &str = "sql::transaction";

static DEADLOCK_GATE: OnceLock<Mutex<()>> = OnceLock::new();

/// Process-wide lock held by whoever is retrying a deadlocked transaction.
fn deadlock_gate() -> &'static Mutex<()> {
    DEADLOCK_GATE.get_or_init(|| Mutex::new(()))
}

/// Executes transactions and retries the ones the engine aborts on deadlock.
///
/// A first attempt never waits on anything but the connection. When it fails
/// with a deadlock, the executor takes a lock shared by every executor in the
/// process and resubmits the same transaction until it commits or the
/// configured ceiling passes, so at most one deadlocked transaction is being
/// retried at any time.
///
/// Every other failure is final: the transaction is cleaned up and the
/// outcome is `false`.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sqlx::MySqlPool;
/// use sqlx_deadlock_retry::{PreparedStatement, Transaction, TransactionExecutor};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let mut conn = pool.acquire().await?;
///
/// let mut tx = Transaction::new();
/// tx.append("INSERT INTO orders (id, item) VALUES (7, 'book')");
/// tx.append_prepared_statement(
///     PreparedStatement::new("UPDATE stock SET qty = qty - ? WHERE item = ?")
///         .bind(1_i64)
///         .bind("book"),
/// );
///
/// let committed = TransactionExecutor::default()
///     .execute(&mut *conn, Arc::new(tx))
///     .await;
/// assert!(committed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionExecutor {
    config: ExecutorConfig,
}

impl TransactionExecutor {
    /// Creates an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get the executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes `transaction` on `conn`, retrying on deadlock.
    ///
    /// Returns `true` once the transaction has committed. On `false`, the
    /// transaction has already been cleaned up.
    pub async fn execute<C>(&self, conn: &mut C, transaction: Arc<Transaction>) -> bool
    where
        C: TransactionConnection + ?Sized,
    {
        let error = match Self::try_execute(conn, &transaction).await {
            Ok(()) => return true,
            Err(error) => error,
        };

        if error.is_deadlock() {
            if self.retry_deadlocked(conn, &transaction).await {
                return true;
            }
        } else {
            error!(target: LOG_TARGET, %error, "SQL transaction failed");
        }

        transaction.cleanup();
        false
    }

    /// Single attempt, no retry and no cleanup.
    pub async fn try_execute<C>(conn: &mut C, transaction: &Transaction) -> crate::Result<()>
    where
        C: TransactionConnection + ?Sized,
    {
        conn.execute_transaction(transaction).await
    }

    /// Runs [`execute`](Self::execute) on a tokio task and returns its outcome as a future.
    ///
    /// The connection moves into the task and is dropped when it finishes, which
    /// hands a [`PoolConnection`](sqlx::pool::PoolConnection) back to its pool.
    /// Wrap the returned future in a [`TransactionCallback`](crate::TransactionCallback)
    /// to consume the outcome without blocking.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn execute_async<C>(&self, mut conn: C, transaction: Arc<Transaction>) -> TransactionFuture
    where
        C: TransactionConnection + 'static,
    {
        let executor = self.clone();
        let handle =
            tokio::spawn(async move { executor.execute(&mut conn, transaction).await });

        async move {
            match handle.await {
                Ok(committed) => committed,
                Err(join_error) => {
                    error!(target: LOG_TARGET, error = %join_error, "SQL transaction task did not complete");
                    false
                }
            }
        }
        .boxed()
    }

    async fn retry_deadlocked<C>(&self, conn: &mut C, transaction: &Transaction) -> bool
    where
        C: TransactionConnection + ?Sized,
    {
        let thread_id = format!("{:?}", std::thread::current().id());

        // Concurrent retriers are what keeps deadlocking, so only one at a time
        let _gate = deadlock_gate().lock().await;

        let ceiling = self.config.deadlock_retry_ceiling();
        let start = Instant::now();
        let mut loop_duration = Duration::ZERO;

        while loop_duration <= ceiling {
            match Self::try_execute(conn, transaction).await {
                Ok(()) => return true,
                Err(error) if error.is_deadlock() => {
                    warn!(
                        target: LOG_TARGET,
                        %error,
                        loop_duration_ms = loop_duration.as_millis() as u64,
                        thread_id = %thread_id,
                        "Deadlocked SQL transaction, retrying"
                    );
                }
                Err(error) => {
                    error!(
                        target: LOG_TARGET,
                        %error,
                        thread_id = %thread_id,
                        "SQL transaction failed while retrying a deadlock"
                    );
                    return false;
                }
            }
            loop_duration = start.elapsed();
        }

        error!(
            target: LOG_TARGET,
            thread_id = %thread_id,
            "Fatal deadlocked SQL transaction, it will not be retried anymore"
        );
        false
    }
}

/// Executes `transaction` with the default configuration.
///
/// Shorthand for `TransactionExecutor::default().execute(conn, transaction)`.
pub async fn execute_with_retry<C>(conn: &mut C, transaction: Arc<Transaction>) -> bool
where
    C: TransactionConnection + ?Sized,
{
    TransactionExecutor::default().execute(conn, transaction).await
}
