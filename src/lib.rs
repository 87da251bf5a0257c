//! # sqlx-deadlock-retry
//!
//! Atomic batch transactions for SQLx with serialized deadlock retry.
//!
//! ## Features
//!
//! - **Ordered Batches**: Literal SQL and prepared statements interleaved in one all-or-nothing [`Transaction`]
//! - **Deadlock Retry**: Transactions aborted with `ER_LOCK_DEADLOCK` are resubmitted unchanged
//! - **Serialized Retriers**: A process-wide gate lets only one deadlocked transaction retry at a time
//! - **Bounded**: Retrying stops after a wall-clock ceiling (60 seconds by default)
//! - **Non-blocking Results**: [`TransactionCallback`] hands the outcome of a background
//!   transaction to a callback when polled, never blocking the poller
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["mysql", "runtime-tokio"] }
//! sqlx-deadlock-retry = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Executing a Batch
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlx::MySqlPool;
//! use sqlx_deadlock_retry::{execute_with_retry, PreparedStatement, Transaction};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let mut conn = pool.acquire().await?;
//!
//! let mut tx = Transaction::new();
//! tx.append("INSERT INTO users (id, name) VALUES (1, 'Alice')");
//! tx.append_prepared_statement(
//!     PreparedStatement::new("INSERT INTO profiles (user_id, bio) VALUES (?, ?)")
//!         .bind(1_i64)
//!         .bind("Software Developer"),
//! );
//!
//! // Both statements commit together, or neither does
//! let committed = execute_with_retry(&mut *conn, Arc::new(tx)).await;
//! println!("committed: {}", committed);
//! # Ok(())
//! # }
//! ```
//!
//! ### Polling a Background Transaction
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sqlx::MySqlPool;
//! use sqlx_deadlock_retry::{CallbackQueue, Transaction, TransactionCallback, TransactionExecutor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let pool = MySqlPool::connect("mysql://localhost/test").await?;
//! let mut tx = Transaction::new();
//! tx.append("UPDATE characters SET gold = gold + 10 WHERE guid = 42");
//!
//! let future = TransactionExecutor::default().execute_async(pool.acquire().await?, Arc::new(tx));
//!
//! let mut queue = CallbackQueue::new();
//! queue.add(TransactionCallback::new(future, |committed| {
//!     println!("gold saved: {}", committed);
//! }));
//!
//! // Somewhere in the update loop
//! while !queue.is_empty() {
//!     queue.process_ready_callbacks();
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Transaction**: Collects operations in append order and owns them until cleaned up
//! 2. **First Attempt**: Runs without any locking beyond the connection itself
//! 3. **Deadlock**: The executor takes the process-wide gate and retries the same transaction
//! 4. **Failure**: Any other error, or the ceiling passing, cleans up the transaction and yields `false`
//! 5. **Delivery**: [`TransactionCallback::invoke_if_ready`] runs the callback once the outcome exists
//!
//! ## Limitations
//!
//! - Currently only MySQL connections are provided (other engines can implement [`TransactionConnection`])
//! - No backoff between retries: the gate itself is the throttle
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod callback;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use callback::{CallbackQueue, TransactionCallback, TransactionFuture};
pub use config::{ExecutorConfig, DEADLOCK_MAX_RETRY_TIME};
pub use connection::TransactionConnection;
pub use error::{Error, Result, ER_LOCK_DEADLOCK};
pub use executor::{execute_with_retry, TransactionExecutor};
pub use transaction::{Operation, Param, PreparedStatement, Transaction};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::callback::{CallbackQueue, TransactionCallback};
    pub use crate::connection::TransactionConnection;
    pub use crate::error::{Error, Result};
    pub use crate::executor::{execute_with_retry, TransactionExecutor};
    pub use crate::transaction::{PreparedStatement, Transaction};
}
