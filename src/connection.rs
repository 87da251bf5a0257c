use crate::error::{Error, Result};
use crate::transaction::{Operation, Param, PreparedStatement, Transaction};
use async_trait::async_trait;
use sqlx::mysql::MySqlArguments;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Connection, Executor, MySql, MySqlConnection};

/// A connection able to apply a whole [`Transaction`] atomically.
///
/// `Ok(())` means every operation was committed. Any `Err` means nothing was
/// applied; [`Error::is_deadlock`] tells whether the engine aborted the batch to
/// break a lock cycle, in which case resubmitting the same transaction is safe.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::{Connection, MySqlConnection};
/// use sqlx_deadlock_retry::{Transaction, TransactionConnection};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = MySqlConnection::connect("mysql://localhost/test").await?;
///
/// let mut tx = Transaction::new();
/// tx.append("INSERT INTO users (name) VALUES ('Alice')");
///
/// conn.execute_transaction(&tx).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TransactionConnection: Send {
    /// Executes every operation of `transaction` in order, inside a single database transaction.
    async fn execute_transaction(&mut self, transaction: &Transaction) -> Result<()>;
}

#[async_trait]
impl TransactionConnection for MySqlConnection {
    async fn execute_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let operations = transaction.operations();
        if operations.is_empty() {
            return Err(Error::EmptyTransaction);
        }

        // Rolled back on drop if any statement fails
        let mut tx = self.begin().await?;

        for operation in &operations {
            match operation {
                Operation::Sql(sql) => {
                    tx.execute(sqlx::raw_sql(sql)).await?;
                }
                Operation::Prepared(stmt) => {
                    tx.execute(bind_params(stmt)).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionConnection for PoolConnection<MySql> {
    async fn execute_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let conn: &mut MySqlConnection = self;
        conn.execute_transaction(transaction).await
    }
}

#[async_trait]
impl<'a, C> TransactionConnection for &'a mut C
where
    C: TransactionConnection + ?Sized,
{
    async fn execute_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        (**self).execute_transaction(transaction).await
    }
}

fn bind_params(stmt: &PreparedStatement) -> Query<'_, MySql, MySqlArguments> {
    stmt.params()
        .iter()
        .fold(sqlx::query(stmt.sql()), |query, param| match param {
            Param::Null => query.bind(None::<String>),
            Param::Bool(v) => query.bind(*v),
            Param::Int(v) => query.bind(*v),
            Param::UInt(v) => query.bind(*v),
            Param::Float(v) => query.bind(*v),
            Param::Text(v) => query.bind(v.as_str()),
            Param::Bytes(v) => query.bind(v.as_slice()),
        })
}
