use parking_lot::Mutex;

/// A value bound to a [`PreparedStatement`] placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

macro_rules! impl_param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::$variant(value.into())
                }
            }
        )*
    };
}

impl_param_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// A parameterized statement with its values already bound, in placeholder order.
///
/// # Examples
///
/// ```
/// use sqlx_deadlock_retry::{Param, PreparedStatement};
///
/// let stmt = PreparedStatement::new("UPDATE users SET name = ? WHERE id = ?")
///     .bind("Alice")
///     .bind(42_i64);
///
/// assert_eq!(stmt.params(), &[Param::Text("Alice".into()), Param::Int(42)]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    sql: String,
    params: Vec<Param>,
}

impl PreparedStatement {
    /// Creates a statement with no bound values.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next placeholder.
    pub fn bind(mut self, value: impl Into<Param>) -> Self {
        self.params.push(value.into());
        self
    }

    /// SQL text with its placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values, in placeholder order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// One write operation of a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Literal SQL text, sent as-is
    Sql(String),
    /// Parameterized statement owned by the transaction
    Prepared(PreparedStatement),
}

#[derive(Debug, Default)]
struct TransactionState {
    operations: Vec<Operation>,
    cleaned_up: bool,
}

/// An ordered, all-or-nothing batch of write operations.
///
/// Operations run in the order they were appended, literal and prepared
/// statements interleaved. The batch is built through `&mut self` and then
/// shared (usually as `Arc<Transaction>`) with the executor, which may submit
/// the same instance several times while retrying a deadlock.
///
/// Once [`cleanup`](Transaction::cleanup) has run, the transaction is empty
/// for good.
///
/// # Examples
///
/// ```
/// use sqlx_deadlock_retry::{Operation, PreparedStatement, Transaction};
///
/// let mut tx = Transaction::new();
/// tx.append("INSERT INTO users (name) VALUES ('Alice')");
/// tx.append_prepared_statement(
///     PreparedStatement::new("UPDATE counters SET n = n + ? WHERE id = 1").bind(1_i64),
/// );
///
/// assert_eq!(tx.len(), 2);
/// assert!(matches!(tx.operations()[0], Operation::Sql(_)));
///
/// tx.cleanup();
/// assert!(tx.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Transaction {
    state: Mutex<TransactionState>,
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a literal SQL statement.
    ///
    /// # Panics
    ///
    /// Panics if `sql` is empty.
    pub fn append(&mut self, sql: impl Into<String>) {
        let sql = sql.into();
        assert!(!sql.is_empty(), "cannot append an empty SQL statement");
        self.state.get_mut().operations.push(Operation::Sql(sql));
    }

    /// Appends a prepared statement, taking ownership of it.
    pub fn append_prepared_statement(&mut self, stmt: PreparedStatement) {
        self.state.get_mut().operations.push(Operation::Prepared(stmt));
    }

    /// Drops every operation and marks the transaction as cleaned up.
    ///
    /// Idempotent. Runs automatically on drop.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        if state.cleaned_up {
            return;
        }

        state.operations.clear();
        state.cleaned_up = true;
    }

    /// Snapshot of the operations in execution order.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().operations.clone()
    }

    /// Number of operations still held.
    pub fn len(&self) -> usize {
        self.state.lock().operations.len()
    }

    /// Whether no operations are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`cleanup`](Transaction::cleanup) has run.
    pub fn is_cleaned_up(&self) -> bool {
        self.state.lock().cleaned_up
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.cleanup();
    }
}
