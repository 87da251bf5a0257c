use sqlx::mysql::MySqlDatabaseError;

/// MySQL error number for "Deadlock found when trying to get lock".
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// Error types for transaction execution
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Engine status code reported by a connection that does not go through SQLx
    #[error("Engine error code {0}")]
    Engine(u16),

    /// The transaction holds no operations (never filled, or already cleaned up)
    #[error("Transaction has no operations")]
    EmptyTransaction,
}

impl Error {
    /// Returns the engine error number, if the error carries one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number),
            Error::Engine(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether the engine aborted the transaction to break a lock-ordering deadlock.
    ///
    /// This is the only failure that is safe to retry unchanged.
    pub fn is_deadlock(&self) -> bool {
        self.code() == Some(ER_LOCK_DEADLOCK)
    }
}

/// Result type alias for transaction operations
pub type Result<T> = std::result::Result<T, Error>;
