//! Database error definitions.

use thiserror::Error;

/// Errors surfaced by the database layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    /// The driver rejected the connect call.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Connect did not finish in time.
    #[error("Connect timed out after {0} seconds")]
    Timeout(u64),

    /// A statement failed on an established connection.
    #[error("Query failed: {0}")]
    Query(String),

    /// No usable connection is available right now.
    #[error("Database not connected")]
    NotConnected,
}

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl From<tokio_postgres::Error> for DatabaseError {
    fn from(e: tokio_postgres::Error) -> Self {
        DatabaseError::Query(e.to_string())
    }
}
