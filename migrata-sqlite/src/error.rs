//! Error types for SQLite operations.

use migrata_core::MigrationError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {}", describe(.0))]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

/// Render driver errors without the async wrapper's variant name.
fn describe(err: &tokio_rusqlite::Error) -> String {
    match err {
        tokio_rusqlite::Error::Rusqlite(e) => e.to_string(),
        other => other.to_string(),
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Config(msg) | SqliteError::Connection(msg) => {
                MigrationError::connection(msg)
            }
            SqliteError::Sqlite(tokio_rusqlite::Error::ConnectionClosed) => {
                MigrationError::connection("connection closed")
            }
            other => MigrationError::database(other.to_string()),
        }
    }
}
