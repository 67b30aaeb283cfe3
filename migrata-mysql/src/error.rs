//! Error types for MySQL operations.

use migrata_core::MigrationError;
use thiserror::Error;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Error type for MySQL operations.
#[derive(Error, Debug)]
pub enum MysqlError {
    /// MySQL driver error.
    #[error("mysql error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::Connection(_) => true,
            Self::Mysql(e) => matches!(e, mysql_async::Error::Io(_) | mysql_async::Error::Url(_)),
        }
    }
}

impl From<MysqlError> for MigrationError {
    fn from(err: MysqlError) -> Self {
        if err.is_connection_error() {
            MigrationError::connection(err.to_string())
        } else {
            MigrationError::database(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MysqlError::config("invalid URL");
        assert_eq!(err.to_string(), "configuration error: invalid URL");

        let err = MysqlError::connection("connection refused");
        assert_eq!(err.to_string(), "connection error: connection refused");
    }

    #[test]
    fn test_into_migration_error() {
        let err: MigrationError = MysqlError::config("bad port").into();
        assert_eq!(err.kind(), "ConnectionError");
    }
}
