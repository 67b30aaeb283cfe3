//! Error types for Microsoft SQL Server operations.

use migrata_core::MigrationError;
use thiserror::Error;

/// Result type for MSSQL operations.
pub type MssqlResult<T> = Result<T, MssqlError>;

/// Errors that can occur during MSSQL operations.
#[derive(Error, Debug)]
pub enum MssqlError {
    /// Tiberius/SQL Server error.
    #[error("sql server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MssqlError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::Connection(_) | Self::Io(_) => true,
            Self::SqlServer(e) => matches!(
                e,
                tiberius::error::Error::Io { .. }
                    | tiberius::error::Error::Tls(_)
                    | tiberius::error::Error::Routing { .. }
            ),
        }
    }
}

impl From<MssqlError> for MigrationError {
    fn from(err: MssqlError) -> Self {
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
        let err = MssqlError::config("missing database");
        assert_eq!(err.to_string(), "configuration error: missing database");
    }

    #[test]
    fn test_into_migration_error() {
        let err: MigrationError = MssqlError::connection("login failed").into();
        assert_eq!(err.kind(), "ConnectionError");
    }
}
