//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The workspace root is missing or holds nothing to migrate.
    #[error("Invalid workspace: {0}")]
    InvalidWorkspace(String),

    /// A version-like name that does not follow the version convention.
    #[error("Invalid version '{0}': expected v<major>.<minor> or v<major>.<minor>.<revision>")]
    InvalidVersion(String),

    /// A script could not be read during catalog discovery.
    #[error("Failed to read script '{}': {message}", .path.display())]
    ScriptDiscovery {
        /// Script path.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// The ledger schema or table could not be created or is misconfigured.
    #[error("Ledger initialization failed: {0}")]
    SchemaInit(String),

    /// An applied script changed on disk after it was applied.
    #[error(
        "Script '{script}' of {version} changed after it was applied: recorded checksum {expected}, current checksum {actual}"
    )]
    DriftDetected {
        /// Version the script belongs to.
        version: String,
        /// Script identifier.
        script: String,
        /// Checksum recorded in the ledger.
        expected: String,
        /// Checksum of the file on disk.
        actual: String,
    },

    /// The target database does not exist and auto-create is off.
    #[error("Target database '{0}' does not exist; enable auto-create-database to create it")]
    TargetDatabaseMissing(String),

    /// A bulk-data file could not be imported.
    #[error("Bulk import of '{}' failed at batch {batch}, row {row}: {message}", .path.display())]
    BulkImport {
        /// Bulk-data file.
        path: PathBuf,
        /// 1-based batch index.
        batch: usize,
        /// 1-based data row index (header excluded).
        row: usize,
        /// Underlying failure.
        message: String,
    },

    /// A database call exceeded the command timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// What was running.
        operation: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The target could not be reached or the connection string is malformed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A script failed while executing.
    #[error("Script '{script}' of {version} failed: {message}")]
    ScriptExecution {
        /// Version (or global directory) the script belongs to.
        version: String,
        /// Script identifier.
        script: String,
        /// Database error message.
        message: String,
    },

    /// Database operation error without script context.
    #[error("Database error: {0}")]
    Database(String),

    /// Strict token mode found placeholders without a value.
    #[error("Unresolved tokens in '{script}': {}", .tokens.join(", "))]
    UnresolvedToken {
        /// Script identifier.
        script: String,
        /// Token names without a mapping.
        tokens: Vec<String>,
    },

    /// A version was partially applied and the run did not ask to resume.
    #[error(
        "{version} was partially applied ({applied} scripts committed); run again with resume-after-failure to continue"
    )]
    ResumeRequired {
        /// The partially applied version.
        version: String,
        /// Number of scripts already committed.
        applied: usize,
    },

    /// Invalid caller-supplied configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a ledger initialization error.
    pub fn schema_init(msg: impl Into<String>) -> Self {
        Self::SchemaInit(msg.into())
    }

    /// Create an invalid workspace error.
    pub fn invalid_workspace(msg: impl Into<String>) -> Self {
        Self::InvalidWorkspace(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a script discovery error.
    pub fn script_discovery(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ScriptDiscovery {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Attach the version and script being executed to a bare database error.
    pub fn with_script_context(self, version: &str, script: &str) -> Self {
        match self {
            Self::Database(message) => Self::ScriptExecution {
                version: version.to_string(),
                script: script.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Stable name of the error kind, used for exit reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "IoError",
            Self::InvalidWorkspace(_) => "InvalidWorkspaceError",
            Self::InvalidVersion(_) => "InvalidVersionError",
            Self::ScriptDiscovery { .. } => "ScriptDiscoveryError",
            Self::SchemaInit(_) => "SchemaInitError",
            Self::DriftDetected { .. } => "DriftDetectedError",
            Self::TargetDatabaseMissing(_) => "TargetDatabaseMissingError",
            Self::BulkImport { .. } => "BulkImportError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Connection(_) => "ConnectionError",
            Self::ScriptExecution { .. } => "ScriptExecutionError",
            Self::Database(_) => "DatabaseError",
            Self::UnresolvedToken { .. } => "UnresolvedTokenError",
            Self::ResumeRequired { .. } => "ResumeRequiredError",
            Self::InvalidConfiguration(_) => "InvalidConfigurationError",
        }
    }

    /// Whether this error is a failure of a single script, which the engine
    /// records in the ledger before aborting.
    pub fn is_script_failure(&self) -> bool {
        matches!(
            self,
            Self::ScriptExecution { .. }
                | Self::BulkImport { .. }
                | Self::Timeout { .. }
                | Self::Database(_)
                | Self::UnresolvedToken { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::TargetDatabaseMissing("inventory".to_string());
        assert!(err.to_string().contains("inventory"));
    }

    #[test]
    fn test_drift_display() {
        let err = MigrationError::DriftDetected {
            version: "v0.01".to_string(),
            script: "01_tables.sql".to_string(),
            expected: "abc".to_string(),
            actual: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("v0.01"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_unresolved_token_display() {
        let err = MigrationError::UnresolvedToken {
            script: "01.sql".to_string(),
            tokens: vec!["owner".to_string(), "env".to_string()],
        };
        assert!(err.to_string().ends_with("owner, env"));
    }

    #[test]
    fn test_with_script_context() {
        let err = MigrationError::database("syntax error at or near \"TABLE\"")
            .with_script_context("v0.02", "02_alter.sql");
        match err {
            MigrationError::ScriptExecution {
                version,
                script,
                message,
            } => {
                assert_eq!(version, "v0.02");
                assert_eq!(script, "02_alter.sql");
                assert!(message.contains("syntax error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let timeout = MigrationError::Timeout {
            operation: "execute".to_string(),
            timeout_ms: 10,
        }
        .with_script_context("v0.02", "02_alter.sql");
        assert_eq!(timeout.kind(), "TimeoutError");
    }

    #[test]
    fn test_is_script_failure() {
        assert!(MigrationError::database("boom").is_script_failure());
        assert!(
            MigrationError::Timeout {
                operation: "execute".to_string(),
                timeout_ms: 1
            }
            .is_script_failure()
        );
        assert!(!MigrationError::connection("refused").is_script_failure());
        assert!(
            !MigrationError::DriftDetected {
                version: "v0.01".to_string(),
                script: "a.sql".to_string(),
                expected: "a".to_string(),
                actual: "b".to_string(),
            }
            .is_script_failure()
        );
    }
}
