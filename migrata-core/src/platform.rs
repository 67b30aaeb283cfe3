//! The data service contract implemented once per database engine.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::ledger::LedgerStatements;

/// Supported target database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Microsoft SQL Server.
    SqlServer,
    /// PostgreSQL.
    PostgreSql,
    /// MySQL and MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Platform {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(MigrationError::invalid_configuration(format!(
                "unknown platform '{other}'"
            ))),
        }
    }
}

/// A result row with every column rendered as text.
pub type TextRow = Vec<Option<String>>;

/// Database operations the engine needs from a target engine.
///
/// Implementations hold a single connection. They connect to a maintenance
/// database first, so that [`connect`](DataService::connect) succeeds against a
/// server whose target database does not exist yet, and open the target
/// connection on first use. Timeouts are applied by the caller.
#[async_trait]
pub trait DataService: Send {
    /// The engine this service talks to.
    fn platform(&self) -> Platform;

    /// Schema the ledger lives in when none is configured.
    fn default_schema(&self) -> Option<&'static str>;

    /// Whether DDL statements take part in transactions.
    fn is_transactional_ddl_supported(&self) -> bool {
        true
    }

    /// SQL templates for the ledger table.
    fn ledger_statements(&self) -> LedgerStatements;

    /// Quote an identifier.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Split script text into batches sent one at a time.
    fn split_batches(&self, sql: &str) -> Vec<String> {
        if sql.trim().is_empty() {
            Vec::new()
        } else {
            vec![sql.to_string()]
        }
    }

    /// Name of the target database, used in messages.
    fn database_name(&self) -> String;

    /// Parse the connection string and open the maintenance connection.
    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()>;

    /// Whether the target database exists.
    async fn database_exists(&mut self) -> MigrateResult<bool>;

    /// Create the target database.
    async fn create_database(&mut self) -> MigrateResult<()>;

    /// Start a transaction on the target connection.
    async fn begin_transaction(&mut self) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> MigrateResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> MigrateResult<()>;

    /// Execute one batch without results.
    async fn execute(&mut self, sql: &str) -> MigrateResult<()>;

    /// Run a query and return its rows as text.
    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>>;
}

/// Run a database call under the command timeout.
pub async fn with_timeout<T, F>(timeout: Duration, operation: &str, call: F) -> MigrateResult<T>
where
    F: Future<Output = MigrateResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MigrationError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
