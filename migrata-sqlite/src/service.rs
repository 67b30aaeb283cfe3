//! The SQLite data service.

use async_trait::async_trait;
use tracing::info;

use migrata_core::{
    BulkImportService, DataService, LedgerStatements, MigrateResult, MigrationError, Platform,
    TextRow,
};

use crate::config::{DatabasePath, SqliteConfig};
use crate::connection::SqliteConnection;
use crate::error::SqliteError;

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS {{LEDGER_TABLE}} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version TEXT NOT NULL,
    script TEXT NOT NULL,
    checksum TEXT NOT NULL,
    status TEXT NOT NULL,
    applied_on TEXT NOT NULL,
    applied_by_user TEXT,
    applied_by_tool TEXT NOT NULL,
    applied_by_tool_version TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    error_message TEXT
)";

const LEDGER_EXISTS: &str =
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = {{LEDGER_TABLE_NAME}}";

const SELECT_LEDGER: &str = "SELECT version, script, checksum, status, applied_on, \
    applied_by_user, applied_by_tool, applied_by_tool_version, duration_ms, error_message \
    FROM {{LEDGER_TABLE}} ORDER BY id";

const DELETE_LEDGER_ROW: &str =
    "DELETE FROM {{LEDGER_TABLE}} WHERE version = {{VERSION}} AND script = {{SCRIPT}}";

const INSERT_LEDGER_ROW: &str = "INSERT INTO {{LEDGER_TABLE}} \
    (version, script, checksum, status, applied_on, applied_by_user, applied_by_tool, \
    applied_by_tool_version, duration_ms, error_message) \
    VALUES ({{VERSION}}, {{SCRIPT}}, {{CHECKSUM}}, {{STATUS}}, {{APPLIED_ON}}, \
    {{APPLIED_BY_USER}}, {{APPLIED_BY_TOOL}}, {{APPLIED_BY_TOOL_VERSION}}, \
    {{DURATION_MS}}, {{ERROR_MESSAGE}})";

/// Data service for SQLite databases.
///
/// A database file is "missing" until it exists on disk; `create_database`
/// creates it. In-memory databases always exist.
#[derive(Debug, Default)]
pub struct SqliteDataService {
    config: Option<SqliteConfig>,
    conn: Option<SqliteConnection>,
}

impl SqliteDataService {
    /// Create an unconnected service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service for an already parsed configuration.
    pub fn with_config(config: SqliteConfig) -> Self {
        Self {
            config: Some(config),
            conn: None,
        }
    }

    /// The configuration, once connected.
    pub fn config(&self) -> Option<&SqliteConfig> {
        self.config.as_ref()
    }

    fn require_config(&self) -> MigrateResult<&SqliteConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| MigrationError::connection("the SQLite data service is not connected"))
    }

    async fn connection(&mut self) -> MigrateResult<&SqliteConnection> {
        if self.conn.is_none() {
            let config = self.require_config()?;
            let conn = SqliteConnection::open(config, false).await?;
            self.conn = Some(conn);
        }
        self.conn
            .as_ref()
            .ok_or_else(|| MigrationError::connection("SQLite connection unavailable"))
    }
}

#[async_trait]
impl DataService for SqliteDataService {
    fn platform(&self) -> Platform {
        Platform::Sqlite
    }

    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    fn ledger_statements(&self) -> LedgerStatements {
        LedgerStatements {
            create_schema: None,
            create_table: CREATE_LEDGER,
            table_exists: LEDGER_EXISTS,
            select_records: SELECT_LEDGER,
            delete_record: DELETE_LEDGER_ROW,
            insert_record: INSERT_LEDGER_ROW,
        }
    }

    fn database_name(&self) -> String {
        self.config
            .as_ref()
            .map(|c| c.path.display_name())
            .unwrap_or_default()
    }

    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()> {
        let config = SqliteConfig::from_url(connection_string)?;
        info!(path = %config.path.display_name(), "Using SQLite database");
        self.config = Some(config);
        self.conn = None;
        Ok(())
    }

    async fn database_exists(&mut self) -> MigrateResult<bool> {
        if self.conn.is_some() {
            return Ok(true);
        }
        match &self.require_config()?.path {
            DatabasePath::Memory => Ok(true),
            DatabasePath::File(path) => tokio::fs::try_exists(path)
                .await
                .map_err(|e| SqliteError::from(e).into()),
        }
    }

    async fn create_database(&mut self) -> MigrateResult<()> {
        let config = self.require_config()?;
        if let DatabasePath::File(path) = &config.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(SqliteError::from)?;
            }
        }
        let conn = SqliteConnection::open(config, true).await?;
        info!(path = %config.path.display_name(), "Created SQLite database");
        self.conn = Some(conn);
        Ok(())
    }

    async fn begin_transaction(&mut self) -> MigrateResult<()> {
        self.execute("BEGIN").await
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.execute("COMMIT").await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        let conn = self.connection().await?;
        if conn.in_transaction().await? {
            conn.execute_batch("ROLLBACK").await?;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        let conn = self.connection().await?;
        conn.execute_batch(sql)
            .await
            .map_err(|e| MigrationError::database(e.to_string()))
    }

    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>> {
        let conn = self.connection().await?;
        conn.query_text(sql)
            .await
            .map_err(|e| MigrationError::database(e.to_string()))
    }
}

impl BulkImportService for SqliteDataService {}
