//! The MySQL data service.

use async_trait::async_trait;
use tracing::info;

use migrata_core::{
    BulkImportService, DataService, LedgerStatements, MigrateResult, MigrationError, Platform,
    TextRow,
};

use crate::config::MysqlConfig;
use crate::connection::MysqlConnection;

const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS {{LEDGER_SCHEMA}}";

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS {{LEDGER_TABLE}} (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    version VARCHAR(190) NOT NULL,
    script VARCHAR(512) NOT NULL,
    checksum VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL,
    applied_on DATETIME(6) NOT NULL,
    applied_by_user VARCHAR(128) NOT NULL,
    applied_by_tool VARCHAR(64) NOT NULL,
    applied_by_tool_version VARCHAR(32) NOT NULL,
    duration_ms BIGINT NOT NULL,
    error_message TEXT NULL
) ENGINE=InnoDB";

const LEDGER_EXISTS: &str = "SELECT 1 FROM information_schema.tables \
    WHERE table_schema = COALESCE({{LEDGER_SCHEMA_NAME}}, DATABASE()) \
    AND table_name = {{LEDGER_TABLE_NAME}}";

const SELECT_LEDGER: &str = "SELECT version, script, checksum, status, applied_on, \
    applied_by_user, applied_by_tool, applied_by_tool_version, duration_ms, error_message \
    FROM {{LEDGER_TABLE}} ORDER BY id";

const DELETE_LEDGER_ROW: &str =
    "DELETE FROM {{LEDGER_TABLE}} WHERE version = {{VERSION}} AND script = {{SCRIPT}}";

const INSERT_LEDGER_ROW: &str = "INSERT INTO {{LEDGER_TABLE}} \
    (version, script, checksum, status, applied_on, applied_by_user, applied_by_tool, \
    applied_by_tool_version, duration_ms, error_message) \
    VALUES ({{VERSION}}, {{SCRIPT}}, {{CHECKSUM}}, {{STATUS}}, {{APPLIED_ON}}, \
    COALESCE({{APPLIED_BY_USER}}, CURRENT_USER()), {{APPLIED_BY_TOOL}}, \
    {{APPLIED_BY_TOOL_VERSION}}, {{DURATION_MS}}, {{ERROR_MESSAGE}})";

/// Data service for MySQL and MariaDB.
///
/// MySQL commits DDL implicitly, so the engine warns that a failed
/// version may leave partial changes behind.
#[derive(Debug, Default)]
pub struct MysqlDataService {
    config: Option<MysqlConfig>,
    server: Option<MysqlConnection>,
    target: Option<MysqlConnection>,
}

impl MysqlDataService {
    /// Create an unconnected service.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration, once connected.
    pub fn config(&self) -> Option<&MysqlConfig> {
        self.config.as_ref()
    }

    fn require_config(&self) -> MigrateResult<&MysqlConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| MigrationError::connection("the MySQL data service is not connected"))
    }

    fn server(&mut self) -> MigrateResult<&mut MysqlConnection> {
        self.server
            .as_mut()
            .ok_or_else(|| MigrationError::connection("the MySQL data service is not connected"))
    }

    async fn target(&mut self) -> MigrateResult<&mut MysqlConnection> {
        if self.target.is_none() {
            let config = self.require_config()?;
            let conn = MysqlConnection::connect(config, Some(&config.database)).await?;
            self.target = Some(conn);
        }
        self.target
            .as_mut()
            .ok_or_else(|| MigrationError::connection("MySQL connection unavailable"))
    }
}

#[async_trait]
impl DataService for MysqlDataService {
    fn platform(&self) -> Platform {
        Platform::MySql
    }

    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    fn is_transactional_ddl_supported(&self) -> bool {
        false
    }

    fn ledger_statements(&self) -> LedgerStatements {
        LedgerStatements {
            create_schema: Some(CREATE_SCHEMA),
            create_table: CREATE_LEDGER,
            table_exists: LEDGER_EXISTS,
            select_records: SELECT_LEDGER,
            delete_record: DELETE_LEDGER_ROW,
            insert_record: INSERT_LEDGER_ROW,
        }
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn database_name(&self) -> String {
        self.config
            .as_ref()
            .map(|c| c.database.clone())
            .unwrap_or_default()
    }

    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()> {
        let config = MysqlConfig::from_connection_string(connection_string)?;
        let server = MysqlConnection::connect(&config, None).await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to MySQL"
        );
        for previous in [self.server.take(), self.target.take()].into_iter().flatten() {
            previous.close().await?;
        }
        self.config = Some(config);
        self.server = Some(server);
        Ok(())
    }

    async fn database_exists(&mut self) -> MigrateResult<bool> {
        let sql = format!(
            "SELECT 1 FROM information_schema.schemata WHERE schema_name = {}",
            self.quote_literal(&self.require_config()?.database)
        );
        Ok(!self.server()?.query_text(&sql).await?.is_empty())
    }

    async fn create_database(&mut self) -> MigrateResult<()> {
        let name = self.require_config()?.database.clone();
        let sql = format!("CREATE DATABASE {}", self.quote_identifier(&name));
        self.server()?.execute(&sql).await?;
        info!(database = %name, "Created MySQL database");
        Ok(())
    }

    async fn begin_transaction(&mut self) -> MigrateResult<()> {
        self.execute("START TRANSACTION").await
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.execute("COMMIT").await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.execute("ROLLBACK").await
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(self.target().await?.execute(sql).await?)
    }

    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>> {
        Ok(self.target().await?.query_text(sql).await?)
    }
}

impl BulkImportService for MysqlDataService {}
