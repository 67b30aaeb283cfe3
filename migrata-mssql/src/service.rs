//! The SQL Server data service.

use async_trait::async_trait;
use tracing::{debug, info};

use migrata_core::{
    insert_statement, BulkImportService, BulkTarget, CsvRecord, DataService, LedgerStatements,
    MigrateResult, MigrationError, Platform, TextRow,
};

use crate::batch::split_go_batches;
use crate::config::MssqlConfig;
use crate::connection::MssqlConnection;

/// Row constructor limit of a single `INSERT ... VALUES`.
pub const MAX_VALUES_ROWS: usize = 1000;

const CREATE_SCHEMA: &str = "IF SCHEMA_ID({{LEDGER_SCHEMA_NAME}}) IS NULL \
    EXEC(N'CREATE SCHEMA ' + QUOTENAME({{LEDGER_SCHEMA_NAME}}))";

const CREATE_LEDGER: &str = "IF NOT EXISTS (SELECT 1 FROM INFORMATION_SCHEMA.TABLES \
    WHERE TABLE_SCHEMA = {{LEDGER_SCHEMA_NAME}} AND TABLE_NAME = {{LEDGER_TABLE_NAME}})
CREATE TABLE {{LEDGER_TABLE}} (
    id BIGINT IDENTITY(1,1) NOT NULL PRIMARY KEY,
    version NVARCHAR(190) NOT NULL,
    script NVARCHAR(512) NOT NULL,
    checksum NVARCHAR(64) NOT NULL,
    status NVARCHAR(16) NOT NULL,
    applied_on DATETIME2 NOT NULL,
    applied_by_user NVARCHAR(128) NOT NULL,
    applied_by_tool NVARCHAR(64) NOT NULL,
    applied_by_tool_version NVARCHAR(32) NOT NULL,
    duration_ms BIGINT NOT NULL,
    error_message NVARCHAR(MAX) NULL
)";

const LEDGER_EXISTS: &str = "SELECT 1 FROM INFORMATION_SCHEMA.TABLES \
    WHERE TABLE_SCHEMA = {{LEDGER_SCHEMA_NAME}} AND TABLE_NAME = {{LEDGER_TABLE_NAME}}";

const SELECT_LEDGER: &str = "SELECT version, script, checksum, status, applied_on, \
    applied_by_user, applied_by_tool, applied_by_tool_version, duration_ms, error_message \
    FROM {{LEDGER_TABLE}} ORDER BY id";

const DELETE_LEDGER_ROW: &str =
    "DELETE FROM {{LEDGER_TABLE}} WHERE version = {{VERSION}} AND script = {{SCRIPT}}";

const INSERT_LEDGER_ROW: &str = "INSERT INTO {{LEDGER_TABLE}} \
    (version, script, checksum, status, applied_on, applied_by_user, applied_by_tool, \
    applied_by_tool_version, duration_ms, error_message) \
    VALUES ({{VERSION}}, {{SCRIPT}}, {{CHECKSUM}}, {{STATUS}}, CAST({{APPLIED_ON}} AS DATETIME2), \
    COALESCE({{APPLIED_BY_USER}}, SUSER_SNAME()), {{APPLIED_BY_TOOL}}, \
    {{APPLIED_BY_TOOL_VERSION}}, {{DURATION_MS}}, {{ERROR_MESSAGE}})";

/// Data service for Microsoft SQL Server.
///
/// `connect` opens a connection to the maintenance database (`master` by
/// default); the target database is connected on first use.
#[derive(Debug, Default)]
pub struct MssqlDataService {
    config: Option<MssqlConfig>,
    maintenance: Option<MssqlConnection>,
    target: Option<MssqlConnection>,
}

impl MssqlDataService {
    /// Create an unconnected service.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration, once connected.
    pub fn config(&self) -> Option<&MssqlConfig> {
        self.config.as_ref()
    }

    fn require_config(&self) -> MigrateResult<&MssqlConfig> {
        self.config.as_ref().ok_or_else(|| {
            MigrationError::connection("the SQL Server data service is not connected")
        })
    }

    fn maintenance(&mut self) -> MigrateResult<&mut MssqlConnection> {
        self.maintenance.as_mut().ok_or_else(|| {
            MigrationError::connection("the SQL Server data service is not connected")
        })
    }

    async fn target(&mut self) -> MigrateResult<&mut MssqlConnection> {
        if self.target.is_none() {
            let config = self.require_config()?;
            let conn = MssqlConnection::connect(config, &config.database).await?;
            self.target = Some(conn);
        }
        self.target
            .as_mut()
            .ok_or_else(|| MigrationError::connection("SQL Server connection unavailable"))
    }
}

#[async_trait]
impl DataService for MssqlDataService {
    fn platform(&self) -> Platform {
        Platform::SqlServer
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("dbo")
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
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn split_batches(&self, sql: &str) -> Vec<String> {
        split_go_batches(sql)
    }

    fn database_name(&self) -> String {
        self.config
            .as_ref()
            .map(|c| c.database.clone())
            .unwrap_or_default()
    }

    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()> {
        let config = MssqlConfig::from_connection_string(connection_string)?;
        let maintenance = MssqlConnection::connect(&config, &config.maintenance_database).await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to SQL Server"
        );
        for previous in [self.maintenance.take(), self.target.take()]
            .into_iter()
            .flatten()
        {
            previous.close().await?;
        }
        self.config = Some(config);
        self.maintenance = Some(maintenance);
        Ok(())
    }

    async fn database_exists(&mut self) -> MigrateResult<bool> {
        let sql = format!(
            "SELECT 1 FROM sys.databases WHERE name = {}",
            self.quote_literal(&self.require_config()?.database)
        );
        Ok(!self.maintenance()?.query_text(&sql).await?.is_empty())
    }

    async fn create_database(&mut self) -> MigrateResult<()> {
        let name = self.require_config()?.database.clone();
        let sql = format!("CREATE DATABASE {}", self.quote_identifier(&name));
        self.maintenance()?.batch_execute(&sql).await?;
        info!(database = %name, "Created SQL Server database");
        Ok(())
    }

    async fn begin_transaction(&mut self) -> MigrateResult<()> {
        self.execute("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.execute("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        // A severe error may already have rolled the transaction back.
        self.execute("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(self.target().await?.batch_execute(sql).await?)
    }

    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>> {
        Ok(self.target().await?.query_text(sql).await?)
    }
}

#[async_trait]
impl BulkImportService for MssqlDataService {
    async fn insert_batch(
        &mut self,
        target: &BulkTarget,
        columns: &[String],
        rows: &[CsvRecord],
    ) -> MigrateResult<()> {
        for chunk in rows.chunks(MAX_VALUES_ROWS) {
            debug!(table = %target.table, rows = chunk.len(), "Inserting rows");
            let sql = insert_statement(&*self, target, columns, chunk);
            self.execute(&sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrata_core::{Audit, Ledger};
    use std::time::Duration;

    #[test]
    fn test_ledger_defaults_to_dbo() {
        let service = MssqlDataService::new();
        let ledger = Ledger::new(
            &service,
            None,
            None,
            Audit {
                applied_by_user: None,
                tool: "migrata".into(),
                tool_version: "0.4.0".into(),
            },
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(ledger.schema(), Some("dbo"));
        assert!(service.ledger_statements().create_table.contains("DATETIME2"));
    }

    #[test]
    fn test_quoting() {
        let service = MssqlDataService::new();
        assert_eq!(service.quote_identifier("Order]Items"), "[Order]]Items]");
        assert_eq!(service.quote_literal("Zoë's"), "N'Zoë''s'");
    }

    #[test]
    fn test_batches_split_on_go() {
        let service = MssqlDataService::new();
        let batches = service.split_batches("CREATE TABLE t (id INT)\nGO\nINSERT INTO t VALUES (1)\n");
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_insert_statement_uses_brackets() {
        let service = MssqlDataService::new();
        let target = BulkTarget {
            schema: Some("sales".into()),
            table: "region".into(),
        };
        let sql = insert_statement(
            &service,
            &target,
            &["code".to_string(), "name".to_string()],
            &[vec![Some("N".into()), None]],
        );
        assert_eq!(
            sql,
            "INSERT INTO [sales].[region] ([code], [name]) VALUES\n(N'N', NULL)"
        );
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let mut service = MssqlDataService::new();
        assert_eq!(
            service.database_exists().await.unwrap_err().kind(),
            "ConnectionError"
        );
        assert_eq!(
            service
                .connect("Server=localhost;Database=app")
                .await
                .unwrap_err()
                .kind(),
            "ConnectionError"
        );
    }
}
