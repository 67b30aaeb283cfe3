//! The PostgreSQL data service.

use async_trait::async_trait;
use tracing::info;

use migrata_core::{
    BulkImportService, DataService, LedgerStatements, MigrateResult, MigrationError, Platform,
    TextRow,
};

use crate::config::PgConfig;
use crate::connection::PgConnection;

const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS {{LEDGER_SCHEMA}}";

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS {{LEDGER_TABLE}} (
    id BIGSERIAL PRIMARY KEY,
    version VARCHAR(190) NOT NULL,
    script VARCHAR(512) NOT NULL,
    checksum VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL,
    applied_on TIMESTAMP NOT NULL,
    applied_by_user VARCHAR(128) NOT NULL,
    applied_by_tool VARCHAR(64) NOT NULL,
    applied_by_tool_version VARCHAR(32) NOT NULL,
    duration_ms BIGINT NOT NULL,
    error_message TEXT
)";

const LEDGER_EXISTS: &str = "SELECT 1 FROM information_schema.tables \
    WHERE table_schema = {{LEDGER_SCHEMA_NAME}} AND table_name = {{LEDGER_TABLE_NAME}}";

const SELECT_LEDGER: &str = "SELECT version, script, checksum, status, applied_on, \
    applied_by_user, applied_by_tool, applied_by_tool_version, duration_ms, error_message \
    FROM {{LEDGER_TABLE}} ORDER BY id";

const DELETE_LEDGER_ROW: &str =
    "DELETE FROM {{LEDGER_TABLE}} WHERE version = {{VERSION}} AND script = {{SCRIPT}}";

const INSERT_LEDGER_ROW: &str = "INSERT INTO {{LEDGER_TABLE}} \
    (version, script, checksum, status, applied_on, applied_by_user, applied_by_tool, \
    applied_by_tool_version, duration_ms, error_message) \
    VALUES ({{VERSION}}, {{SCRIPT}}, {{CHECKSUM}}, {{STATUS}}, CAST({{APPLIED_ON}} AS TIMESTAMP), \
    COALESCE({{APPLIED_BY_USER}}, current_user), {{APPLIED_BY_TOOL}}, {{APPLIED_BY_TOOL_VERSION}}, \
    {{DURATION_MS}}, {{ERROR_MESSAGE}})";

/// Data service for PostgreSQL.
///
/// `connect` opens a connection to the maintenance database; the target
/// database is connected on first use, once it is known to exist. A target
/// connection lost inside a transaction is an error, never a reconnect.
#[derive(Debug, Default)]
pub struct PgDataService {
    config: Option<PgConfig>,
    maintenance: Option<PgConnection>,
    target: Option<PgConnection>,
    in_transaction: bool,
}

impl PgDataService {
    /// Create an unconnected service.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration, once connected.
    pub fn config(&self) -> Option<&PgConfig> {
        self.config.as_ref()
    }

    fn require_config(&self) -> MigrateResult<&PgConfig> {
        self.config.as_ref().ok_or_else(|| {
            MigrationError::connection("the PostgreSQL data service is not connected")
        })
    }

    fn maintenance(&self) -> MigrateResult<&PgConnection> {
        self.maintenance.as_ref().ok_or_else(|| {
            MigrationError::connection("the PostgreSQL data service is not connected")
        })
    }

    async fn target(&mut self) -> MigrateResult<&PgConnection> {
        let lost = self.target.as_ref().is_none_or(PgConnection::is_closed);
        if lost && self.in_transaction {
            return Err(MigrationError::connection(
                "PostgreSQL connection closed during an open transaction",
            ));
        }
        if lost {
            let config = self.require_config()?;
            let conn = PgConnection::connect(config, &config.database).await?;
            self.target = Some(conn);
        }
        self.target
            .as_ref()
            .ok_or_else(|| MigrationError::connection("PostgreSQL connection unavailable"))
    }
}

#[async_trait]
impl DataService for PgDataService {
    fn platform(&self) -> Platform {
        Platform::PostgreSql
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("public")
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

    fn database_name(&self) -> String {
        self.config
            .as_ref()
            .map(|c| c.database.clone())
            .unwrap_or_default()
    }

    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()> {
        let config = PgConfig::from_connection_string(connection_string)?;
        let maintenance = PgConnection::connect(&config, &config.maintenance_database).await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to PostgreSQL"
        );
        self.config = Some(config);
        self.maintenance = Some(maintenance);
        self.target = None;
        self.in_transaction = false;
        Ok(())
    }

    async fn database_exists(&mut self) -> MigrateResult<bool> {
        let sql = format!(
            "SELECT 1 FROM pg_database WHERE datname = {}",
            self.quote_literal(&self.require_config()?.database)
        );
        Ok(!self.maintenance()?.query_text(&sql).await?.is_empty())
    }

    async fn create_database(&mut self) -> MigrateResult<()> {
        let name = self.require_config()?.database.clone();
        let sql = format!("CREATE DATABASE {}", self.quote_identifier(&name));
        self.maintenance()?.batch_execute(&sql).await?;
        info!(database = %name, "Created PostgreSQL database");
        Ok(())
    }

    async fn begin_transaction(&mut self) -> MigrateResult<()> {
        self.execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        let result = self.execute("COMMIT").await;
        self.in_transaction = false;
        result
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.in_transaction = false;
        // the server discards the transaction of a closed connection
        if self.target.as_ref().is_none_or(PgConnection::is_closed) {
            self.target = None;
            return Ok(());
        }
        self.execute("ROLLBACK").await
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(self.target().await?.batch_execute(sql).await?)
    }

    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>> {
        Ok(self.target().await?.query_text(sql).await?)
    }
}

impl BulkImportService for PgDataService {}

#[cfg(test)]
mod tests {
    use super::*;
    use migrata_core::{Audit, Ledger};
    use std::time::Duration;

    #[test]
    fn test_ledger_statements_render() {
        let service = PgDataService::new();
        let statements = service.ledger_statements();
        assert!(statements.create_table.contains("BIGSERIAL"));
        assert!(statements.insert_record.contains("current_user"));

        // schema falls back to public
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
        assert_eq!(ledger.schema(), Some("public"));
        assert_eq!(ledger.table(), "__migrata_ledger");
    }

    #[test]
    fn test_quoting() {
        let service = PgDataService::new();
        assert_eq!(service.quote_identifier("Order \"Items\""), "\"Order \"\"Items\"\"\"");
        assert_eq!(service.quote_literal("it's"), "'it''s'");
        assert_eq!(service.split_batches("  \n"), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_lost_connection_inside_transaction() {
        let mut service = PgDataService {
            config: Some(PgConfig::from_url("postgresql://app@localhost/inventory").unwrap()),
            in_transaction: true,
            ..Default::default()
        };

        let err = service.execute("CREATE TABLE a (id INT)").await.unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
        assert!(err.to_string().contains("open transaction"), "{err}");
        assert_eq!(service.commit().await.unwrap_err().kind(), "ConnectionError");

        service.in_transaction = true;
        service.rollback().await.unwrap();
        assert!(!service.in_transaction);
        assert!(service.target.is_none());
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let mut service = PgDataService::new();
        assert_eq!(
            service.database_exists().await.unwrap_err().kind(),
            "ConnectionError"
        );
        assert_eq!(
            service.connect("not a connection string").await.unwrap_err().kind(),
            "ConnectionError"
        );
    }
}
