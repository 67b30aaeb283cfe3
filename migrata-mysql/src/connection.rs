//! MySQL connection wrapper.

use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use tracing::debug;

use migrata_core::TextRow;

use crate::config::MysqlConfig;
use crate::error::MysqlResult;
use crate::types::row_to_text;

/// A wrapper around a MySQL connection.
///
/// Statements go through the text protocol, which accepts several
/// statements per call.
pub struct MysqlConnection {
    conn: Conn,
}

impl MysqlConnection {
    /// Connect to `database`, or to the server without a default database.
    pub async fn connect(config: &MysqlConfig, database: Option<&str>) -> MysqlResult<Self> {
        let conn = Conn::new(config.to_opts_builder(database)).await?;
        debug!(host = %config.host, database = ?database, "Connected to MySQL");
        Ok(Self { conn })
    }

    /// Execute statements, discarding any results.
    pub async fn execute(&mut self, sql: &str) -> MysqlResult<()> {
        debug!(sql = %sql, "Executing statement");
        self.conn.query_drop(sql).await?;
        Ok(())
    }

    /// Run a query and collect its rows as text.
    pub async fn query_text(&mut self, sql: &str) -> MysqlResult<Vec<TextRow>> {
        debug!(sql = %sql, "Executing query");
        let rows: Vec<Row> = self.conn.query(sql).await?;
        Ok(rows.into_iter().map(row_to_text).collect())
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> MysqlResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

impl std::fmt::Debug for MysqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConnection")
            .field("id", &self.conn.id())
            .finish()
    }
}
