//! SQLite connection wrapper.

use rusqlite::OpenFlags;
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use migrata_core::TextRow;

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::SqliteResult;
use crate::types::row_to_text;

/// A wrapper around a SQLite connection running on its own thread.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open the configured database and apply the connection pragmas.
    ///
    /// Without `create` a missing database file is an error instead of being
    /// created.
    pub async fn open(config: &SqliteConfig, create: bool) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => {
                let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                if create {
                    flags |= OpenFlags::SQLITE_OPEN_CREATE;
                }
                Connection::open_with_flags(path.clone(), flags).await?
            }
        };
        debug!(path = %config.path.display_name(), create, "Opened SQLite connection");

        let conn = Self { conn };
        let init_sql = config.init_sql();
        if !init_sql.is_empty() {
            conn.execute_batch(&init_sql).await?;
        }
        Ok(conn)
    }

    /// Execute one or more statements without results.
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();
        trace!(sql = %sql, "Executing batch");

        self.conn
            .call(move |conn| Ok(conn.execute_batch(&sql)?))
            .await?;
        Ok(())
    }

    /// Run a query and render every value as text.
    pub async fn query_text(&self, sql: &str) -> SqliteResult<Vec<TextRow>> {
        let sql = sql.to_string();
        debug!(sql = %sql, "Executing query");

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns = stmt.column_count();
                let rows = stmt.query_map([], |row| row_to_text(row, columns))?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(rows)
    }

    /// Whether the connection is inside a transaction.
    pub async fn in_transaction(&self) -> SqliteResult<bool> {
        Ok(self
            .conn
            .call(|conn| Ok(!conn.is_autocommit()))
            .await?)
    }

    /// Close the connection.
    pub async fn close(self) -> SqliteResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}
