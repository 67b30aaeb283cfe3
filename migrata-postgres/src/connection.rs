//! PostgreSQL connection wrapper.

use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

use migrata_core::TextRow;

use crate::config::PgConfig;
use crate::error::PgResult;

/// A single PostgreSQL connection using the simple query protocol.
///
/// Scripts may hold several statements, so everything goes through
/// `batch_execute` / `simple_query` and values come back as text.
pub struct PgConnection {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgConnection {
    /// Connect to `database` on the configured server.
    pub async fn connect(config: &PgConfig, database: &str) -> PgResult<Self> {
        let (client, connection) = config.to_pg_config(database).connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });
        debug!(host = %config.host, database, "Connected to PostgreSQL");
        Ok(Self { client, driver })
    }

    /// Execute statements without results.
    pub async fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    /// Run a query and collect its rows as text.
    pub async fn query_text(&self, sql: &str) -> PgResult<Vec<TextRow>> {
        debug!(sql = %sql, "Executing query");
        let messages = self.client.simple_query(sql).await?;
        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect())
    }

    /// Whether the connection was closed.
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}
