//! SQL Server connection wrapper.

use tiberius::Client;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use migrata_core::TextRow;

use crate::config::MssqlConfig;
use crate::error::{MssqlError, MssqlResult};
use crate::types::row_to_text;

/// A single SQL Server connection over TCP.
///
/// Everything goes through `simple_query`, so batches may hold several
/// statements and values come back as text.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    database: String,
}

impl MssqlConnection {
    /// Connect to `database` on the configured server.
    pub async fn connect(config: &MssqlConfig, database: &str) -> MssqlResult<Self> {
        let tds = config.to_tiberius_config(database)?;

        let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(tds.get_addr()))
            .await
            .map_err(|_| {
                MssqlError::connection(format!(
                    "timed out connecting to {}:{} after {}s",
                    config.host,
                    config.port,
                    config.connect_timeout.as_secs()
                ))
            })??;
        tcp.set_nodelay(true)?;

        let client = Client::connect(tds, tcp.compat_write()).await?;
        debug!(host = %config.host, database, "Connected to SQL Server");

        Ok(Self {
            client,
            database: database.to_string(),
        })
    }

    /// Execute a batch, draining any result sets.
    pub async fn batch_execute(&mut self, sql: &str) -> MssqlResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    /// Run a query and collect the rows of its first result set as text.
    pub async fn query_text(&mut self, sql: &str) -> MssqlResult<Vec<TextRow>> {
        debug!(sql = %sql, "Executing query");
        let rows = self.client.simple_query(sql).await?.into_first_result().await?;
        rows.into_iter().map(row_to_text).collect()
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> MssqlResult<()> {
        self.client.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .finish()
    }
}
