//! CLI command implementations.

pub mod erase;
pub mod init;
pub mod list;
pub mod run;
pub mod version;
pub mod vnext;

use std::sync::Arc;

use tracing::debug;

use migrata_core::{MigrationService, Platform, TraceService, TracingTraceService};

use crate::config::Settings;
use crate::error::{CliError, CliResult};

#[cfg(not(any(
    feature = "postgres",
    feature = "mysql",
    feature = "mssql",
    feature = "sqlite"
)))]
compile_error!("enable at least one of the postgres, mysql, mssql or sqlite features");

/// A migration service bound to the configured platform.
pub enum Session {
    /// PostgreSQL
    #[cfg(feature = "postgres")]
    Postgres(MigrationService<migrata_postgres::PgDataService>),
    /// MySQL / MariaDB
    #[cfg(feature = "mysql")]
    Mysql(MigrationService<migrata_mysql::MysqlDataService>),
    /// SQL Server
    #[cfg(feature = "mssql")]
    Mssql(MigrationService<migrata_mssql::MssqlDataService>),
    /// SQLite
    #[cfg(feature = "sqlite")]
    Sqlite(MigrationService<migrata_sqlite::SqliteDataService>),
}

/// Run `$body` with `$svc` bound to the session's migration service.
macro_rules! with_service {
    ($session:expr, $svc:ident => $body:expr) => {
        match $session {
            #[cfg(feature = "postgres")]
            $crate::commands::Session::Postgres($svc) => $body,
            #[cfg(feature = "mysql")]
            $crate::commands::Session::Mysql($svc) => $body,
            #[cfg(feature = "mssql")]
            $crate::commands::Session::Mssql($svc) => $body,
            #[cfg(feature = "sqlite")]
            $crate::commands::Session::Sqlite($svc) => $body,
        }
    };
}
pub(crate) use with_service;

impl Session {
    /// Create the data service for the configured platform and connect it.
    pub async fn open(settings: &Settings) -> CliResult<Self> {
        let trace: Arc<dyn TraceService> =
            Arc::new(TracingTraceService::new(settings.config.debug));
        let connection_string = settings.connection_string()?;
        debug!(
            platform = %settings.platform(),
            workspace = %settings.workspace().display(),
            config = ?settings.source,
            "Opening session"
        );

        let mut session = match settings.platform() {
            #[cfg(feature = "postgres")]
            Platform::PostgreSql => Self::Postgres(MigrationService::new(
                migrata_postgres::PgDataService::new(),
                trace,
            )),
            #[cfg(feature = "mysql")]
            Platform::MySql => Self::Mysql(MigrationService::new(
                migrata_mysql::MysqlDataService::new(),
                trace,
            )),
            #[cfg(feature = "mssql")]
            Platform::SqlServer => Self::Mssql(MigrationService::new(
                migrata_mssql::MssqlDataService::new(),
                trace,
            )),
            #[cfg(feature = "sqlite")]
            Platform::Sqlite => Self::Sqlite(MigrationService::new(
                migrata_sqlite::SqliteDataService::new(),
                trace,
            )),
            #[allow(unreachable_patterns)]
            other => return Err(CliError::UnsupportedPlatform(other)),
        };

        with_service!(&mut session, svc => svc.initialize(connection_string).await?);
        Ok(session)
    }
}
