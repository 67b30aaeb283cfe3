//! The migration service: the entry point for the CLI and embedding hosts.

use std::path::Path;
use std::sync::Arc;

use crate::bulk::BulkImportService;
use crate::engine::{EraseReport, MigrationEngine, RunReport};
use crate::error::{MigrateResult, MigrationError};
use crate::ledger::{Ledger, LedgerRecord};
use crate::options::{Configuration, EraseOptions, RunOptions};
use crate::platform::with_timeout;
use crate::trace::TraceService;
use crate::workspace::Workspace;

/// Runs migrations against one target through a data service.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use migrata_core::{MigrationService, RunOptions, TracingTraceService};
///
/// let mut service = MigrationService::new(data_service, Arc::new(TracingTraceService::default()));
/// service.initialize("postgres://app@localhost/inventory").await?;
/// let report = service.run("./db", &RunOptions::new().auto_create_database(true)).await?;
/// println!("{}", report.summary());
/// ```
pub struct MigrationService<D: BulkImportService> {
    data_service: D,
    trace: Arc<dyn TraceService>,
    initialized: bool,
}

impl<D: BulkImportService> MigrationService<D> {
    /// Create a service. Call [`initialize`](Self::initialize) before anything else.
    pub fn new(data_service: D, trace: Arc<dyn TraceService>) -> Self {
        Self {
            data_service,
            trace,
            initialized: false,
        }
    }

    /// The data service.
    pub fn data_service(&self) -> &D {
        &self.data_service
    }

    /// The data service, mutably.
    pub fn data_service_mut(&mut self) -> &mut D {
        &mut self.data_service
    }

    /// Give back the data service.
    pub fn into_inner(self) -> D {
        self.data_service
    }

    /// Bind the service to a target.
    pub async fn initialize(&mut self, connection_string: &str) -> MigrateResult<()> {
        self.data_service
            .connect(connection_string)
            .await
            .map_err(|e| match e {
                MigrationError::Connection(_) => e,
                other => MigrationError::connection(other.to_string()),
            })?;
        self.initialized = true;
        self.trace.info(&format!(
            "Connected to {} database '{}'",
            self.data_service.platform(),
            self.data_service.database_name()
        ));
        Ok(())
    }

    fn ensure_initialized(&self) -> MigrateResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(MigrationError::connection(
                "the migration service is not initialized",
            ))
        }
    }

    /// Apply the pending versions of the workspace.
    pub async fn run(
        &mut self,
        workspace: impl AsRef<Path>,
        options: &RunOptions,
    ) -> MigrateResult<RunReport> {
        self.ensure_initialized()?;
        let workspace = Workspace::new(workspace.as_ref());
        MigrationEngine::new(&mut self.data_service, &*self.trace)
            .run(&workspace, options)
            .await
    }

    /// Report what a run would do without changing anything.
    pub async fn verify(
        &mut self,
        workspace: impl AsRef<Path>,
        options: &RunOptions,
    ) -> MigrateResult<RunReport> {
        let options = options.clone().verify_only(true);
        self.run(workspace, &options).await
    }

    /// Run the erase scripts.
    pub async fn erase(
        &mut self,
        workspace: impl AsRef<Path>,
        options: &EraseOptions,
    ) -> MigrateResult<EraseReport> {
        self.ensure_initialized()?;
        let workspace = Workspace::new(workspace.as_ref());
        MigrationEngine::new(&mut self.data_service, &*self.trace)
            .erase(&workspace, options)
            .await
    }

    /// Every ledger row, oldest first. Empty when the ledger does not exist.
    pub async fn list(&mut self, options: &RunOptions) -> MigrateResult<Vec<LedgerRecord>> {
        self.ensure_initialized()?;
        let db = &mut self.data_service;
        let timeout = options.command_timeout;
        if !with_timeout(timeout, "database check", db.database_exists()).await? {
            return Err(MigrationError::TargetDatabaseMissing(db.database_name()));
        }

        let ledger = Ledger::new(
            &*db,
            options.meta_schema_name.as_deref(),
            options.meta_table_name.as_deref(),
            options.audit(),
            timeout,
        )?;
        if !ledger.exists(db).await? {
            return Ok(Vec::new());
        }
        ledger.all_records(db).await
    }
}

/// Migrate a target during host startup.
///
/// Returns `None` when the configuration disables migrations.
pub async fn migrate_on_startup<D: BulkImportService>(
    data_service: D,
    trace: Arc<dyn TraceService>,
    config: &Configuration,
) -> MigrateResult<Option<RunReport>> {
    if !config.enabled {
        trace.info("Migrations are disabled");
        return Ok(None);
    }

    let connection_string = config.connection_string.as_deref().ok_or_else(|| {
        MigrationError::invalid_configuration("connection_string is required")
    })?;

    let mut service = MigrationService::new(data_service, trace);
    service.initialize(connection_string).await?;
    service
        .run(&config.workspace, &config.to_run_options())
        .await
        .map(Some)
}
