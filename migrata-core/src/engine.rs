//! Execution engine.
//!
//! A run moves through these states:
//!
//! ```text
//! Idle -> Resolving -> Applying(v) -> Committed(v) -> Resolving -> ... -> Done
//!                                  \-> Failed(v) -> Aborted
//! ```
//!
//! Versions and scripts run strictly in order on one connection. By default
//! every version runs inside one transaction together with its ledger rows.
//! With `no_transaction` each script commits on its own and the ledger keeps
//! an `in_progress` row while it runs, which is what makes resuming after a
//! failure possible.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use crate::bulk::{BulkImportRequest, BulkImportService};
use crate::catalog::{CatalogKind, ChecksummedScript, ScriptCatalog, ScriptKind};
use crate::error::{MigrateResult, MigrationError};
use crate::ledger::{Ledger, LedgerEntry, LedgerRecord, ScriptStatus};
use crate::options::{EraseOptions, RunOptions};
use crate::platform::with_timeout;
use crate::tokens::{replace_tokens, unresolved_tokens, Tokens};
use crate::trace::TraceService;
use crate::version::Version;
use crate::workspace::{GlobalDirectory, Workspace, WorkspaceLayout};

/// Engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing started.
    Idle,
    /// Discovering the workspace and reading the ledger.
    Resolving,
    /// Executing the scripts of a version.
    Applying(Version),
    /// A version was applied and recorded.
    Committed(Version),
    /// A version failed; its work was rolled back or left for resume.
    Failed(Version),
    /// Every pending version was applied, or verification finished.
    Done,
    /// The run stopped on an error.
    Aborted,
}

impl EngineState {
    /// Whether the engine stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Resolving => f.write_str("resolving"),
            Self::Applying(v) => write!(f, "applying {v}"),
            Self::Committed(v) => write!(f, "committed {v}"),
            Self::Failed(v) => write!(f, "failed {v}"),
            Self::Done => f.write_str("done"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// What the engine does with a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    /// Run it.
    Execute,
    /// Already applied with the same checksum.
    SkipApplied,
    /// Applied before but changed on disk; run again because of `force_reapply`.
    Reapply,
}

/// A script and the action planned for it.
#[derive(Debug, Clone)]
pub struct PlannedScript {
    /// The script.
    pub script: ChecksummedScript,
    /// Planned action.
    pub action: ScriptAction,
}

/// A pending version and its scripts.
#[derive(Debug, Clone)]
pub struct PlannedVersion {
    /// Version.
    pub version: Version,
    /// Scripts in execution order.
    pub scripts: Vec<PlannedScript>,
    /// Whether the ledger shows an earlier partial application.
    pub resumed: bool,
}

impl PlannedVersion {
    /// Number of scripts that will run.
    pub fn to_execute(&self) -> usize {
        self.scripts
            .iter()
            .filter(|s| s.action != ScriptAction::SkipApplied)
            .count()
    }
}

/// Everything a run would do.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    /// `_init` scripts, when the ledger holds no applied version.
    pub init: Option<ScriptCatalog>,
    /// `_pre` scripts.
    pub pre: Option<ScriptCatalog>,
    /// Pending versions in order.
    pub versions: Vec<PlannedVersion>,
    /// `_post` scripts.
    pub post: Option<ScriptCatalog>,
}

impl MigrationPlan {
    /// Whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Scripts of pending versions that will run.
    pub fn scripts_to_execute(&self) -> usize {
        self.versions.iter().map(PlannedVersion::to_execute).sum()
    }

    /// One-line description.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "Nothing to apply".to_string();
        }
        let mut parts = vec![format!(
            "{} pending versions ({} scripts)",
            self.versions.len(),
            self.scripts_to_execute()
        )];
        let resumed = self.versions.iter().filter(|v| v.resumed).count();
        if resumed > 0 {
            parts.push(format!("{resumed} resumed"));
        }
        parts.join(", ")
    }
}

/// What happened to one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReport {
    /// Version name.
    pub version: String,
    /// Scripts executed, in order.
    pub executed: Vec<String>,
    /// Scripts skipped because they were already applied.
    pub skipped: Vec<String>,
    /// Time spent on the version.
    pub duration_ms: i64,
}

/// Outcome class of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Pending versions were applied.
    Applied,
    /// No version was pending.
    NothingToApply,
    /// Verify-only run; nothing was changed.
    Verified,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Outcome class.
    pub status: RunStatus,
    /// What was (or would have been) done.
    pub plan: MigrationPlan,
    /// Applied versions.
    pub versions: Vec<VersionReport>,
    /// Total duration.
    pub duration_ms: i64,
    /// State the engine ended in.
    pub final_state: EngineState,
    /// Every state the engine passed through.
    pub history: Vec<EngineState>,
}

impl RunReport {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        0
    }

    /// One-line description.
    pub fn summary(&self) -> String {
        match self.status {
            RunStatus::NothingToApply => "Nothing to apply".to_string(),
            RunStatus::Verified => format!("Verified: {}", self.plan.summary()),
            RunStatus::Applied => {
                let scripts: usize = self.versions.iter().map(|v| v.executed.len()).sum();
                format!(
                    "Applied {} versions ({} scripts) in {}ms",
                    self.versions.len(),
                    scripts,
                    self.duration_ms
                )
            }
        }
    }
}

/// Result of an erase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseReport {
    /// Scripts executed, in order.
    pub executed: Vec<String>,
    /// Total duration.
    pub duration_ms: i64,
}

/// Per-script execution settings shared by runs and erase.
struct ExecutionSettings<'a> {
    tokens: &'a Tokens,
    strict_tokens: bool,
    timeout: Duration,
    bulk_separator: char,
    bulk_batch_size: usize,
    debug: bool,
}

struct ScriptFailure {
    script: Option<(String, String)>,
    duration_ms: i64,
    error: MigrationError,
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

/// Applies a workspace to one target.
pub struct MigrationEngine<'a, D: BulkImportService + ?Sized> {
    db: &'a mut D,
    trace: &'a dyn TraceService,
    state: EngineState,
    history: Vec<EngineState>,
}

impl<'a, D: BulkImportService + ?Sized> MigrationEngine<'a, D> {
    /// Create an engine over a connected data service.
    pub fn new(db: &'a mut D, trace: &'a dyn TraceService) -> Self {
        Self {
            db,
            trace,
            state: EngineState::Idle,
            history: vec![EngineState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// States passed through so far.
    pub fn history(&self) -> &[EngineState] {
        &self.history
    }

    fn transition(&mut self, next: EngineState) {
        self.trace.debug(&format!("state: {} -> {}", self.state, next));
        self.state = next.clone();
        self.history.push(next);
    }

    fn abort(&mut self, error: &MigrationError) {
        if self.state != EngineState::Aborted {
            self.transition(EngineState::Aborted);
        }
        self.trace.error(&format!("{}: {error}", error.kind()));
    }

    /// Apply the pending versions of `workspace`.
    pub async fn run(
        &mut self,
        workspace: &Workspace,
        options: &RunOptions,
    ) -> MigrateResult<RunReport> {
        let started = Instant::now();
        match self.run_inner(workspace, options, started).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        workspace: &Workspace,
        options: &RunOptions,
        started: Instant,
    ) -> MigrateResult<RunReport> {
        options.validate()?;
        self.transition(EngineState::Resolving);

        let layout = workspace.discover().await?;
        let ceiling = options.ceiling()?;
        let ledger = Ledger::new(
            &*self.db,
            options.meta_schema_name.as_deref(),
            options.meta_table_name.as_deref(),
            options.audit(),
            options.command_timeout,
        )?;
        let timeout = options.command_timeout;

        let exists = with_timeout(timeout, "database check", self.db.database_exists()).await?;
        let read_ledger = if !exists {
            let name = self.db.database_name();
            if !options.auto_create_database {
                return Err(MigrationError::TargetDatabaseMissing(name));
            }
            if options.verify_only {
                self.trace.info(&format!(
                    "Database '{name}' does not exist yet; every version is pending"
                ));
                false
            } else {
                self.trace.info(&format!("Creating database '{name}'"));
                with_timeout(timeout, "create database", self.db.create_database()).await?;
                ledger.ensure_schema(&mut *self.db).await?;
                true
            }
        } else if options.verify_only {
            ledger.exists(&mut *self.db).await?
        } else {
            ledger.ensure_schema(&mut *self.db).await?;
            true
        };

        let plan = self
            .plan(&layout, &ledger, ceiling.as_ref(), options, read_ledger)
            .await?;

        if plan.is_empty() {
            self.trace.info("Nothing to apply");
            self.transition(EngineState::Done);
            return Ok(self.report(RunStatus::NothingToApply, plan, Vec::new(), started));
        }

        if options.verify_only {
            self.trace_plan(&plan);
            self.transition(EngineState::Done);
            return Ok(self.report(RunStatus::Verified, plan, Vec::new(), started));
        }

        if !options.no_transaction && !self.db.is_transactional_ddl_supported() {
            self.trace.warn(&format!(
                "{} does not support transactional DDL; schema changes of a failed version are not rolled back",
                self.db.platform()
            ));
        }

        let settings = ExecutionSettings {
            tokens: &options.tokens,
            strict_tokens: options.strict_tokens,
            timeout,
            bulk_separator: options.bulk_separator,
            bulk_batch_size: options.bulk_batch_size,
            debug: options.debug || self.trace.is_debug_enabled(),
        };

        if let Some(init) = &plan.init {
            self.run_global(
                GlobalDirectory::Init,
                init,
                &settings,
                options.no_transaction,
                Some(&ledger),
            )
            .await?;
        }
        if let Some(pre) = &plan.pre {
            self.run_global(GlobalDirectory::Pre, pre, &settings, options.no_transaction, None)
                .await?;
        }

        let mut reports = Vec::with_capacity(plan.versions.len());
        for (index, planned) in plan.versions.iter().enumerate() {
            if index > 0 {
                self.transition(EngineState::Resolving);
            }
            let report = self
                .apply_version(planned, &ledger, &settings, options.no_transaction)
                .await?;
            reports.push(report);
        }

        if let Some(post) = &plan.post {
            self.run_global(GlobalDirectory::Post, post, &settings, options.no_transaction, None)
                .await?;
        }

        self.transition(EngineState::Done);
        let report = self.report(RunStatus::Applied, plan, reports, started);
        self.trace.info(&report.summary());
        Ok(report)
    }

    fn report(
        &self,
        status: RunStatus,
        plan: MigrationPlan,
        versions: Vec<VersionReport>,
        started: Instant,
    ) -> RunReport {
        RunReport {
            status,
            plan,
            versions,
            duration_ms: elapsed_ms(started),
            final_state: self.state.clone(),
            history: self.history.clone(),
        }
    }

    async fn plan(
        &mut self,
        layout: &WorkspaceLayout,
        ledger: &Ledger,
        ceiling: Option<&Version>,
        options: &RunOptions,
        read_ledger: bool,
    ) -> MigrateResult<MigrationPlan> {
        let applied = if read_ledger {
            ledger.applied_versions(&mut *self.db).await?
        } else {
            BTreeSet::new()
        };

        let pending = layout.pending(&applied, ceiling);
        let mut plan = MigrationPlan::default();
        if pending.is_empty() {
            return Ok(plan);
        }

        let env = options.environment.as_deref();
        let init_applied = read_ledger && ledger.init_applied(&mut *self.db).await?;
        if applied.is_empty() && !init_applied {
            if let Some(dir) = &layout.init {
                plan.init = Some(ScriptCatalog::build(dir, CatalogKind::Version, env).await?);
            }
        }
        if let Some(dir) = &layout.pre {
            plan.pre = Some(ScriptCatalog::build(dir, CatalogKind::Pre, env).await?);
        }
        if let Some(dir) = &layout.post {
            plan.post = Some(ScriptCatalog::build(dir, CatalogKind::Post, env).await?);
        }

        for dir in pending {
            let catalog = ScriptCatalog::build(&dir.path, CatalogKind::Version, env).await?;
            let rows = if read_ledger {
                ledger.applied_scripts(&mut *self.db, &dir.version).await?
            } else {
                Vec::new()
            };
            plan.versions
                .push(self.plan_version(dir.version, catalog, &rows, options)?);
        }

        if options.strict_tokens {
            check_tokens(&plan, &options.tokens)?;
        }

        Ok(plan)
    }

    fn plan_version(
        &self,
        version: Version,
        catalog: ScriptCatalog,
        rows: &[LedgerRecord],
        options: &RunOptions,
    ) -> MigrateResult<PlannedVersion> {
        let succeeded: HashMap<&str, &str> = rows
            .iter()
            .filter(|r| r.status == ScriptStatus::Succeeded)
            .map(|r| (r.script.as_str(), r.checksum.as_str()))
            .collect();

        if !succeeded.is_empty() && !options.resume_after_failure {
            return Err(MigrationError::ResumeRequired {
                version: version.to_string(),
                applied: succeeded.len(),
            });
        }

        for row in rows.iter().filter(|r| r.status == ScriptStatus::InProgress) {
            self.trace.warn(&format!(
                "{version}/{} did not finish during an earlier run and will run again",
                row.script
            ));
        }

        let mut scripts = Vec::with_capacity(catalog.len());
        for script in catalog.scripts {
            let action = match succeeded.get(script.entry.id.as_str()) {
                None => ScriptAction::Execute,
                Some(recorded) if *recorded == script.checksum => ScriptAction::SkipApplied,
                Some(recorded) => {
                    if !options.force_reapply {
                        return Err(MigrationError::DriftDetected {
                            version: version.to_string(),
                            script: script.entry.id.clone(),
                            expected: recorded.to_string(),
                            actual: script.checksum.clone(),
                        });
                    }
                    self.trace.warn(&format!(
                        "{version}/{} changed after it was applied; running it again",
                        script.entry.id
                    ));
                    ScriptAction::Reapply
                }
            };
            scripts.push(PlannedScript { script, action });
        }

        Ok(PlannedVersion {
            version,
            scripts,
            resumed: !succeeded.is_empty(),
        })
    }

    fn trace_plan(&self, plan: &MigrationPlan) {
        self.trace.info(&plan.summary());
        for planned in &plan.versions {
            self.trace.info(&format!(
                "{}: {} to run, {} already applied",
                planned.version,
                planned.to_execute(),
                planned.scripts.len() - planned.to_execute()
            ));
            for script in &planned.scripts {
                let action = match script.action {
                    ScriptAction::Execute => "run",
                    ScriptAction::SkipApplied => "skip",
                    ScriptAction::Reapply => "re-run",
                };
                self.trace
                    .info(&format!("  {action:6} {}", script.script.entry.id));
            }
        }
    }

    async fn apply_version(
        &mut self,
        planned: &PlannedVersion,
        ledger: &Ledger,
        settings: &ExecutionSettings<'_>,
        no_transaction: bool,
    ) -> MigrateResult<VersionReport> {
        let version = planned.version.clone();
        self.transition(EngineState::Applying(version.clone()));
        self.trace.info(&format!("Applying {version}"));

        let started = Instant::now();
        let outcome = if no_transaction {
            self.apply_each(planned, ledger, settings).await
        } else {
            self.apply_in_transaction(planned, ledger, settings).await
        };

        match outcome {
            Ok(mut report) => {
                report.duration_ms = elapsed_ms(started);
                self.transition(EngineState::Committed(version));
                Ok(report)
            }
            Err(e) => {
                self.transition(EngineState::Failed(version));
                Err(e)
            }
        }
    }

    async fn apply_in_transaction(
        &mut self,
        planned: &PlannedVersion,
        ledger: &Ledger,
        settings: &ExecutionSettings<'_>,
    ) -> MigrateResult<VersionReport> {
        let started = Instant::now();
        with_timeout(settings.timeout, "begin transaction", self.db.begin_transaction()).await?;

        let mut result = self.run_scripts(planned, ledger, settings, false).await;
        if result.is_ok() {
            if let Err(error) = ledger
                .record_version_complete(&mut *self.db, planned.version.as_str(), elapsed_ms(started))
                .await
            {
                result = Err(ScriptFailure {
                    script: None,
                    duration_ms: 0,
                    error,
                });
            }
        }

        match result {
            Ok(report) => {
                if let Err(e) =
                    with_timeout(settings.timeout, "commit", self.db.commit()).await
                {
                    self.rollback_quietly(settings.timeout).await;
                    return Err(e);
                }
                Ok(report)
            }
            Err(failure) => {
                self.rollback_quietly(settings.timeout).await;
                self.record_failure(ledger, &planned.version, &failure).await;
                Err(failure.error)
            }
        }
    }

    async fn apply_each(
        &mut self,
        planned: &PlannedVersion,
        ledger: &Ledger,
        settings: &ExecutionSettings<'_>,
    ) -> MigrateResult<VersionReport> {
        let started = Instant::now();
        match self.run_scripts(planned, ledger, settings, true).await {
            Ok(report) => {
                ledger
                    .record_version_complete(
                        &mut *self.db,
                        planned.version.as_str(),
                        elapsed_ms(started),
                    )
                    .await?;
                Ok(report)
            }
            Err(failure) => {
                self.record_failure(ledger, &planned.version, &failure).await;
                Err(failure.error)
            }
        }
    }

    async fn run_scripts(
        &mut self,
        planned: &PlannedVersion,
        ledger: &Ledger,
        settings: &ExecutionSettings<'_>,
        mark_in_progress: bool,
    ) -> Result<VersionReport, ScriptFailure> {
        let version = planned.version.as_str();
        let mut report = VersionReport {
            version: version.to_string(),
            executed: Vec::new(),
            skipped: Vec::new(),
            duration_ms: 0,
        };

        for planned_script in &planned.scripts {
            let script = &planned_script.script;
            let id = script.entry.id.as_str();
            if planned_script.action == ScriptAction::SkipApplied {
                self.trace
                    .info(&format!("Skipping {version}/{id}: already applied"));
                report.skipped.push(id.to_string());
                continue;
            }

            let fail = |error: MigrationError, duration_ms: i64| ScriptFailure {
                script: Some((id.to_string(), script.checksum.clone())),
                duration_ms,
                error,
            };
            let entry = |status: ScriptStatus, duration_ms: i64| LedgerEntry {
                version,
                script: id,
                checksum: &script.checksum,
                status,
                duration_ms,
                error_message: None,
            };

            if mark_in_progress {
                ledger
                    .record_script_result(&mut *self.db, entry(ScriptStatus::InProgress, 0))
                    .await
                    .map_err(|e| fail(e, 0))?;
            }

            let started = Instant::now();
            self.execute_script(version, script, settings)
                .await
                .map_err(|e| fail(e, elapsed_ms(started)))?;
            let duration = elapsed_ms(started);

            ledger
                .record_script_result(&mut *self.db, entry(ScriptStatus::Succeeded, duration))
                .await
                .map_err(|e| fail(e, duration))?;
            report.executed.push(id.to_string());
        }

        Ok(report)
    }

    async fn record_failure(&mut self, ledger: &Ledger, version: &Version, failure: &ScriptFailure) {
        let Some((script, checksum)) = &failure.script else {
            return;
        };
        if !failure.error.is_script_failure() {
            return;
        }

        let message = failure.error.to_string();
        let entry = LedgerEntry {
            version: version.as_str(),
            script,
            checksum,
            status: ScriptStatus::Failed,
            duration_ms: failure.duration_ms,
            error_message: Some(&message),
        };
        if let Err(e) = ledger.record_script_result(&mut *self.db, entry).await {
            self.trace
                .error(&format!("Could not record failure of {version}/{script}: {e}"));
        }
    }

    async fn rollback_quietly(&mut self, timeout: Duration) {
        if let Err(e) = with_timeout(timeout, "rollback", self.db.rollback()).await {
            self.trace.error(&format!("Rollback failed: {e}"));
        }
    }

    async fn execute_script(
        &mut self,
        label: &str,
        script: &ChecksummedScript,
        settings: &ExecutionSettings<'_>,
    ) -> MigrateResult<()> {
        let id = script.entry.id.as_str();
        self.trace.info(&format!("Executing {label}/{id}"));

        if script.entry.kind == ScriptKind::BulkImport {
            let target = script.entry.bulk_target.as_ref().ok_or_else(|| {
                MigrationError::script_discovery(&script.entry.path, "bulk file without a target table")
            })?;
            let summary = self
                .db
                .bulk_import(BulkImportRequest {
                    path: &script.entry.path,
                    target,
                    content: &script.content,
                    separator: settings.bulk_separator,
                    batch_size: settings.bulk_batch_size,
                    timeout: settings.timeout,
                })
                .await?;
            self.trace.info(&format!(
                "Imported {} rows into {target} in {} batches",
                summary.rows, summary.batches
            ));
            return Ok(());
        }

        if settings.strict_tokens {
            let missing = unresolved_tokens(&script.content, settings.tokens);
            if !missing.is_empty() {
                return Err(MigrationError::UnresolvedToken {
                    script: format!("{label}/{id}"),
                    tokens: missing,
                });
            }
        }

        let text = replace_tokens(&script.content, settings.tokens);
        if settings.debug {
            self.trace.debug(&format!("{label}/{id}:\n{text}"));
        }

        for batch in self.db.split_batches(&text) {
            with_timeout(settings.timeout, "execute script", self.db.execute(&batch))
                .await
                .map_err(|e| e.with_script_context(label, id))?;
        }
        Ok(())
    }

    async fn run_global(
        &mut self,
        dir: GlobalDirectory,
        catalog: &ScriptCatalog,
        settings: &ExecutionSettings<'_>,
        no_transaction: bool,
        marker: Option<&Ledger>,
    ) -> MigrateResult<()> {
        if catalog.is_empty() {
            return Ok(());
        }
        let label = dir.dir_name();
        self.trace.info(&format!("Running {label} scripts"));

        if no_transaction {
            let started = Instant::now();
            for script in catalog.iter() {
                self.execute_script(label, script, settings).await?;
            }
            if let Some(ledger) = marker {
                ledger
                    .record_version_complete(&mut *self.db, label, elapsed_ms(started))
                    .await?;
            }
            return Ok(());
        }
        self.run_in_transaction(label, catalog, settings, marker).await
    }

    /// Run a global directory in one transaction. With a `marker` ledger, the
    /// directory's marker row is written before the commit.
    async fn run_in_transaction(
        &mut self,
        label: &str,
        catalog: &ScriptCatalog,
        settings: &ExecutionSettings<'_>,
        marker: Option<&Ledger>,
    ) -> MigrateResult<()> {
        let started = Instant::now();
        with_timeout(settings.timeout, "begin transaction", self.db.begin_transaction()).await?;

        let mut result = Ok(());
        for script in catalog.iter() {
            if let Err(e) = self.execute_script(label, script, settings).await {
                result = Err(e);
                break;
            }
        }
        if let Some(ledger) = marker.filter(|_| result.is_ok()) {
            result = ledger
                .record_version_complete(&mut *self.db, label, elapsed_ms(started))
                .await;
        }

        match result {
            Ok(()) => {
                if let Err(e) = with_timeout(settings.timeout, "commit", self.db.commit()).await {
                    self.rollback_quietly(settings.timeout).await;
                    return Err(e);
                }
                Ok(())
            }
            Err(e) => {
                self.rollback_quietly(settings.timeout).await;
                Err(e)
            }
        }
    }

    /// Run the `_erase` scripts in one transaction. Nothing is written to the
    /// ledger.
    pub async fn erase(
        &mut self,
        workspace: &Workspace,
        options: &EraseOptions,
    ) -> MigrateResult<EraseReport> {
        let started = Instant::now();
        match self.erase_inner(workspace, options, started).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    async fn erase_inner(
        &mut self,
        workspace: &Workspace,
        options: &EraseOptions,
        started: Instant,
    ) -> MigrateResult<EraseReport> {
        self.transition(EngineState::Resolving);
        let layout = workspace.discover().await?;
        let dir = layout.erase.ok_or_else(|| {
            MigrationError::invalid_workspace(format!(
                "'{}' has no {} directory",
                workspace.root().display(),
                GlobalDirectory::Erase.dir_name()
            ))
        })?;
        let catalog =
            ScriptCatalog::build(dir, CatalogKind::Erase, options.environment.as_deref()).await?;

        let timeout = options.command_timeout;
        if !with_timeout(timeout, "database check", self.db.database_exists()).await? {
            return Err(MigrationError::TargetDatabaseMissing(self.db.database_name()));
        }
        if !self.db.is_transactional_ddl_supported() {
            self.trace.warn(&format!(
                "{} does not support transactional DDL; a failed erase may leave partial changes",
                self.db.platform()
            ));
        }

        let settings = ExecutionSettings {
            tokens: &options.tokens,
            strict_tokens: false,
            timeout,
            bulk_separator: ',',
            bulk_batch_size: 0,
            debug: options.debug || self.trace.is_debug_enabled(),
        };

        self.run_in_transaction(GlobalDirectory::Erase.dir_name(), &catalog, &settings, None)
            .await?;
        self.transition(EngineState::Done);

        let report = EraseReport {
            executed: catalog.iter().map(|s| s.entry.id.clone()).collect(),
            duration_ms: elapsed_ms(started),
        };
        self.trace
            .info(&format!("Erased with {} scripts", report.executed.len()));
        Ok(report)
    }
}

fn check_tokens(plan: &MigrationPlan, tokens: &Tokens) -> MigrateResult<()> {
    let globals = [
        (GlobalDirectory::Init, &plan.init),
        (GlobalDirectory::Pre, &plan.pre),
        (GlobalDirectory::Post, &plan.post),
    ];
    let global_scripts = globals.into_iter().flat_map(|(dir, catalog)| {
        catalog
            .iter()
            .flat_map(|c| c.iter())
            .map(move |s| (dir.dir_name().to_string(), s))
    });
    let version_scripts = plan.versions.iter().flat_map(|v| {
        v.scripts
            .iter()
            .filter(|s| s.action != ScriptAction::SkipApplied)
            .map(move |s| (v.version.to_string(), &s.script))
    });

    for (label, script) in global_scripts.chain(version_scripts) {
        if script.entry.kind == ScriptKind::BulkImport {
            continue;
        }
        let missing = unresolved_tokens(&script.content, tokens);
        if !missing.is_empty() {
            return Err(MigrationError::UnresolvedToken {
                script: format!("{label}/{}", script.entry.id),
                tokens: missing,
            });
        }
    }
    Ok(())
}
