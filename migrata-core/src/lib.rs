//! # migrata-core
//!
//! Migration engine for migrata.
//!
//! This crate provides:
//! - Discovery of version directories (`v0.00`, `v0.01`, ...) and their scripts
//! - Environment-scoped script filtering and `{{token}}` substitution
//! - An applied-version ledger inside the target database
//! - Transactional and non-transactional execution with resume after failure
//! - CSV bulk import through a per-database loader
//! - Verify-only (dry-run) and erase flows
//!
//! The crate talks to databases only through the [`DataService`] and
//! [`BulkImportService`] traits; driver crates implement them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ Workspace │────▶│ Script Catalog   │────▶│ Migration Engine │
//! └───────────┘     └──────────────────┘     └──────────────────┘
//!                                              │      │       │
//!                                              ▼      ▼       ▼
//!                                       ┌────────┐ ┌──────┐ ┌────────┐
//!                                       │ Tokens │ │ Bulk │ │ Ledger │
//!                                       └────────┘ └──────┘ └────────┘
//! ```
//!
//! ## Workspace layout
//!
//! ```text
//! db/
//! ├── _init/            # once, before the first version
//! ├── _pre/             # before pending versions
//! ├── v0.00/
//! │   ├── 01_tables.sql
//! │   └── dbo.region.csv
//! ├── v0.01/
//! │   ├── 00_prepare.pre.sql
//! │   ├── 01_alter.sql
//! │   └── 02_seed.env-dev.sql
//! ├── _post/            # after pending versions
//! └── _erase/           # teardown, run by `erase`
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use migrata_core::{MigrationService, RunOptions, TracingTraceService};
//! use migrata_sqlite::SqliteDataService;
//!
//! async fn migrate() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut service = MigrationService::new(
//!         SqliteDataService::new(),
//!         Arc::new(TracingTraceService::default()),
//!     );
//!     service.initialize("sqlite://./app.db").await?;
//!
//!     let options = RunOptions::new()
//!         .auto_create_database(true)
//!         .token("schema", "main");
//!     let report = service.run("./db", &options).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod options;
pub mod platform;
pub mod service;
pub mod tokens;
pub mod trace;
pub mod version;
pub mod workspace;

// Re-exports
pub use bulk::{
    insert_statement, BulkImportRequest, BulkImportService, BulkImportSummary, CsvError,
    CsvReader, CsvRecord,
};
pub use catalog::{
    checksum, BulkTarget, CatalogKind, ChecksummedScript, ScriptCatalog, ScriptEntry, ScriptKind,
};
pub use engine::{
    EngineState, EraseReport, MigrationEngine, MigrationPlan, PlannedScript, PlannedVersion,
    RunReport, RunStatus, ScriptAction, VersionReport,
};
pub use error::{MigrateResult, MigrationError};
pub use ledger::{
    Audit, Ledger, LedgerEntry, LedgerRecord, LedgerStatements, ScriptStatus,
    DEFAULT_LEDGER_TABLE, INIT_MARKER, TIMESTAMP_FORMAT,
};
pub use options::{Configuration, EraseOptions, RunOptions, TOOL_NAME, TOOL_VERSION};
pub use platform::{with_timeout, DataService, Platform, TextRow};
pub use service::{migrate_on_startup, MigrationService};
pub use tokens::{parse_token, replace_tokens, unresolved_tokens, Tokens};
pub use trace::{MemoryTraceService, TraceLevel, TraceService, TracingTraceService};
pub use version::Version;
pub use workspace::{GlobalDirectory, VersionBump, VersionDirectory, Workspace, WorkspaceLayout};
