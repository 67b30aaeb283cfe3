//! # migrata-mssql
//!
//! Microsoft SQL Server data service for migrata.
//!
//! This crate provides:
//! - [`MssqlDataService`], implementing [`migrata_core::DataService`] and
//!   [`migrata_core::BulkImportService`] on `tiberius`
//! - `mssql://` URLs and ADO.NET `Server=...;Database=...` connection strings
//! - `GO` batch separators in scripts
//! - Bulk inserts chunked to the 1000-row `VALUES` limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use migrata_core::{MigrationService, RunOptions, TracingTraceService};
//! use migrata_mssql::MssqlDataService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut service = MigrationService::new(
//!         MssqlDataService::new(),
//!         Arc::new(TracingTraceService::default()),
//!     );
//!     service
//!         .initialize("Server=localhost,1433;Database=inventory;User Id=sa;Password=Secret123!")
//!         .await?;
//!     service.run("./db", &RunOptions::new().auto_create_database(true)).await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod connection;
pub mod error;
pub mod service;
pub mod types;

pub use batch::split_go_batches;
pub use config::{EncryptionMode, MssqlConfig, DEFAULT_MAINTENANCE_DATABASE};
pub use connection::MssqlConnection;
pub use error::{MssqlError, MssqlResult};
pub use service::{MssqlDataService, MAX_VALUES_ROWS};
