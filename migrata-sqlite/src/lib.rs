//! SQLite data service for migrata.
//!
//! This crate implements [`migrata_core::DataService`] and
//! [`migrata_core::BulkImportService`] for SQLite, using `tokio-rusqlite`
//! to run the blocking driver on a dedicated thread.
//!
//! # Features
//!
//! - File and in-memory databases
//! - Transactional DDL, so a failed version leaves no trace
//! - Ledger stored in a plain table (SQLite has no schemas)
//! - Connection pragmas from the connection string
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use migrata_core::{MigrationService, RunOptions, TracingTraceService};
//! use migrata_sqlite::SqliteDataService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut service = MigrationService::new(
//!         SqliteDataService::new(),
//!         Arc::new(TracingTraceService::default()),
//!     );
//!     service.initialize("sqlite://./app.db").await?;
//!     service.run("./db", &RunOptions::new().auto_create_database(true)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod service;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
pub use service::SqliteDataService;
