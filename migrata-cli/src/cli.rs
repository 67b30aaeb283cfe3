//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use migrata_core::Platform;

/// migrata - versioned database migrations
#[derive(Parser, Debug)]
#[command(name = "migrata")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "migrata - versioned database migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Target database platform
    #[arg(long, global = true, env = "MIGRATA_PLATFORM")]
    pub platform: Option<PlatformArg>,

    /// Connection string of the target database
    #[arg(short = 'c', long, global = true, env = "MIGRATA_CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Workspace directory
    #[arg(short = 'p', long, global = true, env = "MIGRATA_WORKSPACE")]
    pub path: Option<PathBuf>,

    /// Configuration file (defaults to ./migrata.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Trace script text and enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a migration workspace
    Init,

    /// Create the next version directory
    Vnext(VnextArgs),

    /// Apply pending versions
    Run(RunArgs),

    /// Show what `run` would do without changing anything
    Verify(RunArgs),

    /// Show the ledger
    List(ListArgs),

    /// Run the erase scripts
    Erase(EraseArgs),

    /// Display version information
    Version,
}

/// Supported database platforms
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    #[value(alias = "mssql")]
    Sqlserver,
    #[value(alias = "postgres")]
    Postgresql,
    #[value(alias = "mariadb")]
    Mysql,
    Sqlite,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Sqlserver => Platform::SqlServer,
            PlatformArg::Postgresql => Platform::PostgreSql,
            PlatformArg::Mysql => Platform::MySql,
            PlatformArg::Sqlite => Platform::Sqlite,
        }
    }
}

// =============================================================================
// Vnext Command
// =============================================================================

/// Arguments for the `vnext` command
#[derive(Args, Debug)]
pub struct VnextArgs {
    /// Increment the major version
    #[arg(short = 'm', long, conflicts_with = "minor")]
    pub major: bool,

    /// Increment the minor version (default)
    #[arg(short = 'n', long)]
    pub minor: bool,

    /// Create an empty script file in the new version
    #[arg(short = 'f', long)]
    pub file: Option<String>,
}

// =============================================================================
// Run / Verify Commands
// =============================================================================

/// Arguments for the `run` and `verify` commands
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Highest version to apply
    #[arg(short = 't', long)]
    pub target_version: Option<String>,

    /// Create the target database when it does not exist
    #[arg(short = 'a', long)]
    pub auto_create_database: bool,

    /// Token value, as KEY=VALUE (repeatable)
    #[arg(short = 'k', long = "token", value_name = "KEY=VALUE")]
    pub tokens: Vec<String>,

    /// Field separator of bulk files
    #[arg(long)]
    pub bulk_separator: Option<char>,

    /// Rows per bulk insert batch (0 = all rows in one batch)
    #[arg(long)]
    pub bulk_batch_size: Option<usize>,

    /// Schema of the ledger table
    #[arg(long)]
    pub meta_schema: Option<String>,

    /// Name of the ledger table
    #[arg(long)]
    pub meta_table: Option<String>,

    /// Command timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub command_timeout: Option<u64>,

    /// Environment code for environment-specific scripts
    #[arg(long)]
    pub environment: Option<String>,

    /// Resume a version that failed part way
    #[arg(long)]
    pub continue_after_failure: bool,

    /// Run every script in its own transaction
    #[arg(long)]
    pub no_transaction: bool,

    /// Re-run applied scripts that changed on disk while resuming
    #[arg(long)]
    pub force_reapply: bool,

    /// Fail when a script holds a token without a value
    #[arg(long)]
    pub strict_tokens: bool,

    /// Principal recorded in the ledger
    #[arg(long)]
    pub applied_by: Option<String>,
}

// =============================================================================
// List Command
// =============================================================================

/// Arguments for the `list` command
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print the ledger as JSON
    #[arg(long)]
    pub json: bool,

    /// Schema of the ledger table
    #[arg(long)]
    pub meta_schema: Option<String>,

    /// Name of the ledger table
    #[arg(long)]
    pub meta_table: Option<String>,
}

// =============================================================================
// Erase Command
// =============================================================================

/// Arguments for the `erase` command
#[derive(Args, Debug, Clone, Default)]
pub struct EraseArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Token value, as KEY=VALUE (repeatable)
    #[arg(short = 'k', long = "token", value_name = "KEY=VALUE")]
    pub tokens: Vec<String>,

    /// Environment code for environment-specific scripts
    #[arg(long)]
    pub environment: Option<String>,

    /// Command timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub command_timeout: Option<u64>,
}
