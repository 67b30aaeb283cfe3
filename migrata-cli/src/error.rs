//! CLI error types and result alias.

use miette::Diagnostic;
use migrata_core::{MigrationError, Platform};
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(migrata::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(migrata::config), help("see `migrata --help` for the available options"))]
    Config(String),

    /// Migration failure, prefixed with its kind
    #[error("{kind}: {0}", kind = .0.kind())]
    #[diagnostic(code(migrata::migration))]
    Migration(#[from] MigrationError),

    /// Platform without a compiled-in driver
    #[error("the {0} driver is not enabled in this build")]
    #[diagnostic(
        code(migrata::platform),
        help("rebuild with `--features {0}` or `--features full`")
    )]
    UnsupportedPlatform(Platform),

    /// Output serialization error
    #[error("Output error: {0}")]
    #[diagnostic(code(migrata::output))]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}
