//! Run, erase and host configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::ledger::Audit;
use crate::platform::Platform;
use crate::tokens::Tokens;
use crate::version::Version;

/// Tool name recorded in the ledger.
pub const TOOL_NAME: &str = "migrata";

/// Tool version recorded in the ledger.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default command timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Highest version to apply.
    pub target_version: Option<String>,
    /// Create the target database when it does not exist.
    pub auto_create_database: bool,
    /// `{{token}}` values.
    pub tokens: Tokens,
    /// Report what would run without changing anything.
    pub verify_only: bool,
    /// Field separator for bulk files.
    pub bulk_separator: char,
    /// Rows per bulk batch; `0` sends all rows at once.
    pub bulk_batch_size: usize,
    /// Ledger schema; the platform default when `None`.
    pub meta_schema_name: Option<String>,
    /// Ledger table; `__migrata_ledger` when `None`.
    pub meta_table_name: Option<String>,
    /// Timeout for each database call.
    pub command_timeout: Duration,
    /// Tool name recorded in the ledger.
    pub applied_by_tool: String,
    /// Tool version recorded in the ledger.
    pub applied_by_tool_version: String,
    /// Principal recorded in the ledger; the database user when `None`.
    pub applied_by_user: Option<String>,
    /// Environment code for `env-<code>` scripts.
    pub environment: Option<String>,
    /// Continue a partially applied version.
    pub resume_after_failure: bool,
    /// Run each script on its own instead of one transaction per version.
    pub no_transaction: bool,
    /// Re-run drifted scripts during resume instead of failing.
    pub force_reapply: bool,
    /// Treat unresolved tokens as errors.
    pub strict_tokens: bool,
    /// Trace script text.
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target_version: None,
            auto_create_database: false,
            tokens: Tokens::new(),
            verify_only: false,
            bulk_separator: ',',
            bulk_batch_size: 0,
            meta_schema_name: None,
            meta_table_name: None,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            applied_by_tool: TOOL_NAME.to_string(),
            applied_by_tool_version: TOOL_VERSION.to_string(),
            applied_by_user: None,
            environment: None,
            resume_after_failure: false,
            no_transaction: false,
            force_reapply: false,
            strict_tokens: false,
            debug: false,
        }
    }
}

impl RunOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the highest version to apply.
    pub fn target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }

    /// Create the database when missing.
    pub fn auto_create_database(mut self, enabled: bool) -> Self {
        self.auto_create_database = enabled;
        self
    }

    /// Add a token value.
    pub fn token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(key.into(), value.into());
        self
    }

    /// Replace all token values.
    pub fn tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = tokens;
        self
    }

    /// Enable verify-only mode.
    pub fn verify_only(mut self, enabled: bool) -> Self {
        self.verify_only = enabled;
        self
    }

    /// Set the bulk field separator.
    pub fn bulk_separator(mut self, separator: char) -> Self {
        self.bulk_separator = separator;
        self
    }

    /// Set the bulk batch size.
    pub fn bulk_batch_size(mut self, size: usize) -> Self {
        self.bulk_batch_size = size;
        self
    }

    /// Set the ledger schema.
    pub fn meta_schema_name(mut self, schema: impl Into<String>) -> Self {
        self.meta_schema_name = Some(schema.into());
        self
    }

    /// Set the ledger table.
    pub fn meta_table_name(mut self, table: impl Into<String>) -> Self {
        self.meta_table_name = Some(table.into());
        self
    }

    /// Set the command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the tool name and version recorded in the ledger.
    pub fn applied_by_tool(mut self, tool: impl Into<String>, version: impl Into<String>) -> Self {
        self.applied_by_tool = tool.into();
        self.applied_by_tool_version = version.into();
        self
    }

    /// Set the principal recorded in the ledger.
    pub fn applied_by_user(mut self, user: impl Into<String>) -> Self {
        self.applied_by_user = Some(user.into());
        self
    }

    /// Set the environment code.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Resume a partially applied version.
    pub fn resume_after_failure(mut self, enabled: bool) -> Self {
        self.resume_after_failure = enabled;
        self
    }

    /// Disable per-version transactions.
    pub fn no_transaction(mut self, enabled: bool) -> Self {
        self.no_transaction = enabled;
        self
    }

    /// Re-run drifted scripts during resume.
    pub fn force_reapply(mut self, enabled: bool) -> Self {
        self.force_reapply = enabled;
        self
    }

    /// Fail on unresolved tokens.
    pub fn strict_tokens(mut self, enabled: bool) -> Self {
        self.strict_tokens = enabled;
        self
    }

    /// Trace script text.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// The parsed target version.
    pub fn ceiling(&self) -> MigrateResult<Option<Version>> {
        self.target_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(Version::parse)
            .transpose()
    }

    /// Audit values for ledger rows.
    pub fn audit(&self) -> Audit {
        Audit {
            applied_by_user: self.applied_by_user.clone(),
            tool: self.applied_by_tool.clone(),
            tool_version: self.applied_by_tool_version.clone(),
        }
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.command_timeout.is_zero() {
            return Err(MigrationError::invalid_configuration(
                "command timeout must be greater than zero",
            ));
        }
        if matches!(self.bulk_separator, '"' | '\n' | '\r') {
            return Err(MigrationError::invalid_configuration(format!(
                "{:?} cannot be used as bulk separator",
                self.bulk_separator
            )));
        }
        self.ceiling()?;
        Ok(())
    }
}

/// Options for the erase flow.
#[derive(Debug, Clone)]
pub struct EraseOptions {
    /// `{{token}}` values.
    pub tokens: Tokens,
    /// Environment code for `env-<code>` scripts.
    pub environment: Option<String>,
    /// Timeout for each database call.
    pub command_timeout: Duration,
    /// Trace script text.
    pub debug: bool,
}

impl Default for EraseOptions {
    fn default() -> Self {
        Self {
            tokens: Tokens::new(),
            environment: None,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            debug: false,
        }
    }
}

impl EraseOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token value.
    pub fn token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(key.into(), value.into());
        self
    }

    /// Replace all token values.
    pub fn tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = tokens;
        self
    }

    /// Set the environment code.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Trace script text.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl From<&RunOptions> for EraseOptions {
    fn from(options: &RunOptions) -> Self {
        Self {
            tokens: options.tokens.clone(),
            environment: options.environment.clone(),
            command_timeout: options.command_timeout,
            debug: options.debug,
        }
    }
}

/// Startup configuration for hosts that migrate before serving.
///
/// ```toml
/// workspace = "./db"
/// connection_string = "postgres://app@localhost/inventory"
/// auto_create_database = true
/// environment = "dev"
///
/// [tokens]
/// schema = "sales"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Skip migrations entirely.
    pub enabled: bool,
    /// Target engine, for hosts that pick a driver at runtime.
    pub platform: Option<Platform>,
    /// Workspace root.
    pub workspace: PathBuf,
    /// Connection string of the target database.
    pub connection_string: Option<String>,
    /// Highest version to apply.
    pub target_version: Option<String>,
    /// Create the target database when missing.
    pub auto_create_database: bool,
    /// `{{token}}` values.
    pub tokens: Tokens,
    /// Report without changing anything.
    pub verify_only: bool,
    /// Bulk field separator.
    pub bulk_separator: char,
    /// Rows per bulk batch.
    pub bulk_batch_size: usize,
    /// Ledger schema.
    pub meta_schema_name: Option<String>,
    /// Ledger table.
    pub meta_table_name: Option<String>,
    /// Command timeout in seconds.
    pub command_timeout_secs: u64,
    /// Tool name recorded in the ledger.
    pub applied_by_tool: Option<String>,
    /// Tool version recorded in the ledger.
    pub applied_by_tool_version: Option<String>,
    /// Principal recorded in the ledger.
    pub applied_by_user: Option<String>,
    /// Environment code.
    pub environment: Option<String>,
    /// Resume a partially applied version.
    pub continue_after_failure: bool,
    /// Disable per-version transactions.
    pub no_transaction: bool,
    /// Re-run drifted scripts during resume.
    pub force_reapply: bool,
    /// Fail on unresolved tokens.
    pub strict_tokens: bool,
    /// Trace script text.
    pub debug: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: true,
            platform: None,
            workspace: PathBuf::from("."),
            connection_string: None,
            target_version: None,
            auto_create_database: false,
            tokens: Tokens::new(),
            verify_only: false,
            bulk_separator: ',',
            bulk_batch_size: 0,
            meta_schema_name: None,
            meta_table_name: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            applied_by_tool: None,
            applied_by_tool_version: None,
            applied_by_user: None,
            environment: None,
            continue_after_failure: false,
            no_transaction: false,
            force_reapply: false,
            strict_tokens: false,
            debug: false,
        }
    }
}

impl Configuration {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        toml::from_str(content)
            .map_err(|e| MigrationError::invalid_configuration(e.to_string()))
    }

    /// Load a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::invalid_configuration(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Map to run options.
    pub fn to_run_options(&self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            target_version: self.target_version.clone(),
            auto_create_database: self.auto_create_database,
            tokens: self.tokens.clone(),
            verify_only: self.verify_only,
            bulk_separator: self.bulk_separator,
            bulk_batch_size: self.bulk_batch_size,
            meta_schema_name: self.meta_schema_name.clone(),
            meta_table_name: self.meta_table_name.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            applied_by_tool: self
                .applied_by_tool
                .clone()
                .unwrap_or(defaults.applied_by_tool),
            applied_by_tool_version: self
                .applied_by_tool_version
                .clone()
                .unwrap_or(defaults.applied_by_tool_version),
            applied_by_user: self.applied_by_user.clone(),
            environment: self.environment.clone(),
            resume_after_failure: self.continue_after_failure,
            no_transaction: self.no_transaction,
            force_reapply: self.force_reapply,
            strict_tokens: self.strict_tokens,
            debug: self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options_defaults() {
        let options = RunOptions::new();
        assert_eq!(options.bulk_separator, ',');
        assert_eq!(options.bulk_batch_size, 0);
        assert_eq!(options.command_timeout, Duration::from_secs(30));
        assert_eq!(options.applied_by_tool, "migrata");
        assert_eq!(options.applied_by_tool_version, TOOL_VERSION);
        assert!(!options.no_transaction);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_run_options_builder() {
        let options = RunOptions::new()
            .target_version("v0.02")
            .token("schema", "sales")
            .environment("dev")
            .no_transaction(true)
            .resume_after_failure(true);

        assert_eq!(options.ceiling().unwrap().unwrap().as_str(), "v0.02");
        assert_eq!(options.tokens.get("schema").map(String::as_str), Some("sales"));
        assert_eq!(options.environment.as_deref(), Some("dev"));

        let erase = EraseOptions::from(&options);
        assert_eq!(erase.environment.as_deref(), Some("dev"));
        assert_eq!(erase.tokens.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RunOptions::new().target_version("latest").validate().is_err());
        assert!(RunOptions::new().bulk_separator('"').validate().is_err());
        assert!(RunOptions::new()
            .command_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_configuration_from_toml() {
        let config = Configuration::from_toml_str(
            r#"
            workspace = "./db"
            platform = "sqlite"
            auto_create_database = true
            bulk_separator = ";"
            command_timeout_secs = 5
            continue_after_failure = true

            [tokens]
            schema = "sales"
            "#,
        )
        .unwrap();

        assert_eq!(config.platform, Some(Platform::Sqlite));
        assert!(config.enabled);

        let options = config.to_run_options();
        assert!(options.auto_create_database);
        assert!(options.resume_after_failure);
        assert_eq!(options.bulk_separator, ';');
        assert_eq!(options.command_timeout, Duration::from_secs(5));
        assert_eq!(options.applied_by_tool, "migrata");
        assert_eq!(options.tokens.get("schema").map(String::as_str), Some("sales"));
    }

    #[test]
    fn test_configuration_rejects_unknown_platform() {
        assert!(Configuration::from_toml_str("platform = \"oracle\"").is_err());
    }
}
