//! The applied-version ledger.
//!
//! The ledger is a table in the target database with one row per applied
//! script and one marker row (empty script name) per fully applied version.
//! `_init` gets a marker row of its own so that it never runs twice.
//! Each data service supplies the SQL as [`LedgerStatements`] templates,
//! rendered here with the token replacer. Nothing is cached between calls.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::platform::{with_timeout, DataService, TextRow};
use crate::tokens::{replace_tokens, Tokens};
use crate::version::Version;

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "__migrata_ledger";

/// Version column of the marker row written once `_init` has run.
pub const INIT_MARKER: &str = "_init";

/// Format of timestamps written to the ledger.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// SQL templates for ledger access.
///
/// Available tokens:
///
/// - `{{LEDGER_TABLE}}`: quoted, schema-qualified table
/// - `{{LEDGER_SCHEMA}}`: quoted schema
/// - `{{LEDGER_SCHEMA_NAME}}` / `{{LEDGER_TABLE_NAME}}`: names as string
///   literals (`NULL` when no schema is set)
/// - `{{VERSION}}`, `{{SCRIPT}}`, `{{CHECKSUM}}`, `{{STATUS}}`,
///   `{{APPLIED_ON}}`, `{{APPLIED_BY_USER}}`, `{{APPLIED_BY_TOOL}}`,
///   `{{APPLIED_BY_TOOL_VERSION}}`, `{{DURATION_MS}}`, `{{ERROR_MESSAGE}}`:
///   row values as literals
///
/// `select_records` must return the columns in the order of
/// [`LedgerRecord`]'s fields, oldest row first.
#[derive(Debug, Clone, Copy)]
pub struct LedgerStatements {
    /// Creates the schema; run only when a schema is configured.
    pub create_schema: Option<&'static str>,
    /// Creates the table if it does not exist.
    pub create_table: &'static str,
    /// Returns at least one row when the table exists.
    pub table_exists: &'static str,
    /// Selects every row.
    pub select_records: &'static str,
    /// Deletes the row for `{{VERSION}}` / `{{SCRIPT}}`.
    pub delete_record: &'static str,
    /// Inserts one row.
    pub insert_record: &'static str,
}

/// Status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    /// Applied and committed.
    Succeeded,
    /// Failed; the script's work was not kept.
    Failed,
    /// Started in no-transaction mode and never finished.
    InProgress,
}

impl ScriptStatus {
    /// Stored text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::InProgress => "in_progress",
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "in_progress" => Ok(Self::InProgress),
            other => Err(MigrationError::database(format!(
                "unknown ledger status '{other}'"
            ))),
        }
    }
}

/// A persisted ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Version directory name.
    pub version: String,
    /// Script identifier; empty for the version marker.
    pub script: String,
    /// Script checksum; empty for the version marker.
    pub checksum: String,
    /// Row status.
    pub status: ScriptStatus,
    /// When the row was written.
    pub applied_on: DateTime<Utc>,
    /// Database principal that applied the script.
    pub applied_by_user: Option<String>,
    /// Tool name.
    pub applied_by_tool: String,
    /// Tool version.
    pub applied_by_tool_version: String,
    /// Execution time.
    pub duration_ms: i64,
    /// Failure message for failed rows.
    pub error_message: Option<String>,
}

impl LedgerRecord {
    /// Whether this is the row marking a fully applied version.
    pub fn is_version_marker(&self) -> bool {
        self.script.is_empty()
    }

    fn from_row(row: TextRow) -> MigrateResult<Self> {
        if row.len() < 10 {
            return Err(MigrationError::database(format!(
                "ledger row has {} columns, expected 10",
                row.len()
            )));
        }
        let mut cols = row.into_iter();
        let mut next = || cols.next().flatten();

        let version = next().unwrap_or_default();
        let script = next().unwrap_or_default();
        let checksum = next().unwrap_or_default();
        let status = next().unwrap_or_default().parse()?;
        let applied_on = parse_timestamp(&next().unwrap_or_default())?;
        let applied_by_user = next();
        let applied_by_tool = next().unwrap_or_default();
        let applied_by_tool_version = next().unwrap_or_default();
        let duration_ms = next()
            .and_then(|d| d.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let error_message = next();

        Ok(Self {
            version,
            script,
            checksum,
            status,
            applied_on,
            applied_by_user,
            applied_by_tool,
            applied_by_tool_version,
            duration_ms,
            error_message,
        })
    }
}

/// Parse a timestamp as rendered by any supported engine.
fn parse_timestamp(text: &str) -> MigrateResult<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = text
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim_end_matches("+00");
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(ts.and_utc());
        }
    }

    Err(MigrationError::database(format!(
        "unreadable ledger timestamp '{text}'"
    )))
}

/// Audit values written with every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    /// Explicit principal; the database's current user when `None`.
    pub applied_by_user: Option<String>,
    /// Tool name.
    pub tool: String,
    /// Tool version.
    pub tool_version: String,
}

/// One row to write.
#[derive(Debug, Clone, Copy)]
pub struct LedgerEntry<'a> {
    /// Version directory name.
    pub version: &'a str,
    /// Script identifier; empty for the version marker.
    pub script: &'a str,
    /// Script checksum.
    pub checksum: &'a str,
    /// Row status.
    pub status: ScriptStatus,
    /// Execution time.
    pub duration_ms: i64,
    /// Failure message.
    pub error_message: Option<&'a str>,
}

/// Access to the ledger table of one target.
#[derive(Debug, Clone)]
pub struct Ledger {
    schema: Option<String>,
    table: String,
    audit: Audit,
    timeout: Duration,
}

impl Ledger {
    /// Create a ledger handle. `schema` and `table` fall back to the
    /// platform defaults and must be plain identifiers.
    pub fn new<D: DataService + ?Sized>(
        service: &D,
        schema: Option<&str>,
        table: Option<&str>,
        audit: Audit,
        timeout: Duration,
    ) -> MigrateResult<Self> {
        let schema = schema
            .filter(|s| !s.is_empty())
            .or(service.default_schema())
            .map(str::to_string);
        let table = table
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_LEDGER_TABLE)
            .to_string();

        if let Some(schema) = &schema {
            validate_identifier("schema", schema)?;
        }
        validate_identifier("table", &table)?;

        Ok(Self {
            schema,
            table,
            audit,
            timeout,
        })
    }

    /// Schema name, if any.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn base_tokens<D: DataService + ?Sized>(&self, db: &D) -> Tokens {
        let mut tokens = Tokens::new();
        let table = db.quote_identifier(&self.table);
        let qualified = match &self.schema {
            Some(schema) => format!("{}.{}", db.quote_identifier(schema), table),
            None => table,
        };
        tokens.insert("LEDGER_TABLE".into(), qualified);
        tokens.insert(
            "LEDGER_SCHEMA".into(),
            self.schema
                .as_deref()
                .map(|s| db.quote_identifier(s))
                .unwrap_or_default(),
        );
        tokens.insert(
            "LEDGER_SCHEMA_NAME".into(),
            self.schema
                .as_deref()
                .map(|s| db.quote_literal(s))
                .unwrap_or_else(|| "NULL".to_string()),
        );
        tokens.insert("LEDGER_TABLE_NAME".into(), db.quote_literal(&self.table));
        tokens
    }

    fn render<D: DataService + ?Sized>(&self, db: &D, template: &str, tokens: &Tokens) -> String {
        let mut all = self.base_tokens(db);
        all.extend(tokens.iter().map(|(k, v)| (k.clone(), v.clone())));
        replace_tokens(template, &all).into_owned()
    }

    async fn execute<D: DataService + ?Sized>(&self, db: &mut D, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "Ledger statement");
        with_timeout(self.timeout, "ledger update", db.execute(sql)).await
    }

    async fn query<D: DataService + ?Sized>(
        &self,
        db: &mut D,
        sql: &str,
    ) -> MigrateResult<Vec<TextRow>> {
        debug!(sql = %sql, "Ledger query");
        with_timeout(self.timeout, "ledger query", db.query(sql)).await
    }

    /// Create the schema and table when absent.
    pub async fn ensure_schema<D: DataService + ?Sized>(&self, db: &mut D) -> MigrateResult<()> {
        let statements = db.ledger_statements();
        let tokens = Tokens::new();

        let to_init_error = |e: MigrationError| match e {
            MigrationError::Timeout { .. } => e,
            other => MigrationError::schema_init(other.to_string()),
        };

        if let (Some(_), Some(template)) = (&self.schema, statements.create_schema) {
            let sql = self.render(&*db, template, &tokens);
            self.execute(db, &sql).await.map_err(to_init_error)?;
        }

        let sql = self.render(&*db, statements.create_table, &tokens);
        self.execute(db, &sql).await.map_err(to_init_error)
    }

    /// Whether the ledger table exists. Never creates anything.
    pub async fn exists<D: DataService + ?Sized>(&self, db: &mut D) -> MigrateResult<bool> {
        let sql = self.render(&*db, db.ledger_statements().table_exists, &Tokens::new());
        Ok(!self.query(db, &sql).await?.is_empty())
    }

    /// Every row, oldest first.
    pub async fn all_records<D: DataService + ?Sized>(
        &self,
        db: &mut D,
    ) -> MigrateResult<Vec<LedgerRecord>> {
        let sql = self.render(&*db, db.ledger_statements().select_records, &Tokens::new());
        self.query(db, &sql)
            .await?
            .into_iter()
            .map(LedgerRecord::from_row)
            .collect()
    }

    /// Versions with a succeeded version marker.
    pub async fn applied_versions<D: DataService + ?Sized>(
        &self,
        db: &mut D,
    ) -> MigrateResult<BTreeSet<Version>> {
        Ok(self
            .all_records(db)
            .await?
            .into_iter()
            .filter(|r| r.is_version_marker() && r.status == ScriptStatus::Succeeded)
            .filter_map(|r| Version::parse(&r.version).ok())
            .collect())
    }

    /// Whether the `_init` scripts were applied in an earlier run.
    pub async fn init_applied<D: DataService + ?Sized>(&self, db: &mut D) -> MigrateResult<bool> {
        Ok(self.all_records(db).await?.into_iter().any(|r| {
            r.version == INIT_MARKER
                && r.is_version_marker()
                && r.status == ScriptStatus::Succeeded
        }))
    }

    /// Script rows of one version, without the version marker.
    pub async fn applied_scripts<D: DataService + ?Sized>(
        &self,
        db: &mut D,
        version: &Version,
    ) -> MigrateResult<Vec<LedgerRecord>> {
        Ok(self
            .all_records(db)
            .await?
            .into_iter()
            .filter(|r| !r.is_version_marker())
            .filter(|r| Version::parse(&r.version).is_ok_and(|v| v == *version))
            .collect())
    }

    /// Write (or replace) the row of one script.
    pub async fn record_script_result<D: DataService + ?Sized>(
        &self,
        db: &mut D,
        entry: LedgerEntry<'_>,
    ) -> MigrateResult<()> {
        let statements = db.ledger_statements();
        let tokens = self.entry_tokens(&*db, &entry);

        let delete = self.render(&*db, statements.delete_record, &tokens);
        self.execute(db, &delete).await?;
        let insert = self.render(&*db, statements.insert_record, &tokens);
        self.execute(db, &insert).await
    }

    /// Write the marker row of a fully applied version.
    pub async fn record_version_complete<D: DataService + ?Sized>(
        &self,
        db: &mut D,
        version: &str,
        duration_ms: i64,
    ) -> MigrateResult<()> {
        self.record_script_result(
            db,
            LedgerEntry {
                version,
                script: "",
                checksum: "",
                status: ScriptStatus::Succeeded,
                duration_ms,
                error_message: None,
            },
        )
        .await
    }

    fn entry_tokens<D: DataService + ?Sized>(&self, db: &D, entry: &LedgerEntry<'_>) -> Tokens {
        let literal = |value: &str| db.quote_literal(value);
        let mut tokens = Tokens::new();
        tokens.insert("VERSION".into(), literal(entry.version));
        tokens.insert("SCRIPT".into(), literal(entry.script));
        tokens.insert("CHECKSUM".into(), literal(entry.checksum));
        tokens.insert("STATUS".into(), literal(entry.status.as_str()));
        tokens.insert(
            "APPLIED_ON".into(),
            literal(&Utc::now().format(TIMESTAMP_FORMAT).to_string()),
        );
        tokens.insert(
            "APPLIED_BY_USER".into(),
            self.audit
                .applied_by_user
                .as_deref()
                .map(literal)
                .unwrap_or_else(|| "NULL".to_string()),
        );
        tokens.insert("APPLIED_BY_TOOL".into(), literal(&self.audit.tool));
        tokens.insert(
            "APPLIED_BY_TOOL_VERSION".into(),
            literal(&self.audit.tool_version),
        );
        tokens.insert("DURATION_MS".into(), entry.duration_ms.to_string());
        tokens.insert(
            "ERROR_MESSAGE".into(),
            entry
                .error_message
                .map(literal)
                .unwrap_or_else(|| "NULL".to_string()),
        );
        tokens
    }
}

fn validate_identifier(what: &str, name: &str) -> MigrateResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MigrationError::schema_init(format!(
            "ledger {what} name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}
