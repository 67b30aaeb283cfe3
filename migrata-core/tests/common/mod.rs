//! In-memory data service for engine tests.
//!
//! Statements are recorded instead of executed. Ledger statements use a small
//! line protocol the fake understands. A script statement containing `FAIL`
//! returns a database error and one containing `SLEEP` never finishes in time.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use migrata_core::{
    BulkImportService, DataService, LedgerStatements, MigrateResult, MigrationError, Platform,
    TextRow,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub statements: Vec<String>,
    pub ledger: Option<Vec<TextRow>>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub database_exists: bool,
    pub committed: Snapshot,
    pub transaction: Option<Snapshot>,
    pub executes: usize,
    pub transactions: usize,
}

impl FakeState {
    fn current(&mut self) -> &mut Snapshot {
        match self.transaction.as_mut() {
            Some(tx) => tx,
            None => &mut self.committed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeDataService {
    state: Arc<Mutex<FakeState>>,
    transactional_ddl: bool,
}

impl FakeDataService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                database_exists: true,
                ..Default::default()
            })),
            transactional_ddl: true,
        }
    }

    pub fn missing_database() -> Self {
        let fake = Self::new();
        fake.state().database_exists = false;
        fake
    }

    pub fn without_transactional_ddl(mut self) -> Self {
        self.transactional_ddl = false;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().committed.clone()
    }

    /// Committed script statements, ledger traffic excluded.
    pub fn statements(&self) -> Vec<String> {
        self.snapshot().statements
    }

    /// Committed ledger rows as `(version, script, status)`.
    pub fn ledger(&self) -> Vec<(String, String, String)> {
        self.snapshot()
            .ledger
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                (
                    row[0].clone().unwrap_or_default(),
                    row[1].clone().unwrap_or_default(),
                    row[3].clone().unwrap_or_default(),
                )
            })
            .collect()
    }
}

fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('|', "%7C")
        .replace('\n', "%0A")
}

fn decode(value: &str) -> String {
    value
        .replace("%0A", "\n")
        .replace("%7C", "|")
        .replace("%25", "%")
}

fn parse_value(field: &str) -> Option<String> {
    if field == "NULL" {
        None
    } else {
        let inner = field
            .strip_prefix('\'')
            .and_then(|f| f.strip_suffix('\''))
            .unwrap_or(field);
        Some(decode(&inner.replace("''", "'")))
    }
}

#[async_trait]
impl DataService for FakeDataService {
    fn platform(&self) -> Platform {
        if self.transactional_ddl {
            Platform::PostgreSql
        } else {
            Platform::MySql
        }
    }

    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    fn is_transactional_ddl_supported(&self) -> bool {
        self.transactional_ddl
    }

    fn ledger_statements(&self) -> LedgerStatements {
        LedgerStatements {
            create_schema: None,
            create_table: "LEDGER CREATE {{LEDGER_TABLE}}",
            table_exists: "LEDGER EXISTS {{LEDGER_TABLE}}",
            select_records: "LEDGER SELECT {{LEDGER_TABLE}}",
            delete_record: "LEDGER DELETE {{VERSION}}|{{SCRIPT}}",
            insert_record: "LEDGER INSERT {{VERSION}}|{{SCRIPT}}|{{CHECKSUM}}|{{STATUS}}|{{APPLIED_ON}}|{{APPLIED_BY_USER}}|{{APPLIED_BY_TOOL}}|{{APPLIED_BY_TOOL_VERSION}}|{{DURATION_MS}}|{{ERROR_MESSAGE}}",
        }
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", encode(value).replace('\'', "''"))
    }

    fn database_name(&self) -> String {
        "fake".to_string()
    }

    async fn connect(&mut self, connection_string: &str) -> MigrateResult<()> {
        if connection_string.is_empty() {
            return Err(MigrationError::connection("empty connection string"));
        }
        Ok(())
    }

    async fn database_exists(&mut self) -> MigrateResult<bool> {
        Ok(self.state().database_exists)
    }

    async fn create_database(&mut self) -> MigrateResult<()> {
        self.state().database_exists = true;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> MigrateResult<()> {
        let mut state = self.state();
        if state.transaction.is_some() {
            return Err(MigrationError::database("transaction already open"));
        }
        state.transaction = Some(state.committed.clone());
        state.transactions += 1;
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        let mut state = self.state();
        let tx = state
            .transaction
            .take()
            .ok_or_else(|| MigrationError::database("no open transaction"))?;
        state.committed = tx;
        Ok(())
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.state().transaction = None;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        let ledger_traffic = sql.starts_with("LEDGER ");
        if !ledger_traffic && sql.contains("SLEEP") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        let mut state = self.state();
        if !state.database_exists {
            return Err(MigrationError::database("database does not exist"));
        }
        state.executes += 1;

        if !ledger_traffic && sql.contains("FAIL") {
            return Err(MigrationError::database(format!("error executing: {sql}")));
        }

        let snapshot = state.current();
        if let Some(rest) = sql.strip_prefix("LEDGER ") {
            let (command, args) = rest.split_once(' ').unwrap_or((rest, ""));
            match command {
                "CREATE" => {
                    snapshot.ledger.get_or_insert_with(Vec::new);
                }
                "DELETE" => {
                    let fields: Vec<Option<String>> = args.split('|').map(parse_value).collect();
                    let ledger = snapshot
                        .ledger
                        .as_mut()
                        .ok_or_else(|| MigrationError::database("ledger table missing"))?;
                    ledger.retain(|row| row[0] != fields[0] || row[1] != fields[1]);
                }
                "INSERT" => {
                    let row: TextRow = args.split('|').map(parse_value).collect();
                    snapshot
                        .ledger
                        .as_mut()
                        .ok_or_else(|| MigrationError::database("ledger table missing"))?
                        .push(row);
                }
                other => panic!("unknown ledger command {other}"),
            }
        } else {
            snapshot.statements.push(sql.to_string());
        }
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> MigrateResult<Vec<TextRow>> {
        let mut state = self.state();
        if !state.database_exists {
            return Err(MigrationError::database("database does not exist"));
        }
        let snapshot = state.current();
        match sql {
            s if s.starts_with("LEDGER EXISTS") => Ok(snapshot
                .ledger
                .as_ref()
                .map(|_| vec![vec![Some("1".to_string())]])
                .unwrap_or_default()),
            s if s.starts_with("LEDGER SELECT") => snapshot
                .ledger
                .clone()
                .ok_or_else(|| MigrationError::database("ledger table missing")),
            other => panic!("unexpected query {other}"),
        }
    }
}

impl BulkImportService for FakeDataService {}

/// Write files under `root`, creating directories as needed.
pub async fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, content).await.unwrap();
    }
}
