//! Integration tests for the migrata CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get the migrata binary with a clean environment
#[allow(deprecated)]
fn migrata_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("migrata").unwrap();
    cmd.current_dir(dir)
        .env_remove("MIGRATA_PLATFORM")
        .env_remove("MIGRATA_CONNECTION_STRING")
        .env_remove("MIGRATA_WORKSPACE")
        .env_remove("RUST_LOG");
    cmd
}

/// Workspace `db/` with two versions and an erase script
fn sqlite_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("db");
    for dir in ["v0.00", "v0.01", "_erase"] {
        fs::create_dir_all(db.join(dir)).unwrap();
    }
    fs::write(
        db.join("v0.00").join("01_customer.sql"),
        "CREATE TABLE customer (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    )
    .unwrap();
    fs::write(
        db.join("v0.01").join("01_add_column.sql"),
        "ALTER TABLE customer ADD COLUMN {{column}} TEXT;",
    )
    .unwrap();
    fs::write(
        db.join("_erase").join("01_drop.sql"),
        "DROP TABLE IF EXISTS customer;",
    )
    .unwrap();
    temp_dir
}

fn sqlite_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["--platform", "sqlite", "-c", "data/app.db", "-p", "db"];
    args.extend_from_slice(extra);
    args
}

#[test]
fn test_help_command() {
    let temp_dir = TempDir::new().unwrap();
    migrata_cmd(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("versioned database migrations"))
        .stdout(predicate::str::contains("Usage: migrata"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("vnext"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("erase"));
}

#[test]
fn test_version_command() {
    let temp_dir = TempDir::new().unwrap();
    migrata_cmd(temp_dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("sqlite"));
}

#[test]
fn test_run_help_lists_options() {
    let temp_dir = TempDir::new().unwrap();
    migrata_cmd(temp_dir.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--target-version"))
        .stdout(predicate::str::contains("--continue-after-failure"))
        .stdout(predicate::str::contains("--no-transaction"))
        .stdout(predicate::str::contains("--bulk-batch-size"));
}

#[test]
fn test_init_creates_workspace() {
    let temp_dir = TempDir::new().unwrap();

    migrata_cmd(temp_dir.path())
        .args(["init", "-p", "db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workspace ready"));

    let root = temp_dir.path().join("db");
    for dir in ["_init", "_pre", "v0.00", "_post", "_erase"] {
        assert!(root.join(dir).is_dir(), "{dir} should exist");
    }
    assert!(root.join("README.md").exists());
    assert!(root.join("migrata.toml").exists());

    // A second init keeps the existing files
    migrata_cmd(temp_dir.path())
        .args(["init", "-p", "db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_vnext_creates_versions() {
    let temp_dir = TempDir::new().unwrap();
    migrata_cmd(temp_dir.path())
        .args(["init", "-p", "db"])
        .assert()
        .success();

    migrata_cmd(temp_dir.path())
        .args(["vnext", "-p", "db", "-f", "create_orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created v0.01"));
    assert!(
        temp_dir
            .path()
            .join("db/v0.01/create_orders.sql")
            .exists()
    );

    migrata_cmd(temp_dir.path())
        .args(["vnext", "-p", "db", "--major"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created v1.00"));
}

#[test]
fn test_run_then_nothing_to_apply() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-a", "-k", "column=email"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 2 versions (2 scripts)"));
    assert!(temp_dir.path().join("data/app.db").exists());

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-k", "column=email"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to apply"));
}

#[test]
fn test_target_version_and_list_json() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-a", "-t", "v0.00"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 versions (1 scripts)"));

    let output = migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["list", "--json"]))
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["version"], "v0.00");
    assert_eq!(rows[0]["script"], "01_customer.sql");
    assert_eq!(rows[0]["status"], "succeeded");
    assert_eq!(rows[1]["script"], "");
}

#[test]
fn test_verify_does_not_create_database() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["verify", "-a"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Verified: 2 pending versions (2 scripts)"));
    assert!(!temp_dir.path().join("data/app.db").exists());
}

#[test]
fn test_missing_database_fails() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run"]))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("TargetDatabaseMissingError"));
}

#[test]
fn test_failed_script_exits_with_kind() {
    let temp_dir = sqlite_workspace();
    fs::write(
        temp_dir.path().join("db/v0.01/02_broken.sql"),
        "INSERT INTO no_such_table VALUES (1);",
    )
    .unwrap();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-a", "-k", "column=email"]))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ScriptExecutionError"))
        .stderr(predicate::str::contains("02_broken.sql"));

    // v0.00 stays applied, v0.01 left nothing behind
    let conn = rusqlite::Connection::open(temp_dir.path().join("data/app.db")).unwrap();
    let columns: Vec<String> = conn
        .prepare("SELECT name FROM pragma_table_info('customer')")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, vec!["id", "name"]);
}

#[test]
fn test_erase_with_force() {
    let temp_dir = sqlite_workspace();
    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-a", "-k", "column=email"]))
        .assert()
        .success();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["erase", "--force"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("Erase finished: 1 scripts"));

    let conn = rusqlite::Connection::open(temp_dir.path().join("data/app.db")).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'customer'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn test_erase_can_be_declined() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["erase"]))
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Erase cancelled"));
}

#[test]
fn test_config_file_supplies_defaults() {
    let temp_dir = sqlite_workspace();
    fs::write(
        temp_dir.path().join("migrata.toml"),
        r#"
platform = "sqlite"
workspace = "db"
connection_string = "data/app.db"
auto_create_database = true

[tokens]
column = "phone"
"#,
    )
    .unwrap();

    migrata_cmd(temp_dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 2 versions"));

    let conn = rusqlite::Connection::open(temp_dir.path().join("data/app.db")).unwrap();
    let phone: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('customer') WHERE name = 'phone'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(phone, 1);
}

#[test]
fn test_missing_connection_string() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(["run", "--platform", "sqlite", "-p", "db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no connection string"));
}

#[test]
fn test_invalid_token_is_rejected() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(sqlite_args(&["run", "-k", "column"]))
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidConfigurationError"));
}

#[cfg(not(feature = "mysql"))]
#[test]
fn test_platform_without_driver() {
    let temp_dir = sqlite_workspace();

    migrata_cmd(temp_dir.path())
        .args(["run", "--platform", "mysql", "-c", "mysql://localhost/app", "-p", "db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("driver is not enabled"));
}
