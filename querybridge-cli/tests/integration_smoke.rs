//! Smoke tests to verify command wiring

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn querybridge() -> Command {
    let mut cmd = Command::cargo_bin("querybridge").unwrap();
    cmd.env_remove("QUERYBRIDGE_CONFIG").env_remove("RUST_LOG");
    cmd
}

// === Help ===

#[test]
fn test_serve_help() {
    querybridge()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--database-url"))
        .stdout(predicate::str::contains("--skip-migrations"));
}

// === import-csv ===

#[test]
fn test_import_csv_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(&path, "a,b,c\n1,2,3\n4,5,6\n").unwrap();

    let output = querybridge().arg("import-csv").arg(&path).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value,
        serde_json::json!([
            {"a": "1", "b": "2", "c": "3"},
            {"a": "4", "b": "5", "c": "6"}
        ])
    );
}

#[test]
fn test_import_csv_stdin() {
    querybridge()
        .arg("import-csv")
        .write_stdin("name,city\nAl,Oslo\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"city":"Oslo","name":"Al"}"#));
}

#[test]
fn test_import_csv_missing_file_fails() {
    querybridge()
        .arg("import-csv")
        .arg("/definitely/not/here.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

// === config ===

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    querybridge()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    querybridge()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    querybridge()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("allow_raw_sql = true"))
        .stdout(predicate::str::contains("127.0.0.1:8080"));
}

#[test]
fn test_config_show_masks_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[database]\nurl = \"postgres://app:hunter2@db:5432/app\"\n",
    )
    .unwrap();

    querybridge()
        .args(["config", "show"])
        .env("QUERYBRIDGE_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains(":***@"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_path_honors_override() {
    querybridge()
        .args(["config", "path", "--config", "/tmp/qb-test.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/qb-test.toml"));
}
