use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 5] = [
    "AIRTABLE_API_KEY",
    "AIRTABLE_BASE_ID",
    "WEBFLOW_API_KEY",
    "WEBFLOW_COLLECTION_ID",
    "PORT",
];

fn tablesync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tablesync").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();

    tablesync(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Keeps a Webflow collection in line with an Airtable table",
        ))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("records"))
        .stdout(predicate::str::contains("items"));

    tablesync(&dir).arg("--version").assert().success();
}

#[test]
fn test_usage_errors() {
    let dir = TempDir::new().unwrap();

    tablesync(&dir).assert().failure().code(2);
    tablesync(&dir).arg("frobnicate").assert().failure().code(2);
    tablesync(&dir)
        .arg("records")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("<COLLECTION>"));
}

#[test]
fn test_sync_without_credentials_fails() {
    let dir = TempDir::new().unwrap();

    tablesync(&dir)
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("source.api_key"));
}

#[test]
fn test_target_credentials_checked_for_items() {
    let dir = TempDir::new().unwrap();

    tablesync(&dir)
        .arg("items")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("target.api_key"));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.toml"), "[server\nport = ").unwrap();

    tablesync(&dir)
        .args(["--config", "broken.toml", "plan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}

#[test]
fn test_invalid_port_from_environment() {
    let dir = TempDir::new().unwrap();

    tablesync(&dir)
        .arg("serve")
        .env("PORT", "not-a-port")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value for PORT"));
}
