//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Keeps the user's real config, session and .env out of the picture.
fn text2sql(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("text2sql").unwrap();
    cmd.env("HOME", home.path())
        .env("TEXT2SQL_CONFIG", home.path().join("config.toml"))
        .env_remove("TEXT2SQL_ENDPOINT")
        .env_remove("OPENAI_API_KEY")
        .env_remove("DATABASE_URL");
    cmd
}

#[test]
fn test_top_level_help() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plain language"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ask"));
}

#[test]
fn test_serve_help() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--database-url"))
        .stdout(predicate::str::contains("--cors-origin"));
}

#[test]
fn test_db_add_help() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["db", "add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Connection URI"));
}

#[test]
fn test_ask_help() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_execute_requires_db_id() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .arg("execute")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DB_ID"));
}

#[test]
fn test_config_show_masks_api_key() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["config", "show"])
        .env("OPENAI_API_KEY", "sk-very-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("gpt-4o-mini"))
        .stdout(predicate::str::contains("sk-very-secret").not());
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("text2sql"));
}

#[test]
fn test_unreachable_server_reports_connection_error() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["--endpoint", "http://127.0.0.1:9", "db", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect to text2sql server"));
}

#[test]
fn test_whoami_without_login() {
    let home = TempDir::new().unwrap();
    text2sql(&home)
        .args(["auth", "whoami"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
