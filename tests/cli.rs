//! CLI smoke tests for `drover admin init`.

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;

#[test]
fn test_init_creates_database_and_token() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("drover")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Admin token"))
        .stdout(predicate::str::contains("Default namespace: default"));

    temp.child("drover.db").assert(predicate::path::exists());
    temp.child(".admin_token")
        .assert(predicate::str::starts_with("drover_"));
}

#[test]
fn test_init_twice_fails() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("drover")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success();

    Command::cargo_bin("drover")
        .unwrap()
        .args(["admin", "init", "--non-interactive", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_serve_without_init_fails() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("drover")
        .unwrap()
        .args(["serve", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
