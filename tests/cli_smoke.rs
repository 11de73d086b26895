use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn ynab2firefly_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ynab2firefly"));
    cmd.env_remove("FIREFLY_III_URL");
    cmd.env_remove("FIREFLY_III_ACCESS_TOKEN");
    cmd
}

#[test]
fn no_arguments_prints_usage() {
    ynab2firefly_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn import_requires_the_three_paths() {
    ynab2firefly_cmd()
        .arg("import")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    ynab2firefly_cmd()
        .arg("import")
        .arg(dir.path().join("nope.json"))
        .arg(dir.path().join("register.csv"))
        .arg(dir.path().join("budget.csv"))
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn live_import_requires_url_and_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{}").expect("write config");

    ynab2firefly_cmd()
        .arg("import")
        .arg(&config)
        .arg(dir.path().join("register.csv"))
        .arg(dir.path().join("budget.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--firefly-url"));
}

#[test]
fn bad_min_date_is_rejected_by_the_parser() {
    let dir = tempfile::tempdir().expect("tempdir");
    ynab2firefly_cmd()
        .arg("import")
        .arg(dir.path().join("config.json"))
        .arg(dir.path().join("register.csv"))
        .arg(dir.path().join("budget.csv"))
        .arg("--dry-run")
        .arg("--min-date")
        .arg("not-a-date")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--min-date"));
}
