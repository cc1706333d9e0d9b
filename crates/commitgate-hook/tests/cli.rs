use assert_cmd::Command;
use predicates::prelude::*;

fn commitgate() -> Command {
    Command::cargo_bin("commitgate").unwrap()
}

#[test]
fn help_lists_both_hooks() {
    commitgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pre-commit"))
        .stdout(predicate::str::contains("post-commit"));
}

#[test]
fn version_prints() {
    commitgate().arg("--version").assert().success();
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    commitgate().assert().failure();
}

#[test]
fn pre_commit_against_missing_repository_rejects() {
    commitgate()
        .args([
            "pre-commit",
            "--repos",
            "/nonexistent/repository",
            "--txn",
            "1-1",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty().not());
}

#[test]
fn bad_config_file_rejects_with_diagnostic() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("commitgate.yaml");
    std::fs::write(&config, "branches: [not, a, mapping]").unwrap();

    commitgate()
        .args(["pre-commit", "--repos", "/tmp", "--txn", "1-1"])
        .env("COMMITGATE_CONFIG", &config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("commitgate.yaml"));
}
