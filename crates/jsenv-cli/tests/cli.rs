//! The `jsenv` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn jsenv() -> Command {
    let mut cmd = Command::cargo_bin("jsenv").unwrap();
    cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    jsenv()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build").and(predicate::str::contains("dev")));
}

#[test]
fn test_build_without_entries_fails() {
    let dir = TempDir::new().unwrap();
    jsenv()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry points"));
}

#[test]
fn test_build_writes_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("index.html"),
        "<script type=\"module\" src=\"./app.js\"></script>",
    )
    .unwrap();
    fs::write(dir.path().join("app.js"), "console.log(import.meta.dev);\n").unwrap();

    jsenv()
        .current_dir(dir.path())
        .args(["build", "index.html", "--out-dir", "out", "--no-versioning"])
        .assert()
        .success();

    let js = fs::read_to_string(dir.path().join("out/app.js")).unwrap();
    assert!(js.contains("console.log(undefined)"));
    assert!(dir.path().join("out/index.html").is_file());
}

#[test]
fn test_unknown_profile_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("jsenv.toml"),
        "[build]\nentry_points = [\"index.html\"]\n",
    )
    .unwrap();
    jsenv()
        .current_dir(dir.path())
        .args(["build", "--profile", "staging"])
        .env_remove("JSENV_PROFILE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn test_colored_output_starts() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("jsenv").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("NO_COLOR")
        .env("CLICOLOR_FORCE", "1")
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry points").and(predicate::str::contains("panicked").not()));
}
