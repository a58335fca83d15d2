//! Tests for filesystem validation.

use jsenv_config::{BuildConfig, ConfigError, ConfigValidator, FsValidator, validate_fs};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn project(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(&path, "").expect("write file");
    }
    dir
}

fn config(entries: &[&str]) -> BuildConfig {
    BuildConfig {
        entry_points: entries.iter().map(|entry| entry.to_string()).collect(),
        ..BuildConfig::default()
    }
}

#[test]
fn validate_catches_missing_entry() {
    let dir = project(&[]);
    let result = FsValidator::new(dir.path()).validate(&config(&["src/missing.html"]));
    match result {
        Err(ConfigError::EntryNotFound { path }) => assert!(path.ends_with("src/missing.html")),
        other => panic!("expected EntryNotFound, got {other:?}"),
    }
}

#[test]
fn validate_succeeds_when_entries_exist() {
    let dir = project(&["main.html", "js/app.js"]);
    assert!(validate_fs(&config(&["main.html", "./js/app.js?v=1"]), dir.path()).is_ok());
}

#[test]
fn entries_resolve_against_project_directory() {
    let dir = project(&["src/main.html"]);
    let mut cfg = config(&["main.html"]);
    assert!(validate_fs(&cfg, dir.path()).is_err());
    cfg.project_directory = PathBuf::from("src");
    assert!(validate_fs(&cfg, dir.path()).is_ok());
}

#[test]
fn missing_project_directory() {
    let dir = project(&[]);
    let mut cfg = config(&["main.html"]);
    cfg.project_directory = PathBuf::from("nope");
    assert!(matches!(
        validate_fs(&cfg, dir.path()),
        Err(ConfigError::ProjectDirNotFound { .. })
    ));
}

#[test]
fn missing_import_map() {
    let dir = project(&["main.html"]);
    let mut cfg = config(&["main.html"]);
    cfg.import_map = Some(PathBuf::from("importmap.json"));
    assert!(matches!(
        validate_fs(&cfg, dir.path()),
        Err(ConfigError::ImportMapNotFound { .. })
    ));
}

#[test]
fn schema_errors_come_first() {
    let dir = project(&[]);
    assert!(matches!(
        validate_fs(&BuildConfig::default(), dir.path()),
        Err(ConfigError::NoEntries)
    ));
}
