//! Tests for config file discovery.

use jsenv_config::{ConfigDiscovery, ConfigError};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn loads_full_toml_config() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("jsenv.toml"),
        r#"
[build]
project_directory = "src"
build_directory = "out"
entry_points = ["main.html", "admin.html"]
sourcemaps = "file"
base = "/static/"

[build.runtime_compat]
chrome = "89"
firefox = "90"

[[build.preserved_urls]]
pattern = "https://cdn.example.com/*"
preserve = false

[[build.subbuilds]]
name = "sw"
directory = "worker"
project_directory = "sw"
entry_points = ["sw.js"]

[dev]
port = 4000
autoreload = false

[settings]
log_level = "debug"
"#,
    )
    .expect("write config");

    let config = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(config.build.project_directory, PathBuf::from("src"));
    assert_eq!(config.build.build_directory, PathBuf::from("out"));
    assert_eq!(config.build.entry_points.len(), 2);
    assert_eq!(config.build.sourcemaps, "file");
    assert_eq!(config.build.base.as_deref(), Some("/static/"));
    assert_eq!(config.build.runtime_compat["chrome"], "89");
    assert!(!config.build.preserved_urls[0].preserve);
    assert_eq!(config.build.subbuilds[0].directory, "worker");
    assert_eq!(config.dev.port, 4000);
    assert!(!config.dev.autoreload);
    assert_eq!(config.settings.log_level.as_deref(), Some("debug"));
}

#[test]
fn loads_package_json_field() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("package.json"),
        r#"{
            "name": "app",
            "jsenv": { "build": { "entry_points": ["index.html"] } }
        }"#,
    )
    .expect("write package.json");

    let config = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(config.build.entry_points, vec!["index.html".to_string()]);
}

#[test]
fn invalid_toml_reports_the_file() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("jsenv.toml"), "[build\nentry_points = 1").expect("write");

    let error = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    match error {
        ConfigError::InvalidValue { field, hint } => {
            assert_eq!(field, "jsenv.toml");
            assert!(hint.unwrap().contains("TOML"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn wrong_value_type_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("jsenv.toml"), "[build]\nminify = \"yes\"\n").expect("write");

    assert!(matches!(
        ConfigDiscovery::new(dir.path()).load(),
        Err(ConfigError::InvalidValue { .. })
    ));
}
