//! Tests for configuration profiles.

use jsenv_config::{ConfigDiscovery, ConfigError};
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, toml: &str) {
    fs::write(dir.path().join("jsenv.toml"), toml).expect("write config");
}

#[test]
fn profile_overrides_build_options() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
[build]
entry_points = ["main.html"]
minify = false
sourcemaps = "inline"

[profiles.production.build]
minify = true
sourcemaps = "none"
"#,
    );

    let config = ConfigDiscovery::new(dir.path())
        .load_with_profile("production")
        .expect("load with profile");

    assert!(config.build.minify);
    assert_eq!(config.build.sourcemaps, "none");
    assert_eq!(config.build.entry_points, vec!["main.html".to_string()]);
}

#[test]
fn profile_overrides_dev_config() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
[dev]
host = "localhost"
port = 3000

[profiles.ci.dev]
host = "0.0.0.0"
autoreload = false
"#,
    );

    let config = ConfigDiscovery::new(dir.path())
        .load_with_profile("ci")
        .expect("load with profile");

    assert_eq!(config.dev.host, "0.0.0.0");
    assert_eq!(config.dev.port, 3000);
    assert!(!config.dev.autoreload);
}

#[test]
fn profile_replaces_arrays() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
[build]
entry_points = ["main.html", "admin.html"]

[profiles.admin.build]
entry_points = ["admin.html"]
"#,
    );

    let config = ConfigDiscovery::new(dir.path())
        .load_with_profile("admin")
        .expect("load with profile");
    assert_eq!(config.build.entry_points, vec!["admin.html".to_string()]);
}

#[test]
fn profile_merges_nested_tables() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
[build.runtime_compat]
chrome = "80"
safari = "14"

[profiles.modern.build.runtime_compat]
chrome = "110"
"#,
    );

    let config = ConfigDiscovery::new(dir.path())
        .load_with_profile("modern")
        .expect("load with profile");
    assert_eq!(config.build.runtime_compat["chrome"], "110");
    assert_eq!(config.build.runtime_compat["safari"], "14");
}

#[test]
fn profile_with_invalid_value_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write_config(
        &dir,
        r#"
[profiles.broken.dev]
port = "eighty"
"#,
    );

    let result = ConfigDiscovery::new(dir.path()).load_with_profile("broken");
    assert!(matches!(result, Err(ConfigError::InvalidProfileOverride { .. })));
}

#[test]
fn missing_profile_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write_config(&dir, "[build]\nentry_points = [\"main.html\"]\n");

    let result = ConfigDiscovery::new(dir.path()).load_with_profile("nope");
    assert!(matches!(result, Err(ConfigError::UnknownProfile { name }) if name == "nope"));
}
