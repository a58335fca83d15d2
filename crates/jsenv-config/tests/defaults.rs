//! Tests for default values.

use jsenv_config::{BuildConfig, DevConfig, GlobalSettings, JsenvConfig};
use std::path::PathBuf;

#[test]
fn jsenv_config_defaults() {
    let config = JsenvConfig::default();
    assert!(config.build.entry_points.is_empty());
    assert!(config.profiles.is_empty());
    assert_eq!(config.settings, GlobalSettings::default());
}

#[test]
fn build_config_defaults() {
    let build = BuildConfig::default();
    assert_eq!(build.project_directory, PathBuf::from("."));
    assert_eq!(build.build_directory, PathBuf::from("dist"));
    assert_eq!(build.format, "esmodule");
    assert_eq!(build.sourcemaps, "none");
    assert!(build.versioning);
    assert!(!build.minify);
    assert!(build.node_esm_resolution);
    assert!(build.css_bundle);
    assert!(!build.filesystem_cache);
    assert_eq!(build.concurrency, 16);
    assert!(build.base.is_none());
    assert!(build.subbuilds.is_empty());
}

#[test]
fn dev_config_defaults() {
    let dev = DevConfig::default();
    assert_eq!(dev.host, "127.0.0.1");
    assert_eq!(dev.port, 3456);
    assert!(dev.autoreload);
    assert!(dev.sourcemaps);
    assert!(!dev.open);
    assert_eq!(dev.debounce_ms, 100);
    assert!(dev.ignore.iter().any(|segment| segment == "node_modules"));
}

#[test]
fn empty_sections_deserialize_to_defaults() {
    let config: JsenvConfig = serde_json::from_str(r#"{ "build": {}, "dev": {} }"#).unwrap();
    assert_eq!(config, JsenvConfig::default());
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config: JsenvConfig =
        serde_json::from_str(r#"{ "dev": { "port": 8080 } }"#).unwrap();
    assert_eq!(config.dev.port, 8080);
    assert!(config.dev.autoreload);
    assert_eq!(config.build, BuildConfig::default());
}
