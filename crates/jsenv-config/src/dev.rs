//! `[dev]` section.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub autoreload: bool,

    /// Inline sourcemaps in served JS and CSS.
    #[serde(default = "default_true")]
    pub sourcemaps: bool,

    #[serde(default)]
    pub open: bool,

    /// Extra directories to watch besides the project directory.
    #[serde(default)]
    pub watch_paths: Vec<PathBuf>,

    /// Path segments ignored by the watcher.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub filesystem_cache: bool,

    /// Allow cross-origin requests to the dev server.
    #[serde(default)]
    pub cors: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            autoreload: true,
            sourcemaps: true,
            open: false,
            watch_paths: Vec::new(),
            ignore: default_ignore(),
            debounce_ms: default_debounce_ms(),
            filesystem_cache: false,
            cors: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3456
}

fn default_true() -> bool {
    true
}

fn default_ignore() -> Vec<String> {
    vec![".git".into(), "node_modules".into(), ".jsenv".into()]
}

fn default_debounce_ms() -> u64 {
    100
}
