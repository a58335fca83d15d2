//! `[build]` section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const FORMATS: &[&str] = &["esmodule", "systemjs", "global", "commonjs"];
pub const SOURCEMAP_MODES: &[&str] = &["none", "inline", "file"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding the sources, relative to the config file.
    #[serde(default = "default_project_directory")]
    pub project_directory: PathBuf,

    #[serde(default = "default_build_directory")]
    pub build_directory: PathBuf,

    /// Specifiers relative to the project directory.
    #[serde(default)]
    pub entry_points: Vec<String>,

    #[serde(default = "default_format")]
    pub format: String,

    /// Browser or runtime name to minimum version.
    #[serde(default)]
    pub runtime_compat: BTreeMap<String, String>,

    #[serde(default)]
    pub minify: bool,

    #[serde(default = "default_sourcemaps")]
    pub sourcemaps: String,

    #[serde(default = "default_true")]
    pub versioning: bool,

    #[serde(default)]
    pub base: Option<String>,

    /// Import map file, relative to the project directory.
    #[serde(default)]
    pub import_map: Option<PathBuf>,

    /// Overrides of the default "keep every remote URL" rule, in order.
    #[serde(default)]
    pub preserved_urls: Vec<PreservedUrlRule>,

    #[serde(default = "default_true")]
    pub node_esm_resolution: bool,

    #[serde(default = "default_true")]
    pub css_bundle: bool,

    #[serde(default)]
    pub filesystem_cache: bool,

    #[serde(default)]
    pub cache_directory: Option<PathBuf>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub subbuilds: Vec<SubbuildEntry>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_directory: default_project_directory(),
            build_directory: default_build_directory(),
            entry_points: Vec::new(),
            format: default_format(),
            runtime_compat: BTreeMap::new(),
            minify: false,
            sourcemaps: default_sourcemaps(),
            versioning: true,
            base: None,
            import_map: None,
            preserved_urls: Vec::new(),
            node_esm_resolution: true,
            css_bundle: true,
            filesystem_cache: false,
            cache_directory: None,
            concurrency: default_concurrency(),
            subbuilds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedUrlRule {
    /// URL pattern, `*` matching anything.
    pub pattern: String,
    #[serde(default = "default_true")]
    pub preserve: bool,
}

/// A nested build written under `directory` of the build directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubbuildEntry {
    pub name: String,

    /// Relative to the build directory.
    pub directory: String,

    /// Relative to the parent project directory.
    pub project_directory: PathBuf,

    #[serde(default)]
    pub entry_points: Vec<String>,

    #[serde(default)]
    pub minify: Option<bool>,

    #[serde(default)]
    pub versioning: Option<bool>,
}

fn default_project_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_directory() -> PathBuf {
    PathBuf::from("dist")
}

fn default_format() -> String {
    "esmodule".into()
}

fn default_sourcemaps() -> String {
    "none".into()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    16
}
