use jsenv_graph::runtime::Runtime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::subbuild::SubbuildConfig;
use crate::fetch::PreservedUrls;
use crate::import_map::ImportMap;
use crate::plugins::{Plugin, PluginRegistry};
use crate::scenario::Scenario;
use crate::walker::DEFAULT_CONCURRENCY;
use crate::{Error, Result};

/// Module format of the built JavaScript.
///
/// Only `esmodule` is produced by the built-in plugins; the others need a
/// `js_module` bundler plugin doing the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildFormat {
    #[default]
    EsModule,
    SystemJs,
    Global,
    CommonJs,
}

impl BuildFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildFormat::EsModule => "esmodule",
            BuildFormat::SystemJs => "systemjs",
            BuildFormat::Global => "global",
            BuildFormat::CommonJs => "commonjs",
        }
    }
}

impl std::fmt::Display for BuildFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "esmodule" | "esm" => Ok(BuildFormat::EsModule),
            "systemjs" => Ok(BuildFormat::SystemJs),
            "global" | "iife" => Ok(BuildFormat::Global),
            "commonjs" | "cjs" => Ok(BuildFormat::CommonJs),
            other => Err(Error::InvalidConfig(format!(
                "unknown format \"{other}\" (expected esmodule, systemjs, global or commonjs)"
            ))),
        }
    }
}

/// Where sourcemaps of built JS and CSS go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcemapMode {
    #[default]
    None,
    /// `data:` URL in the sourcemap comment.
    Inline,
    /// `<file>.map` next to the file.
    File,
}

impl FromStr for SourcemapMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" | "false" => Ok(SourcemapMode::None),
            "inline" => Ok(SourcemapMode::Inline),
            "file" | "true" => Ok(SourcemapMode::File),
            other => Err(Error::InvalidConfig(format!(
                "unknown sourcemaps mode \"{other}\" (expected none, inline or file)"
            ))),
        }
    }
}

/// Configuration of one build run.
///
/// Relative directories resolve against the runtime's working directory.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub project_directory: PathBuf,
    pub build_directory: PathBuf,

    /// Entry point specifiers, relative to the project directory.
    pub entry_points: Vec<String>,

    /// `prod` (default) or `preview`.
    pub scenario: Scenario,

    pub format: BuildFormat,

    /// Browser name to minimal version, handed to plugins.
    pub runtime_compat: BTreeMap<String, String>,

    pub preserved_urls: PreservedUrls,

    pub minify: bool,

    pub sourcemaps: SourcemapMode,

    /// Content hashes in file names (default: true).
    pub versioning: bool,

    /// Prefix of rewritten specifiers. `None` writes paths relative to the
    /// referencing file.
    pub base: Option<String>,

    pub import_map: Option<ImportMap>,

    pub node_esm_resolution: bool,

    /// Reuse compilations across runs.
    pub filesystem_cache: bool,

    /// Defaults to `<project>/.jsenv/cache`.
    pub cache_directory: Option<PathBuf>,

    /// Nodes cooked at the same time.
    pub concurrency: usize,

    pub subbuilds: Vec<SubbuildConfig>,

    /// Write files to the build directory (default: true).
    pub write: bool,

    /// Inline CSS `@import`s (default: true).
    pub css_bundle: bool,

    /// Plugins added after the built-in ones.
    pub plugins: PluginRegistry,

    /// Filesystem access (default: the native filesystem).
    pub runtime: Option<Arc<dyn Runtime>>,
}

impl BuildOptions {
    /// # Examples
    ///
    /// ```no_run
    /// use jsenv_bundler::BuildOptions;
    ///
    /// let options = BuildOptions::new("./src", "./dist").entry_point("main.html");
    /// ```
    pub fn new(project_directory: impl Into<PathBuf>, build_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_directory: project_directory.into(),
            build_directory: build_directory.into(),
            entry_points: Vec::new(),
            scenario: Scenario::Prod,
            format: BuildFormat::EsModule,
            runtime_compat: BTreeMap::new(),
            preserved_urls: PreservedUrls::default(),
            minify: false,
            sourcemaps: SourcemapMode::None,
            versioning: true,
            base: None,
            import_map: None,
            node_esm_resolution: true,
            filesystem_cache: false,
            cache_directory: None,
            concurrency: DEFAULT_CONCURRENCY,
            subbuilds: Vec::new(),
            write: true,
            css_bundle: true,
            plugins: PluginRegistry::new(),
            runtime: None,
        }
    }

    pub fn entry_point(mut self, specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        if !self.entry_points.contains(&specifier) {
            self.entry_points.push(specifier);
        }
        self
    }

    pub fn entry_points<I, S>(self, specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        specifiers
            .into_iter()
            .fold(self, |options, specifier| options.entry_point(specifier))
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn format(mut self, format: BuildFormat) -> Self {
        self.format = format;
        self
    }

    pub fn runtime_compat<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (browser, version) in entries {
            self.runtime_compat.insert(browser.into(), version.into());
        }
        self
    }

    pub fn preserved_urls(mut self, preserved_urls: PreservedUrls) -> Self {
        self.preserved_urls = preserved_urls;
        self
    }

    pub fn minify(mut self, enabled: bool) -> Self {
        self.minify = enabled;
        self
    }

    pub fn sourcemaps(mut self, mode: SourcemapMode) -> Self {
        self.sourcemaps = mode;
        self
    }

    pub fn versioning(mut self, enabled: bool) -> Self {
        self.versioning = enabled;
        self
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn import_map(mut self, import_map: ImportMap) -> Self {
        self.import_map = Some(import_map);
        self
    }

    pub fn node_esm_resolution(mut self, enabled: bool) -> Self {
        self.node_esm_resolution = enabled;
        self
    }

    pub fn filesystem_cache(mut self, enabled: bool) -> Self {
        self.filesystem_cache = enabled;
        self
    }

    pub fn cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn subbuild(mut self, subbuild: SubbuildConfig) -> Self {
        self.subbuilds.push(subbuild);
        self
    }

    pub fn write(mut self, enabled: bool) -> Self {
        self.write = enabled;
        self
    }

    pub fn css_bundle(mut self, enabled: bool) -> Self {
        self.css_bundle = enabled;
        self
    }

    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate the options before anything is read.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.entry_points.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one entry point is required".into(),
            ));
        }
        if !self.scenario.is_build() {
            return Err(Error::InvalidConfig(format!(
                "cannot build for the \"{}\" scenario (expected prod or preview)",
                self.scenario
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if same_directory(&self.project_directory, &self.build_directory) {
            return Err(Error::InvalidConfig(
                "build directory must differ from the project directory".into(),
            ));
        }
        let mut names = Vec::new();
        for subbuild in &self.subbuilds {
            if names.contains(&subbuild.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate sub-build name \"{}\"",
                    subbuild.name
                )));
            }
            names.push(subbuild.name.as_str());
            subbuild.validate()?;
        }
        Ok(())
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    use path_clean::PathClean;
    a.clean() == b.clean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BuildOptions::new("src", "dist");
        assert_eq!(options.format, BuildFormat::EsModule);
        assert_eq!(options.sourcemaps, SourcemapMode::None);
        assert_eq!(options.scenario, Scenario::Prod);
        assert!(options.versioning);
        assert!(options.write);
        assert_eq!(options.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_entry_points_are_deduplicated() {
        let options = BuildOptions::new("src", "dist").entry_points(["main.html", "main.html", "b.html"]);
        assert_eq!(options.entry_points, vec!["main.html", "b.html"]);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            BuildOptions::new("src", "dist").validate(),
            Err(Error::InvalidConfig(_))
        ));
        let valid = BuildOptions::new("src", "dist").entry_point("main.html");
        assert!(valid.validate().is_ok());
        assert!(valid.clone().concurrency(0).validate().is_err());
        assert!(valid.clone().scenario(Scenario::Dev).validate().is_err());
        assert!(
            BuildOptions::new("./src", "src/")
                .entry_point("main.html")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_parse_format_and_sourcemaps() {
        assert_eq!("systemjs".parse::<BuildFormat>().unwrap(), BuildFormat::SystemJs);
        assert_eq!("ESM".parse::<BuildFormat>().unwrap(), BuildFormat::EsModule);
        assert!("amd".parse::<BuildFormat>().is_err());
        assert_eq!("file".parse::<SourcemapMode>().unwrap(), SourcemapMode::File);
        assert_eq!("inline".parse::<SourcemapMode>().unwrap(), SourcemapMode::Inline);
    }
}
