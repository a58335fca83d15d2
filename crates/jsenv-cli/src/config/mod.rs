//! Configuration of a CLI run.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. `jsenv.toml` (or the `"jsenv"` field of `package.json`), with the
//!    selected profile merged in
//! 3. `JSENV_*` environment variables, `__` separating nested keys
//!    (`JSENV_BUILD__MINIFY=true`, `JSENV_DEV__PORT=8080`)
//! 4. command-line flags

mod conversions;
mod loading;

use jsenv_config::JsenvConfig;
use std::path::PathBuf;

pub use conversions::{build_options, dev_options, load_import_map, preserved_urls};
pub use loading::{ENV_PREFIX, Overrides, load};

/// Configuration resolved for one command.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Directory relative paths of the configuration resolve against.
    pub root: PathBuf,
    /// File the configuration came from, if any.
    pub file: Option<PathBuf>,
    pub config: JsenvConfig,
}

impl LoadedConfig {
    /// Absolute project directory.
    pub fn project_directory(&self) -> PathBuf {
        self.root.join(&self.config.build.project_directory)
    }
}
