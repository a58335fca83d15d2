//! File-based config discovery for CLI use.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::JsenvConfig;
use crate::error::{ConfigError, Result};

pub const CONFIG_FILE: &str = "jsenv.toml";
const PACKAGE_FIELD: &str = "jsenv";

/// Searches a project root for its configuration and loads it.
///
/// Library users with an in-memory configuration should use
/// [`JsenvConfig::from_value`] instead.
///
/// # Example
///
/// ```no_run
/// use jsenv_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory.
    ///
    /// Searches in this order:
    /// 1. `jsenv.toml`
    /// 2. `package.json` with a non-null `jsenv` field
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.is_file() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed = serde_json::from_str::<Value>(&content).ok()?;
        match parsed.get(PACKAGE_FIELD) {
            Some(field) if !field.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load the discovered file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] if there is no config file.
    pub fn load(&self) -> Result<JsenvConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        tracing::debug!(path = %path.display(), "loading config");
        self.load_from(&path)
    }

    /// Load and apply the named profile.
    pub fn load_with_profile(&self, profile: &str) -> Result<JsenvConfig> {
        self.load()?.materialize_profile(Some(profile))
    }

    /// Load the discovered file, or the defaults when there is none.
    pub fn load_or_default(&self) -> Result<JsenvConfig> {
        match self.load() {
            Err(ConfigError::NotFound) => Ok(JsenvConfig::default()),
            other => other,
        }
    }

    pub fn load_from(&self, path: &Path) -> Result<JsenvConfig> {
        if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            return self.load_from_package_json(path);
        }

        let content = fs::read_to_string(path)?;
        let invalid = |message: String| ConfigError::InvalidValue {
            field: CONFIG_FILE.to_string(),
            hint: Some(message),
        };
        // Through JSON so profiles deep-merge the same way for both formats.
        let table: toml::Value = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let value = serde_json::to_value(table).map_err(|e| invalid(e.to_string()))?;
        JsenvConfig::from_value(value)
    }

    fn load_from_package_json(&self, path: &Path) -> Result<JsenvConfig> {
        let content = fs::read_to_string(path)?;
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: Some(format!("Invalid JSON: {}", e)),
            })?;

        match parsed.get(PACKAGE_FIELD) {
            Some(value) if !value.is_null() => JsenvConfig::from_value(value.clone()),
            _ => Err(ConfigError::InvalidValue {
                field: PACKAGE_FIELD.to_string(),
                hint: Some("Add a \"jsenv\" object to your package.json".to_string()),
            }),
        }
    }
}
