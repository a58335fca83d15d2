//! Top-level configuration and profile merging.
//!
//! For file discovery, see the `discovery` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build::BuildConfig;
use crate::dev::DevConfig;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsenvConfig {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub dev: DevConfig,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

/// Partial sections merged over the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub build: Value,

    #[serde(default)]
    pub dev: Value,

    #[serde(default)]
    pub settings: Value,
}

impl JsenvConfig {
    /// Create from a JSON value.
    ///
    /// # Example
    ///
    /// ```
    /// use jsenv_config::JsenvConfig;
    /// use serde_json::json;
    ///
    /// let value = json!({
    ///     "build": {
    ///         "entry_points": ["index.html"],
    ///         "minify": true
    ///     }
    /// });
    ///
    /// let config = JsenvConfig::from_value(value).unwrap();
    /// assert_eq!(config.build.entry_points, vec!["index.html".to_string()]);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Apply the named profile. `None` returns the configuration unchanged.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownProfile`] when no profile has that name, and
    /// [`ConfigError::InvalidProfileOverride`] when the merged section no
    /// longer deserializes.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };
        let profile = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
            })?;
        tracing::debug!(profile = name, "applying config profile");

        self.build = merged(&self.build, &profile.build)?;
        self.dev = merged(&self.dev, &profile.dev)?;
        self.settings = merged(&self.settings, &profile.settings)?;
        Ok(self)
    }
}

fn merged<T>(base: &T, update: &Value) -> ConfigResult<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Clone,
{
    if update.is_null() {
        return Ok(base.clone());
    }
    let invalid = |err: serde_json::Error| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    };
    let mut value = serde_json::to_value(base).map_err(invalid)?;
    merge_values(&mut value, update);
    serde_json::from_value(value).map_err(invalid)
}

/// Deep merge: objects merge key by key, anything else (arrays included)
/// replaces the target.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}
