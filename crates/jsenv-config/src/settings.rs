//! Global configuration settings shared across profiles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// `silent`, `error`, `warn`, `info` or `debug`.
    #[serde(default)]
    pub log_level: Option<String>,

    /// `pretty` or `json`.
    #[serde(default)]
    pub log_format: Option<String>,

    /// Force colors on or off; detected from the terminal when unset.
    #[serde(default)]
    pub color: Option<bool>,
}
