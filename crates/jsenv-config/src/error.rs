//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors (for CLI use)
    #[error("entry point not found: {path}")]
    EntryNotFound { path: PathBuf },

    #[error("import map not found: {path}")]
    ImportMapNotFound { path: PathBuf },

    #[error("project directory not found: {path}")]
    ProjectDirNotFound { path: PathBuf },

    // Config parsing/loading errors
    #[error("no jsenv.toml or package.json \"jsenv\" field found")]
    NotFound,

    #[error("invalid config value for '{field}'")]
    InvalidValue { field: String, hint: Option<String> },

    #[error("invalid profile override: {message}")]
    InvalidProfileOverride { message: String },

    #[error("unknown profile \"{name}\"")]
    UnknownProfile { name: String },

    // Schema validation errors (no filesystem checks)
    #[error("no entry points specified")]
    NoEntries,

    #[error("{message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Suggestion shown under the error, when there is one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { hint, .. } | ConfigError::SchemaValidation { hint, .. } => {
                hint.as_deref()
            }
            ConfigError::NotFound => {
                Some("Create a jsenv.toml with a [build] section listing entry_points")
            }
            ConfigError::NoEntries => Some("Add entry_points = [\"index.html\"] to [build]"),
            _ => None,
        }
    }
}
