//! Error types of the CLI.
//!
//! Commands return [`CliError`]. Library errors convert into it with `?`;
//! `main` turns it into a [`miette::Report`] (see [`cli_error_to_miette`]).
//!
//! ```rust,no_run
//! use jsenv_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_import_map(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("set [build] import_map to an existing file")
//! }
//! ```

mod miette;

pub use self::miette::{build_error_to_miette, cli_error_to_miette};

use std::path::PathBuf;
use thiserror::Error;

pub use jsenv_config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or validating `jsenv.toml`.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Layering flags and `JSENV_*` variables over the file.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Turning configuration into build or dev options.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Failure reported by the pipeline.
    #[error(transparent)]
    Bundler(#[from] jsenv_bundler::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binding or running the dev server.
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl From<figment::Error> for CliError {
    fn from(error: figment::Error) -> Self {
        CliError::Figment(Box::new(error))
    }
}

/// Options that cannot be handed to the pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid import map {}: {reason}\n\nHint: The file must be a JSON object with \"imports\" and/or \"scopes\"", .path.display())]
    InvalidImportMap { path: PathBuf, reason: String },

    #[error("Invalid preserved URL pattern \"{pattern}\": {reason}\n\nHint: Use * as the only wildcard, e.g. \"https://cdn.example.com/*\"")]
    InvalidPreservedUrl { pattern: String, reason: String },

    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Context helpers for results on their way to a [`CliError`].
pub trait ResultExt<T> {
    /// Turn a `NotFound` I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a `Hint:` line to the message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the message with `msg`.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
