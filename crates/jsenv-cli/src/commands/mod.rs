//! Command implementations.
//!
//! - [`build`] - `jsenv build`
//! - [`dev`] - `jsenv dev`

pub mod build;
pub mod dev;

pub use build::execute as build_execute;
pub use dev::execute as dev_execute;

use path_clean::PathClean;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result, ResultExt};

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub cwd: Option<PathBuf>,
    pub profile: Option<String>,
}

impl GlobalOptions {
    /// Absolute directory the configuration is looked up in.
    pub fn project_root(&self) -> Result<PathBuf> {
        resolve_root(self.cwd.as_deref())
    }
}

/// `cwd` against the process working directory.
pub fn resolve_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) => current.join(dir).clean(),
        None => current,
    };
    if !root.is_dir() {
        return Err(CliError::FileNotFound(root)).with_hint("--cwd must name an existing directory");
    }
    Ok(root)
}
