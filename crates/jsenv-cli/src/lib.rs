//! jsenv CLI.
//!
//! - [`cli`] - argument definitions
//! - [`config`] - flags, `JSENV_*` variables and `jsenv.toml`, merged
//! - [`commands`] - `jsenv build` and `jsenv dev`
//! - [`dev`] - the dev server: routes, watcher, reload events
//! - [`error`] - [`CliError`] and the miette conversion
//! - [`logger`], [`ui`] - terminal output
//!
//! ```rust,no_run
//! use jsenv_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, ConfigError, Result, ResultExt};
