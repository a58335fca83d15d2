//! Configuration of jsenv projects.
//!
//! A project is configured by `jsenv.toml` at its root, or by a `"jsenv"`
//! field in its `package.json`. The file has a `[build]` and a `[dev]`
//! section, optional `[settings]` and named `[profiles.<name>]` that are
//! deep-merged over the base configuration when selected.

pub mod build;
pub mod config;
pub mod dev;
pub mod discovery;
pub mod error;
pub mod settings;
pub mod validation;

pub use build::*;
pub use config::*;
pub use dev::*;
pub use error::*;
pub use settings::*;

pub use discovery::{CONFIG_FILE, ConfigDiscovery};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
