//! Command-line interface.
//!
//! - `jsenv build` - build the project into the build directory
//! - `jsenv dev` - serve the project with autoreload

mod commands;
pub mod enums;

use clap::Parser;
use std::path::PathBuf;

pub use commands::{BuildArgs, Command, DevArgs};
pub use enums::*;

/// jsenv - build and serve JavaScript projects from their URL graph
#[derive(Parser, Debug)]
#[command(
    name = "jsenv",
    version,
    about = "Build and serve JavaScript projects from their URL graph",
    long_about = "jsenv walks the graph of URLs referenced by your HTML, JS and CSS.\n\
                  `jsenv dev` serves each file on demand with autoreload; `jsenv build`\n\
                  writes a content-versioned copy of the graph to the build directory."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Run as if started in DIR (where jsenv.toml is looked up)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Apply the named [profiles.<NAME>] section of jsenv.toml
    #[arg(long, global = true, value_name = "NAME", env = "JSENV_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}
