use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::enums::{Format, SourcemapArg};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project
    ///
    /// Walks the graph from the entry points, bundles, versions file names
    /// by content hash and writes the result. Nothing is written when any
    /// step fails.
    Build(BuildArgs),

    /// Start the development server
    ///
    /// Serves project files on demand and reloads the browser when a file
    /// it depends on changes.
    Dev(DevArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Entry points, relative to the project directory
    ///
    /// Overrides entry_points of jsenv.toml.
    ///
    /// Examples:
    ///   jsenv build main.html
    ///   jsenv build main.html sw.js
    #[arg(value_name = "ENTRY")]
    pub entries: Vec<String>,

    /// Build directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Module format of the built JavaScript
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<Format>,

    /// Where sourcemaps go
    #[arg(long, value_enum, value_name = "MODE")]
    pub sourcemaps: Option<SourcemapArg>,

    /// Minify JS, CSS and HTML
    #[arg(long)]
    pub minify: bool,

    /// Keep source file names (no content hash)
    #[arg(long)]
    pub no_versioning: bool,

    /// Prefix of rewritten URLs, e.g. https://cdn.example.com/app/
    #[arg(long, value_name = "URL")]
    pub base: Option<String>,

    /// Reuse compilations from the previous run
    #[arg(long)]
    pub cache: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DevArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Do not inject the autoreload client into HTML
    #[arg(long)]
    pub no_autoreload: bool,

    /// Open the browser once the server listens
    #[arg(long)]
    pub open: bool,
}
