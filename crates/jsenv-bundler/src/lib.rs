//! # jsenv-bundler
//!
//! The jsenv pipeline on top of the [`jsenv_graph`] URL graph.
//!
//! A [`Kitchen`] cooks one URL at a time: fetch, type detection, transforms,
//! reference resolution. The [`walker::Walker`] drives the kitchen over the
//! whole graph with bounded concurrency. [`build()`] then bundles, rewrites
//! specifiers, versions file names by content hash and writes the result;
//! [`dev::DevKitchen`] serves cooked nodes on demand instead.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jsenv_bundler::{BuildOptions, build};
//!
//! # #[tokio::main]
//! # async fn main() -> jsenv_bundler::Result<()> {
//! let result = build(
//!     BuildOptions::new("./src", "./dist")
//!         .entry_point("main.html")
//!         .sourcemaps(jsenv_bundler::SourcemapMode::File),
//! )
//! .await?;
//!
//! for (path, content) in &result.build_file_contents {
//!     println!("{path}: {} bytes", content.len());
//! }
//! # Ok(()) }
//! ```

// Re-export the foundation crate
pub use jsenv_graph;

pub mod build;
pub mod cache;
pub mod dev;
pub mod diagnostics;
pub mod fetch;
pub mod import_map;
pub mod kitchen;
pub mod output;
pub mod plugins;
pub mod resolver;
pub mod runtime;
pub mod scenario;
pub mod transform;
pub mod walker;

pub use build::{
    BuildFormat, BuildOptions, BuildResult, BuildState, GeneratedUrlInfo, SourcemapMode,
    SubbuildConfig, build,
};
pub use diagnostics::ParseError;
pub use import_map::ImportMap;
pub use kitchen::{CookOutcome, Kitchen, KitchenConfig, KitchenMode};
pub use plugins::{
    Bundle, BundleContext, FetchedContent, Plugin, PluginPhase, PluginRegistry, ResolveContext,
    TransformContext, TransformOutput,
};
pub use runtime::JsenvRuntime;
pub use scenario::{Scenario, ScenarioSet};

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

/// Error types for jsenv-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A specifier could not be turned into a URL.
    #[error("cannot resolve \"{specifier}\" from {parent_url}")]
    UrlResolution {
        parent_url: String,
        specifier: String,
        reason: Option<String>,
    },

    /// A URL has no content (missing file, failed remote request).
    #[error("{}", format_not_found(.url, .importer_url.as_deref(), .specifier.as_deref()))]
    ResourceNotFound {
        url: String,
        importer_url: Option<String>,
        specifier: Option<String>,
    },

    /// Content failed to parse.
    #[error(transparent)]
    Parse(#[from] diagnostics::ParseError),

    /// A compile cache entry is unreadable or inconsistent.
    #[error("corrupted cache entry {path}: {reason}")]
    CacheCorruption {
        path: std::path::PathBuf,
        reason: String,
    },

    /// A sub-build failed; the parent build fails with it.
    #[error("sub-build \"{name}\" failed: {source}")]
    SubbuildFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A build step ran out of order.
    #[error("invalid build state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// A plugin hook returned an error.
    #[error("plugin \"{plugin}\": {message}")]
    Plugin { plugin: String, message: String },

    /// A remote URL could not be fetched.
    #[error("failed to fetch {url}: {reason}")]
    RemoteFetch { url: String, reason: String },

    /// Error from the graph crate.
    #[error(transparent)]
    Graph(#[from] jsenv_graph::Error),

    /// Filesystem error reported by the runtime.
    #[error(transparent)]
    Runtime(#[from] jsenv_graph::RuntimeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Several independent failures (one per failing branch of the graph).
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<Error>),
}

/// Result type alias for jsenv-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn plugin(plugin: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }

    /// Collapse a list of errors: one error stays as is, several become
    /// [`Error::Multiple`].
    pub fn from_many(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }

    /// The innermost error, looking through sub-build wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::SubbuildFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

fn format_not_found(url: &str, importer: Option<&str>, specifier: Option<&str>) -> String {
    match (importer, specifier) {
        (Some(importer), Some(specifier)) => {
            format!("no content for {url} (\"{specifier}\" in {importer})")
        }
        _ => format!("no content for {url}"),
    }
}

fn format_multiple(errors: &[Error]) -> String {
    format!(
        "{} errors: {}",
        errors.len(),
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    )
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::UrlResolution { .. } => "URL_RESOLUTION_ERROR",
            Error::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Error::Parse(_) => "PARSE_ERROR",
            Error::CacheCorruption { .. } => "CACHE_CORRUPTION",
            Error::SubbuildFailed { .. } => "SUBBUILD_FAILED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Plugin { .. } => "PLUGIN_ERROR",
            Error::RemoteFetch { .. } => "REMOTE_FETCH_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Multiple(_) => "MULTIPLE_ERRORS",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::UrlResolution { specifier, .. } if jsenv_graph::url::is_bare_specifier(specifier) => {
                Some(Box::new(format!(
                    "\"{specifier}\" is a bare specifier. Map it in an import map or install the package in node_modules."
                )))
            }
            Error::ResourceNotFound { .. } => Some(Box::new(
                "Check that the file exists and the specifier is spelled correctly.",
            )),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {}",
                msg
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the build directory and doesn't contain '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            Error::CacheCorruption { path, .. } => Some(Box::new(format!(
                "The entry was discarded. Delete {} if the problem persists.",
                path.display()
            ))),
            Error::Multiple(_) => Some(Box::new(
                "Multiple errors occurred. See details below.".to_string(),
            )),
            _ => None,
        }
    }

    fn related(&self) -> Option<Box<dyn Iterator<Item = &dyn miette::Diagnostic> + '_>> {
        match self {
            Error::Multiple(errors) => Some(Box::new(
                errors.iter().map(|e| e as &dyn miette::Diagnostic),
            )),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Error::Parse(error) => error.source_code(),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            Error::Parse(error) => error.labels(),
            _ => None,
        }
    }
}
