//! # jsenv-graph
//!
//! URL-keyed resource graph for the jsenv dev server and build pipeline.
//!
//! ## Overview
//!
//! Every resource a web project touches (HTML pages, JS modules, classic
//! scripts, CSS, JSON, images, workers) is a node addressed by its absolute
//! URL. This crate provides the data side of the pipeline:
//!
//! - [`UrlInfo`]: one node, with its content, type and relationships
//! - [`Reference`]: one specifier occurrence inside a parent node
//! - [`UrlGraph`]: a thread-safe arena of nodes keyed by URL
//! - [`EditBatch`]: offset-based rewriting applied in one pass
//! - [`sourcemap`]: composition of the maps produced by each transform
//! - [`runtime`]: the filesystem abstraction used to load content
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  UrlGraph                    │
//! │        Arc<RwLock<FxHashMap<url, UrlInfo>>>  │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!   ┌─────────────┐  references  ┌─────────────┐
//!   │  UrlInfo A  │ ───────────▶ │  UrlInfo B  │
//!   │             │ ◀─────────── │             │
//!   └─────────────┘  dependents  └─────────────┘
//!     (URL keys on both sides, never pointers)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use jsenv_graph::{ContentUpdate, Reference, ReferenceKind, UrlGraph};
//!
//! let graph = UrlGraph::new();
//! graph.mark_entry_point("file:///project/main.js");
//! graph
//!     .update_content(
//!         "file:///project/main.js",
//!         ContentUpdate::content("import './file.js';"),
//!     )
//!     .unwrap();
//!
//! let mut reference = Reference::new("file:///project/main.js", "./file.js", ReferenceKind::JsImport);
//! reference.url = Some("file:///project/file.js".to_string());
//! graph.set_references("file:///project/main.js", vec![reference]).unwrap();
//!
//! assert_eq!(
//!     graph.dependents_of("file:///project/file.js"),
//!     vec!["file:///project/main.js"]
//! );
//! ```

pub mod content_type;
pub mod edits;
pub mod graph;
pub mod reference;
pub mod runtime;
pub mod sourcemap;
pub mod url;
pub mod url_info;

pub use edits::{Edit, EditBatch, EditError};
pub use graph::{ContentUpdate, UrlGraph};
pub use oxc_sourcemap::SourceMap;
pub use reference::{InlineContent, Reference, ReferenceKind};
pub use runtime::{FileMetadata, NativeRuntime, Runtime, RuntimeError, RuntimeResult};
pub use url_info::{Content, Subtype, UrlInfo, UrlType};

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No node exists for this URL.
    #[error("no node for url: {0}")]
    NodeNotFound(String),

    /// The node is still referenced and cannot be removed.
    #[error("cannot remove {url}: still referenced by {}", dependents.join(", "))]
    StillReferenced { url: String, dependents: Vec<String> },

    /// Batch edit could not be applied.
    #[error("edit failed: {0}")]
    Edit(#[from] EditError),

    /// URL conversion failed.
    #[error(transparent)]
    Url(#[from] crate::url::UrlError),

    /// Runtime (filesystem) failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
