//! Arguments and results of plugin hooks.

use jsenv_graph::runtime::Runtime;
use jsenv_graph::url::Url;
use jsenv_graph::{Content, Reference, SourceMap, UrlGraph, UrlType};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::build::BuildFormat;
use crate::import_map::ImportMap;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub scenario: Scenario,
    pub project_url: &'a Url,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub scenario: Scenario,
    pub project_url: &'a Url,
    pub runtime: &'a Arc<dyn Runtime>,
}

/// Content provided by a fetch hook or a default loader.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub content: Content,
    pub content_type: String,
    /// Forces the node type instead of deriving it from the content type.
    pub url_type: Option<UrlType>,
    pub last_modified: Option<u64>,
    /// URL the content actually came from, when it differs (HTTP redirects).
    pub original_url: Option<String>,
}

impl FetchedContent {
    pub fn new(content: impl Into<Content>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            url_type: None,
            last_modified: None,
            original_url: None,
        }
    }

    pub fn with_url_type(mut self, url_type: UrlType) -> Self {
        self.url_type = Some(url_type);
        self
    }

    pub fn with_last_modified(mut self, last_modified: Option<u64>) -> Self {
        self.last_modified = last_modified;
        self
    }
}

/// State shared with a transform hook.
///
/// References injected here are resolved by the kitchen right after the
/// hook returns, against the content the hook produced.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub scenario: Scenario,
    pub project_url: Url,
    /// Import map in effect for the node being transformed.
    pub import_map: Option<ImportMap>,
    pub runtime_compat: BTreeMap<String, String>,
    pub minify: bool,
    injected: Vec<Reference>,
    import_map_found: Option<ImportMap>,
}

impl TransformContext {
    pub fn new(scenario: Scenario, project_url: Url) -> Self {
        Self {
            scenario,
            project_url,
            import_map: None,
            runtime_compat: BTreeMap::new(),
            minify: false,
            injected: Vec::new(),
            import_map_found: None,
        }
    }

    pub fn inject_reference(&mut self, reference: Reference) {
        self.injected.push(reference);
    }

    pub fn injected(&self) -> &[Reference] {
        &self.injected
    }

    pub(crate) fn take_injected(&mut self) -> Vec<Reference> {
        std::mem::take(&mut self.injected)
    }

    /// Declare an import map owned by the node being transformed (an HTML
    /// `<script type="importmap">`). It applies to everything the node
    /// references, directly or not.
    pub fn declare_import_map(&mut self, import_map: ImportMap) {
        self.import_map_found = Some(match self.import_map_found.take() {
            Some(existing) => existing.compose(&import_map),
            None => import_map,
        });
    }

    pub(crate) fn take_declared_import_map(&mut self) -> Option<ImportMap> {
        self.import_map_found.take()
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub content: String,
    /// Map from `content` back to the hook's input.
    pub sourcemap: Option<SourceMap>,
}

impl TransformOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sourcemap: None,
        }
    }

    pub fn with_sourcemap(mut self, sourcemap: Option<SourceMap>) -> Self {
        self.sourcemap = sourcemap;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BundleContext<'a> {
    pub scenario: Scenario,
    pub graph: &'a UrlGraph,
    pub project_url: &'a Url,
    pub format: BuildFormat,
    pub minify: bool,
    pub runtime_compat: &'a BTreeMap<String, String>,
}

/// One merged output replacing `sources`.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// URL of the bundle; may be one of its sources (the root).
    pub url: String,
    pub content: Content,
    pub content_type: String,
    pub sourcemap: Option<SourceMap>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub scenario: Scenario,
    pub project_url: &'a Url,
}
