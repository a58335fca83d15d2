//! Specifier resolution.
//!
//! Order: plugin `resolve_reference` hooks, `data:` and absolute URLs as
//! written, the import map in effect, root-relative resolution against the
//! project directory, relative resolution against the parent, and finally
//! node ESM resolution for bare module specifiers.
//! `redirect_reference` hooks then run on the resolved URL.

use jsenv_graph::Reference;
use jsenv_graph::url::{Url, canonicalize, file_url_to_path, is_bare_specifier, path_to_file_url, resolve_url};
use std::sync::Arc;

use crate::import_map::ImportMap;
use crate::plugins::{PluginList, ResolveContext};
use crate::scenario::Scenario;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Resolver {
    plugins: Arc<PluginList>,
    project_url: Url,
    scenario: Scenario,
    node_esm: Option<Arc<oxc_resolver::Resolver>>,
}

impl Resolver {
    pub fn new(
        plugins: Arc<PluginList>,
        project_url: Url,
        scenario: Scenario,
        node_esm_resolution: bool,
    ) -> Self {
        let node_esm = node_esm_resolution.then(|| {
            Arc::new(oxc_resolver::Resolver::new(oxc_resolver::ResolveOptions {
                condition_names: vec!["import".into(), "browser".into(), "default".into()],
                main_fields: vec!["browser".into(), "module".into(), "main".into()],
                extensions: vec![".js".into(), ".mjs".into(), ".json".into()],
                ..Default::default()
            }))
        });
        Self {
            plugins,
            project_url,
            scenario,
            node_esm,
        }
    }

    fn context(&self) -> ResolveContext<'_> {
        ResolveContext {
            scenario: self.scenario,
            project_url: &self.project_url,
        }
    }

    /// Resolve and redirect `reference`.
    pub fn resolve(&self, reference: &Reference, import_map: Option<&ImportMap>) -> Result<Url> {
        let url = self.resolve_without_redirect(reference, import_map)?;
        Ok(self.redirect(reference, url))
    }

    fn resolve_without_redirect(
        &self,
        reference: &Reference,
        import_map: Option<&ImportMap>,
    ) -> Result<Url> {
        let ctx = self.context();
        for plugin in self.plugins.iter() {
            if let Some(url) = plugin.resolve_reference(reference, &ctx)? {
                return Ok(canonicalize(&url));
            }
        }

        let specifier = reference.specifier.trim();
        let parent = Url::parse(&reference.parent_url).map_err(|e| Error::UrlResolution {
            parent_url: reference.parent_url.clone(),
            specifier: specifier.to_string(),
            reason: Some(format!("invalid parent URL: {e}")),
        })?;

        if specifier.starts_with("data:") {
            return Url::parse(specifier).map_err(|e| unresolved(reference, e.to_string()));
        }
        if let Ok(absolute) = Url::parse(specifier) {
            return Ok(canonicalize(&absolute));
        }

        if reference.kind.is_module_specifier() {
            if let Some(url) = import_map.and_then(|map| map.resolve(specifier, &parent)) {
                return Ok(canonicalize(&url));
            }
        }

        // "/file.js" in a project file is served from the project root.
        if parent.scheme() == "file" && is_root_relative(specifier) {
            return resolve_url(&specifier[1..], &self.project_url)
                .ok_or_else(|| unresolved(reference, "not a valid root-relative URL"));
        }

        // Outside of JS module specifiers, "file.js" means "./file.js".
        if !reference.kind.is_module_specifier() || !is_bare_specifier(specifier) {
            return resolve_url(specifier, &parent)
                .ok_or_else(|| unresolved(reference, "not a valid relative URL"));
        }

        match &self.node_esm {
            Some(resolver) => node_esm_resolve(resolver, reference, &parent),
            None => Err(unresolved(reference, "bare specifier not mapped")),
        }
    }

    /// Run `redirect_reference` hooks, each seeing the previous result.
    pub fn redirect(&self, reference: &Reference, url: Url) -> Url {
        let ctx = self.context();
        self.plugins.iter().fold(url, |current, plugin| {
            plugin
                .redirect_reference(reference, &current, &ctx)
                .map(|redirected| canonicalize(&redirected))
                .unwrap_or(current)
        })
    }
}

fn is_root_relative(specifier: &str) -> bool {
    specifier.starts_with('/') && !specifier.starts_with("//")
}

fn node_esm_resolve(
    resolver: &oxc_resolver::Resolver,
    reference: &Reference,
    parent: &Url,
) -> Result<Url> {
    let parent_path = file_url_to_path(parent).map_err(|e| unresolved(reference, e.to_string()))?;
    let directory = parent_path
        .parent()
        .ok_or_else(|| unresolved(reference, "parent has no directory"))?;
    let resolution = resolver
        .resolve(directory, &reference.specifier)
        .map_err(|e| unresolved(reference, e.to_string()))?;
    let mut url =
        path_to_file_url(resolution.full_path().as_path()).map_err(|e| unresolved(reference, e.to_string()))?;
    if let Some(query) = resolution.query() {
        url.set_query(Some(query.trim_start_matches('?')));
    }
    Ok(url)
}

fn unresolved(reference: &Reference, reason: impl Into<String>) -> Error {
    Error::UrlResolution {
        parent_url: reference.parent_url.clone(),
        specifier: reference.specifier.clone(),
        reason: Some(reason.into()),
    }
}
