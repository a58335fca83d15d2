//! CSS `@import` bundling.
//!
//! A stylesheet reached only through `@import` is inlined into the
//! stylesheets importing it by the lightningcss bundler, reading sources
//! from the graph. Conditional imports end up wrapped in the matching
//! `@media`, `@supports` or `@layer` block. Stylesheets also referenced
//! from HTML or JS stay separate files and keep their `@import`.
//! `url()`s of inlined stylesheets are rebased onto the importer.

use async_trait::async_trait;
use jsenv_graph::url::{Url, file_url_to_path, relative_url};
use jsenv_graph::{Content, ReferenceKind, UrlGraph, UrlInfo, UrlType};
use lightningcss::bundler::{Bundler, ResolveResult, SourceProvider};
use lightningcss::printer::PrinterOptions;
use lightningcss::values::url::Url as CssUrl;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use super::css::parser_options;
use crate::plugins::{Bundle, BundleContext, Plugin, PluginPhase};
use crate::scenario::{Scenario, ScenarioSet};
use crate::{Error, Result};

const NAME: &str = "jsenv:css-bundle";

/// Stands in for an import closing a cycle.
const CYCLE_PLACEHOLDER: &str = "/__jsenv__/import-cycle.css";

#[derive(Debug, Default, Clone, Copy)]
pub struct CssBundlePlugin;

/// Whether every referrer of `info` is a stylesheet importing it.
fn only_imported_by_css(info: &UrlInfo, graph: &UrlGraph) -> bool {
    !info.is_entry_point
        && !info.is_inline
        && !info.dependents.is_empty()
        && info.dependents.iter().all(|dependent| {
            graph
                .with_node(dependent, |parent| {
                    parent.url_type == UrlType::Css
                        && parent.references.iter().all(|reference| {
                            reference.url.as_deref() != Some(info.url.as_str())
                                || reference.kind == ReferenceKind::CssImport
                        })
                })
                .unwrap_or(false)
        })
}

#[derive(Debug, thiserror::Error)]
enum SourceError {
    #[error("{} is not part of the bundle", .0.display())]
    Missing(PathBuf),
}

#[derive(Debug, Clone)]
enum ImportTarget {
    Inline(PathBuf),
    /// Left as an `@import` of this URL.
    Keep(String),
}

/// Graph-backed sources of one bundle. Import resolution was done when the
/// graph was built, so `resolve` only looks up where a specifier went.
#[derive(Debug, Default)]
struct GraphSources {
    files: FxHashMap<PathBuf, String>,
    imports: FxHashMap<(PathBuf, String), ImportTarget>,
}

impl SourceProvider for GraphSources {
    type Error = SourceError;

    fn read<'a>(&'a self, file: &Path) -> std::result::Result<&'a str, Self::Error> {
        self.files
            .get(file)
            .map(String::as_str)
            .ok_or_else(|| SourceError::Missing(file.to_path_buf()))
    }

    fn resolve(&self, specifier: &str, originating_file: &Path) -> std::result::Result<ResolveResult, Self::Error> {
        let key = (originating_file.to_path_buf(), specifier.to_string());
        Ok(match self.imports.get(&key) {
            Some(ImportTarget::Inline(path)) => ResolveResult::File(path.clone()),
            Some(ImportTarget::Keep(url)) => ResolveResult::External(url.clone()),
            None => ResolveResult::External(specifier.to_string()),
        })
    }
}

struct Collector<'a> {
    graph: &'a UrlGraph,
    root: &'a Url,
    inlinable: &'a FxHashSet<String>,
    provider: GraphSources,
    /// Root first, then every inlined stylesheet.
    sources: Vec<String>,
}

impl Collector<'_> {
    /// Register `info` and, depth first, the stylesheets it inlines.
    /// `stack` holds the stylesheets being visited, to break import cycles.
    fn visit(&mut self, info: &UrlInfo, path: PathBuf, stack: &mut Vec<String>) -> Result<()> {
        let css = info
            .text()
            .ok_or_else(|| Error::plugin(NAME, format!("{} has no text content", info.url)))?;
        self.provider.files.insert(path.clone(), css.to_string());
        let is_root = stack.is_empty();
        stack.push(info.url.clone());

        for reference in info.references.iter().filter(|r| r.kind == ReferenceKind::CssImport) {
            let key = (path.clone(), reference.specifier.clone());
            let target = reference.url.as_deref().and_then(|url| Url::parse(url).ok());
            let Some(target) = target else {
                self.provider
                    .imports
                    .insert(key, ImportTarget::Keep(reference.specifier.clone()));
                continue;
            };
            let inline = target.scheme() == "file" && self.inlinable.contains(target.as_str());
            if !inline {
                let written = if is_root {
                    reference.specifier.clone()
                } else if target.scheme() == "file" {
                    relative_url(self.root, &target)
                } else {
                    target.to_string()
                };
                self.provider.imports.insert(key, ImportTarget::Keep(written));
                continue;
            }
            if stack.iter().any(|url| url == target.as_str()) {
                let placeholder = PathBuf::from(CYCLE_PLACEHOLDER);
                self.provider.files.insert(placeholder.clone(), String::new());
                self.provider.imports.insert(key, ImportTarget::Inline(placeholder));
                continue;
            }
            let child_path = file_url_to_path(&target).map_err(|e| Error::plugin(NAME, e.to_string()))?;
            self.provider
                .imports
                .insert(key, ImportTarget::Inline(child_path.clone()));
            if self.sources.iter().any(|url| url == target.as_str()) {
                continue;
            }
            let Some(child) = self.graph.get(target.as_str()) else {
                continue;
            };
            self.sources.push(child.url.clone());
            self.visit(&child, child_path, stack)?;
        }
        stack.pop();
        Ok(())
    }
}

/// Rewrites `url()`s coming from inlined stylesheets relative to the root.
struct Rebaser<'a> {
    graph: &'a UrlGraph,
    root: &'a Url,
    /// URL of each lightningcss source index.
    source_urls: Vec<Option<String>>,
}

impl<'i> Visitor<'i> for Rebaser<'_> {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(URLS)
    }

    fn visit_url(&mut self, url: &mut CssUrl<'i>) -> std::result::Result<(), Self::Error> {
        let Some(Some(source)) = self.source_urls.get(url.loc.source_index as usize) else {
            return Ok(());
        };
        if source.as_str() == self.root.as_str() {
            return Ok(());
        }
        let target = self
            .graph
            .with_node(source, |info| {
                info.references
                    .iter()
                    .find(|r| r.kind == ReferenceKind::CssUrl && r.specifier.as_str() == &*url.url)
                    .and_then(|r| r.url.clone())
            })
            .flatten()
            .and_then(|target| Url::parse(&target).ok())
            .filter(|target| target.scheme() == "file");
        if let Some(target) = target {
            url.url = relative_url(self.root, &target).into();
        }
        Ok(())
    }
}

fn bundle_root(
    root: &UrlInfo,
    graph: &UrlGraph,
    inlinable: &FxHashSet<String>,
    minify: bool,
) -> Result<Option<Bundle>> {
    let Ok(root_url) = Url::parse(&root.url) else {
        return Ok(None);
    };
    if root_url.scheme() != "file" {
        return Ok(None);
    }
    let root_path = file_url_to_path(&root_url).map_err(|e| Error::plugin(NAME, e.to_string()))?;
    let mut collector = Collector {
        graph,
        root: &root_url,
        inlinable,
        provider: GraphSources::default(),
        sources: vec![root.url.clone()],
    };
    collector.visit(root, root_path.clone(), &mut Vec::new())?;
    if collector.sources.len() == 1 {
        return Ok(None);
    }
    let Collector { provider, sources, .. } = collector;

    let mut bundler = Bundler::new(&provider, None, parser_options(&root.url));
    let mut stylesheet = bundler
        .bundle(&root_path)
        .map_err(|e| Error::plugin(NAME, format!("cannot bundle {}: {e}", root.url)))?;
    let source_urls = stylesheet
        .sources
        .iter()
        .map(|source| {
            let path = Path::new(source);
            if path == Path::new(CYCLE_PLACEHOLDER) {
                return None;
            }
            jsenv_graph::url::path_to_file_url(path)
                .ok()
                .map(|url| url.to_string())
        })
        .collect();
    let mut rebaser = Rebaser {
        graph,
        root: &root_url,
        source_urls,
    };
    // The rebaser never fails.
    let _ = stylesheet.visit(&mut rebaser);
    let printed = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|e| Error::plugin(NAME, format!("cannot print {}: {e}", root.url)))?;

    tracing::debug!(url = %root.url, inlined = sources.len() - 1, "bundled css");
    Ok(Some(Bundle {
        url: root.url.clone(),
        content: Content::Text(printed.code),
        content_type: "text/css".to_string(),
        sourcemap: None,
        sources,
    }))
}

#[async_trait]
impl Plugin for CssBundlePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::PostProcess
    }

    fn applies_during(&self) -> ScenarioSet {
        ScenarioSet::only(&[Scenario::Preview, Scenario::Prod])
    }

    fn bundle_types(&self) -> &[UrlType] {
        &[UrlType::Css]
    }

    async fn bundle(&self, nodes: &[UrlInfo], ctx: &BundleContext<'_>) -> Result<Vec<Bundle>> {
        let inlinable: FxHashSet<String> = nodes
            .iter()
            .filter(|info| only_imported_by_css(info, ctx.graph))
            .map(|info| info.url.clone())
            .collect();
        if inlinable.is_empty() {
            return Ok(Vec::new());
        }

        let mut roots: Vec<&UrlInfo> = nodes
            .iter()
            .filter(|info| !inlinable.contains(&info.url))
            .collect();
        roots.sort_by(|a, b| a.url.cmp(&b.url));

        let mut bundles: Vec<Bundle> = Vec::new();
        for root in roots {
            if let Some(bundle) = bundle_root(root, ctx.graph, &inlinable, ctx.minify)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildFormat;
    use crate::transform::CssReferencesPlugin;
    use std::collections::BTreeMap;

    fn add_css(graph: &UrlGraph, url: &str, css: &str, resolve: &[(&str, &str)]) {
        let mut info = graph.get_or_create(url);
        info.url_type = UrlType::Css;
        info.content = Some(Content::from(css));
        info.references = CssReferencesPlugin::references(&info, css)
            .unwrap()
            .into_iter()
            .map(|mut reference| {
                reference.url = resolve
                    .iter()
                    .find(|(specifier, _)| *specifier == reference.specifier)
                    .map(|(_, url)| url.to_string());
                reference
            })
            .collect();
        graph.commit(info);
    }

    async fn bundle_all(graph: &UrlGraph) -> Vec<Bundle> {
        let nodes: Vec<UrlInfo> = graph
            .snapshot()
            .into_iter()
            .filter(|info| info.url_type == UrlType::Css)
            .collect();
        let project = Url::parse("file:///p/").unwrap();
        let compat = BTreeMap::new();
        let ctx = BundleContext {
            scenario: Scenario::Prod,
            graph,
            project_url: &project,
            format: BuildFormat::EsModule,
            minify: false,
            runtime_compat: &compat,
        };
        CssBundlePlugin.bundle(&nodes, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_inlines_imports_and_rebases_urls() {
        let graph = UrlGraph::new();
        add_css(
            &graph,
            "file:///p/main.css",
            "@import \"./parts/a.css\";\n@import './print.css' print;\nbody { margin: 0 }\n",
            &[
                ("./parts/a.css", "file:///p/parts/a.css"),
                ("./print.css", "file:///p/print.css"),
            ],
        );
        add_css(
            &graph,
            "file:///p/parts/a.css",
            ".a { background: url(./bg.png); }\n",
            &[("./bg.png", "file:///p/parts/bg.png")],
        );
        add_css(&graph, "file:///p/print.css", "body { color: black }", &[]);
        graph.mark_entry_point("file:///p/main.css");

        let bundles = bundle_all(&graph).await;
        assert_eq!(bundles.len(), 1);
        let bundle = &bundles[0];
        assert_eq!(bundle.url, "file:///p/main.css");
        assert_eq!(
            bundle.sources,
            vec!["file:///p/main.css", "file:///p/parts/a.css", "file:///p/print.css"]
        );
        let css = bundle.content.as_text().unwrap();
        assert!(css.contains("parts/bg.png"), "{css}");
        assert!(!css.contains("./bg.png"), "{css}");
        assert!(css.contains("@media print"), "{css}");
        assert!(!css.contains("@import"), "{css}");
        assert!(css.find(".a").unwrap() < css.find("margin").unwrap(), "{css}");
    }

    #[tokio::test]
    async fn test_shared_stylesheet_keeps_its_import() {
        let graph = UrlGraph::new();
        add_css(
            &graph,
            "file:///p/main.css",
            "@import './parts/a.css';\n.main { color: red }\n",
            &[("./parts/a.css", "file:///p/parts/a.css")],
        );
        add_css(
            &graph,
            "file:///p/parts/a.css",
            "@import '../theme.css';\n.a { color: blue }\n",
            &[("../theme.css", "file:///p/theme.css")],
        );
        add_css(&graph, "file:///p/theme.css", ".theme { color: green }", &[]);
        graph.mark_entry_point("file:///p/main.css");
        // theme.css is also a page stylesheet.
        graph.mark_entry_point("file:///p/theme.css");

        let bundles = bundle_all(&graph).await;
        assert_eq!(bundles.len(), 1);
        let css = bundles[0].content.as_text().unwrap();
        assert!(css.contains("@import"), "{css}");
        assert!(css.contains("theme.css"), "{css}");
        assert!(!css.contains(".theme"), "{css}");
        assert_eq!(bundles[0].sources.len(), 2);
    }

    #[tokio::test]
    async fn test_import_cycles_terminate() {
        let graph = UrlGraph::new();
        add_css(&graph, "file:///p/main.css", "@import './a.css';", &[("./a.css", "file:///p/a.css")]);
        add_css(&graph, "file:///p/a.css", "@import './b.css';\n.a { color: red }", &[("./b.css", "file:///p/b.css")]);
        add_css(&graph, "file:///p/b.css", "@import './a.css';\n.b { color: red }", &[("./a.css", "file:///p/a.css")]);
        graph.mark_entry_point("file:///p/main.css");

        let bundles = bundle_all(&graph).await;
        let main = bundles.iter().find(|b| b.url == "file:///p/main.css").unwrap();
        let css = main.content.as_text().unwrap();
        assert!(!css.contains("@import"), "{css}");
        assert!(css.find(".b").unwrap() < css.find(".a").unwrap(), "{css}");
        assert_eq!(main.sources.len(), 3);
    }
}
