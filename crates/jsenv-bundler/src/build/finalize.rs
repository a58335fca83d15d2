//! Finalize: where each node lands in the build directory and what its
//! content says once specifiers point there.
//!
//! Specifiers to versioned files are written with the target's placeholder
//! in place of the version; [`super::versioning`] substitutes them once
//! every version is known.

use jsenv_graph::sourcemap::{self, SourcemapComment};
use jsenv_graph::url::{
    Url, UrlKind, extension_of, inject_version_in_filename, relative_url, url_to_relative,
};
use jsenv_graph::{Content, EditBatch, ReferenceKind, SourceMap, UrlGraph, UrlInfo, UrlType, content_type};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

use super::options::SourcemapMode;
use super::placeholder::PlaceholderTable;
use crate::kitchen::Kitchen;
use crate::plugins::FinalizeContext;
use crate::{Error, Result};

const NAME: &str = "jsenv:finalize";

/// Characters escaped when a build path is written as a specifier.
/// Placeholder characters are not among them.
const SPECIFIER: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Build-relative path of a URL, without version: the project-relative
/// path for project files, `@fs/<absolute path>` for other files and
/// `@remote/<host>/<path>` for remote URLs.
pub fn build_path(url: &Url, project_url: &Url, content_type: Option<&str>) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    let raw = match UrlKind::of(&clean) {
        UrlKind::File => url_to_relative(&clean, project_url)
            .unwrap_or_else(|| format!("@fs{}", clean.path())),
        UrlKind::Http => {
            let host = match (clean.host_str(), clean.port()) {
                (Some(host), Some(port)) => format!("{host}_{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => "unknown".to_string(),
            };
            format!("@remote/{host}{}", clean.path())
        }
        UrlKind::Data | UrlKind::Other => jsenv_graph::url::url_filename(&clean),
    };
    let mut path = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index");
    }
    if extension_of(&path).is_none() {
        if let Some(extension) = content_type.and_then(content_type::extension_for) {
            path.push('.');
            path.push_str(extension);
        }
    }
    path
}

/// Path leading from the file at `from` to `to`, both build-relative.
pub fn relative_path(from: &str, to: &str) -> String {
    let from_segments: Vec<&str> = from.split('/').collect();
    let from_dir = &from_segments[..from_segments.len().saturating_sub(1)];
    let to_segments: Vec<&str> = to.split('/').collect();
    let common = from_dir
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_segments.len().saturating_sub(1));
    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_segments[common..]);
    parts.join("/")
}

/// Where every emitted node goes.
#[derive(Debug, Default)]
pub(crate) struct Layout {
    /// Emitted URL to its unversioned build path.
    pub paths: BTreeMap<String, String>,
    pub versioned: BTreeSet<String>,
    /// Files produced outside of this build (sub-builds), by URL.
    pub external: BTreeMap<String, String>,
}

fn is_emitted(info: &UrlInfo) -> bool {
    info.cooked
        && !info.is_inline
        && info.content.is_some()
        && info.url_type != UrlType::Sourcemap
        && matches!(UrlKind::of_str(&info.url), UrlKind::File | UrlKind::Http)
}

/// Entry HTML keeps its name so it can be served as is; service workers
/// keep theirs so browsers see updates at the registered URL.
fn is_versionable(info: &UrlInfo) -> bool {
    !(info.is_entry_point && info.url_type == UrlType::Html) && !info.is_service_worker()
}

impl Layout {
    /// Lay out everything reachable from the entry points. Versioned nodes
    /// get a placeholder, in URL order.
    pub fn plan(
        graph: &UrlGraph,
        project_url: &Url,
        external: BTreeMap<String, String>,
        versioning: bool,
        placeholders: &mut PlaceholderTable,
    ) -> Result<Self> {
        let mut emitted: Vec<UrlInfo> = graph
            .dependencies_closure(&graph.entry_points())
            .into_iter()
            .filter(|url| !external.contains_key(url))
            .filter_map(|url| graph.get(&url))
            .filter(is_emitted)
            .collect();
        emitted.sort_by(|a, b| a.url.cmp(&b.url));

        let mut layout = Layout {
            external,
            ..Layout::default()
        };
        let mut taken: BTreeSet<String> = layout.external.values().cloned().collect();
        for info in &emitted {
            let Ok(url) = Url::parse(&info.url) else {
                continue;
            };
            let mut path = build_path(&url, project_url, info.content_type.as_deref());
            let mut suffix = 2;
            while taken.contains(&path) {
                path = inject_version_in_filename(
                    &build_path(&url, project_url, info.content_type.as_deref()),
                    &suffix.to_string(),
                );
                suffix += 1;
            }
            taken.insert(path.clone());
            layout.paths.insert(info.url.clone(), path);
            if versioning && is_versionable(info) {
                placeholders.allocate(&info.url)?;
                layout.versioned.insert(info.url.clone());
            }
        }
        tracing::debug!(
            files = layout.paths.len(),
            versioned = layout.versioned.len(),
            external = layout.external.len(),
            "build layout"
        );
        Ok(layout)
    }
}

/// One build file before versions are known.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub url: String,
    /// Unversioned build path.
    pub path: String,
    pub content: Content,
    pub versioned: bool,
    /// JSON of the `.map` file written next to this one.
    pub sourcemap: Option<String>,
}

pub(crate) struct Finalizer<'a> {
    pub kitchen: &'a Kitchen,
    pub build_url: &'a Url,
    pub base: Option<&'a str>,
    pub sourcemaps: SourcemapMode,
    pub layout: &'a Layout,
    pub placeholders: &'a PlaceholderTable,
}

impl Finalizer<'_> {
    /// Draft every emitted file, sorted by URL.
    pub async fn run(&self) -> Result<Vec<Draft>> {
        let graph = self.kitchen.graph();
        let inline_content = self.finalize_inline_nodes(graph).await?;

        let mut drafts = Vec::with_capacity(self.layout.paths.len());
        for (url, path) in &self.layout.paths {
            let Some(info) = graph.get(url) else {
                continue;
            };
            let versioned = self.layout.versioned.contains(url);
            let Some(content) = info.content.clone() else {
                continue;
            };
            let draft = match content {
                Content::Binary(_) => Draft {
                    url: url.clone(),
                    path: path.clone(),
                    content,
                    versioned,
                    sourcemap: None,
                },
                Content::Text(_) => {
                    let (text, edit_map) = self.rewrite(&info, path, &inline_content)?;
                    let text = self.run_finalize_hooks(&info, text).await?;
                    let (text, sourcemap) = self.attach_sourcemap(&info, path, text, edit_map);
                    Draft {
                        url: url.clone(),
                        path: path.clone(),
                        content: Content::Text(text),
                        versioned,
                        sourcemap,
                    }
                }
            };
            drafts.push(draft);
        }
        Ok(drafts)
    }

    /// Final text of each inline node, innermost first, as written inside
    /// the file of its outermost parent.
    async fn finalize_inline_nodes(&self, graph: &UrlGraph) -> Result<FxHashMap<String, String>> {
        let mut inline_nodes: Vec<(usize, UrlInfo, String)> = graph
            .snapshot()
            .into_iter()
            .filter(|info| info.is_inline && info.cooked)
            .filter_map(|info| {
                let (depth, host) = host_of(graph, &info)?;
                let host_path = self.layout.paths.get(&host)?.clone();
                Some((depth, info, host_path))
            })
            .collect();
        inline_nodes.sort_by(|(a_depth, a, _), (b_depth, b, _)| {
            b_depth.cmp(a_depth).then_with(|| a.url.cmp(&b.url))
        });

        let mut finalized: FxHashMap<String, String> = FxHashMap::default();
        for (_, info, host_path) in inline_nodes {
            if info.text().is_none() {
                continue;
            }
            let (text, _) = self.rewrite(&info, &host_path, &finalized)?;
            let text = self.run_finalize_hooks(&info, text).await?;
            finalized.insert(info.url.clone(), sourcemap::strip_comment(&text).to_string());
        }
        Ok(finalized)
    }

    /// Specifier of `target` as written in the file at `host_path`.
    fn specifier_for(&self, target: &str, host_path: &str, js: bool) -> Option<String> {
        let path = match self.layout.external.get(target) {
            Some(path) => path.clone(),
            None => {
                let path = self.layout.paths.get(target)?;
                match self.placeholders.token_of(target) {
                    Some(token) if self.layout.versioned.contains(target) => {
                        inject_version_in_filename(path, token)
                    }
                    _ => path.clone(),
                }
            }
        };
        let path = utf8_percent_encode(&path, SPECIFIER).to_string();
        Some(match self.base {
            Some(base) => format!("{base}{path}"),
            None => {
                let relative = relative_path(host_path, &path);
                if js && !relative.starts_with("../") {
                    format!("./{relative}")
                } else {
                    relative
                }
            }
        })
    }

    /// Content of `info` with specifiers pointing at build files and inline
    /// children spliced in, plus the map of those edits.
    fn rewrite(
        &self,
        info: &UrlInfo,
        host_path: &str,
        inline_content: &FxHashMap<String, String>,
    ) -> Result<(String, SourceMap)> {
        let text = info
            .text()
            .ok_or_else(|| Error::plugin(NAME, format!("{} has no text content", info.url)))?;
        let mut batch = EditBatch::new();
        for reference in &info.references {
            if !reference.is_rewritable() || reference.preserved {
                continue;
            }
            let Some(target) = reference.url.as_deref() else {
                continue;
            };
            if reference.is_inline() {
                if reference.kind == ReferenceKind::ImportMap {
                    // Specifiers are resolved already.
                    batch.replace(reference.start, reference.end, "");
                } else if let Some(body) = inline_content.get(target) {
                    batch.replace(reference.start, reference.end, body.clone());
                }
                continue;
            }
            if let Some(specifier) = self.specifier_for(target, host_path, info.url_type.is_js()) {
                batch.replace(reference.start, reference.end, specifier);
            }
        }
        batch
            .apply_with_map(text, &info.url)
            .map_err(|e| Error::plugin(NAME, format!("{}: {e}", info.url)))
    }

    async fn run_finalize_hooks(&self, info: &UrlInfo, mut text: String) -> Result<String> {
        let config = self.kitchen.config();
        let ctx = FinalizeContext {
            scenario: config.scenario,
            project_url: &config.project_url,
        };
        for plugin in self.kitchen.plugins().iter() {
            if let Some(updated) = plugin.finalize_url_content(info, &text, &ctx).await? {
                text = updated;
            }
        }
        Ok(text)
    }

    /// Apply the sourcemap mode to a JS or CSS file. Returns the content and
    /// the JSON of a map file to write next to it.
    fn attach_sourcemap(
        &self,
        info: &UrlInfo,
        path: &str,
        text: String,
        edit_map: SourceMap,
    ) -> (String, Option<String>) {
        if !info.url_type.supports_sourcemap() {
            return (text, None);
        }
        let kind = if info.url_type == UrlType::Css {
            SourcemapComment::Css
        } else {
            SourcemapComment::Js
        };
        match self.sourcemaps {
            SourcemapMode::None => (sourcemap::strip_comment(&text).to_string(), None),
            SourcemapMode::Inline => {
                let map = self.relocated_map(info, path, edit_map);
                let text = sourcemap::set_comment(&text, kind, &sourcemap::to_data_url(&map));
                (text, None)
            }
            SourcemapMode::File => {
                let map = self.relocated_map(info, path, edit_map);
                let file_path = match self.placeholders.token_of(&info.url) {
                    Some(token) if self.layout.versioned.contains(&info.url) => {
                        inject_version_in_filename(path, token)
                    }
                    _ => path.to_string(),
                };
                let file_name = file_path.rsplit('/').next().unwrap_or(&file_path);
                let map_name = utf8_percent_encode(&format!("{file_name}.map"), SPECIFIER).to_string();
                let text = sourcemap::set_comment(&text, kind, &map_name);
                (text, Some(sourcemap::to_json(&map)))
            }
        }
    }

    /// Map from the build file to the original sources, sources written
    /// relative to the directory of the build file.
    fn relocated_map(&self, info: &UrlInfo, path: &str, edit_map: SourceMap) -> SourceMap {
        let map = sourcemap::chain(info.sourcemap.as_ref(), Some(edit_map))
            .unwrap_or_else(|| sourcemap::identity(&info.url, info.text().unwrap_or_default()));
        let directory = match path.rfind('/') {
            Some(index) => self.build_url.join(&path[..=index]).ok(),
            None => Some(self.build_url.clone()),
        };
        let Some(directory) = directory else {
            return map;
        };
        sourcemap::rename_sources(&map, |source| match Url::parse(source) {
            Ok(source_url) if source_url.scheme() == "file" => {
                relative_url(&directory, &source_url)
            }
            _ => source.to_string(),
        })
    }
}

/// Depth and outermost non-inline ancestor of an inline node.
fn host_of(graph: &UrlGraph, info: &UrlInfo) -> Option<(usize, String)> {
    let mut depth = 1;
    let mut parent = info.inline_parent.clone()?;
    loop {
        let (is_inline, next) = graph.with_node(&parent, |node| (node.is_inline, node.inline_parent.clone()))?;
        if !is_inline {
            return Some((depth, parent));
        }
        depth += 1;
        // Inline chains are shallow; a loop means a corrupted graph.
        if depth > 16 {
            return None;
        }
        parent = next?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    #[test]
    fn test_build_path() {
        let project = url("file:///p/src/");
        assert_eq!(build_path(&url("file:///p/src/js/main.js?v=1"), &project, None), "js/main.js");
        assert_eq!(
            build_path(&url("file:///p/node_modules/lib/index.js"), &project, None),
            "@fs/p/node_modules/lib/index.js"
        );
        assert_eq!(
            build_path(&url("https://cdn.example.com/lib/react"), &project, Some("text/javascript")),
            "@remote/cdn.example.com/lib/react.js"
        );
        assert_eq!(
            build_path(&url("http://localhost:8080/a.css"), &project, None),
            "@remote/localhost_8080/a.css"
        );
        assert_eq!(
            build_path(&url("file:///p/src/my%20file.css"), &project, None),
            "my file.css"
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("main.html", "main_1a2b3c4d.js"), "main_1a2b3c4d.js");
        assert_eq!(relative_path("js/a.js", "js/b.js"), "b.js");
        assert_eq!(relative_path("js/a.js", "img/x.png"), "../img/x.png");
        assert_eq!(relative_path("a/b/c.css", "a/x.png"), "../x.png");
        assert_eq!(relative_path("index.html", "css/main.css"), "css/main.css");
        assert_eq!(relative_path("js/js.js", "js"), "../js");
    }

    #[test]
    fn test_versionable() {
        let mut html = UrlInfo::new("file:///p/index.html");
        html.url_type = UrlType::Html;
        html.is_entry_point = true;
        assert!(!is_versionable(&html));
        html.is_entry_point = false;
        assert!(is_versionable(&html));

        let mut sw = UrlInfo::new("file:///p/sw.js");
        sw.subtype = Some(jsenv_graph::Subtype::ServiceWorker);
        assert!(!is_versionable(&sw));
    }
}
