//! Dev kitchen: cooks on request and serves from the graph.
//!
//! Requests map to URLs (`/path` inside the project, `/@fs/<absolute path>`
//! outside of it). A node is cooked the first time it is requested and
//! again after [`DevKitchen::file_changed`] invalidated it. References in
//! served content point at server paths, inline children are spliced back
//! into their parent and JS/CSS get an inline sourcemap.

mod finalize;

pub use finalize::request_path_for;

use jsenv_graph::url::{Url, UrlKind, directory_to_url, path_to_file_url};
use jsenv_graph::{Content, NativeRuntime, Runtime, UrlInfo, content_type};
use path_clean::PathClean;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::CacheConfig;
use crate::fetch::{FetchRequest, PreservedUrls};
use crate::import_map::ImportMap;
use crate::kitchen::{IMPORT_MAP_OWNER, Kitchen, KitchenConfig, KitchenMode};
use crate::plugins::{Plugin, PluginRegistry};
use crate::scenario::Scenario;
use crate::transform::{AUTORELOAD_CLIENT_PATH, BuiltinOptions, builtin_plugins};
use crate::{Error, Result};

/// Prefix of request paths addressing files outside the project.
pub const FS_PREFIX: &str = "/@fs/";

/// Configuration of a dev kitchen.
#[derive(Debug, Clone)]
pub struct DevOptions {
    pub project_directory: PathBuf,
    /// `dev` (default) or `test`.
    pub scenario: Scenario,
    /// Inject the autoreload client into served HTML.
    pub autoreload: bool,
    /// Inline sourcemaps in served JS and CSS.
    pub sourcemaps: bool,
    pub import_map: Option<ImportMap>,
    pub preserved_urls: PreservedUrls,
    pub node_esm_resolution: bool,
    pub filesystem_cache: bool,
    pub cache_directory: Option<PathBuf>,
    pub plugins: PluginRegistry,
    pub runtime: Option<Arc<dyn Runtime>>,
}

impl DevOptions {
    pub fn new(project_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_directory: project_directory.into(),
            scenario: Scenario::Dev,
            autoreload: true,
            sourcemaps: true,
            import_map: None,
            preserved_urls: PreservedUrls::default(),
            node_esm_resolution: true,
            filesystem_cache: false,
            cache_directory: None,
            plugins: PluginRegistry::new(),
            runtime: None,
        }
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn autoreload(mut self, enabled: bool) -> Self {
        self.autoreload = enabled;
        self
    }

    pub fn sourcemaps(mut self, enabled: bool) -> Self {
        self.sourcemaps = enabled;
        self
    }

    pub fn import_map(mut self, import_map: ImportMap) -> Self {
        self.import_map = Some(import_map);
        self
    }

    pub fn preserved_urls(mut self, preserved_urls: PreservedUrls) -> Self {
        self.preserved_urls = preserved_urls;
        self
    }

    pub fn node_esm_resolution(mut self, enabled: bool) -> Self {
        self.node_esm_resolution = enabled;
        self
    }

    pub fn filesystem_cache(mut self, enabled: bool) -> Self {
        self.filesystem_cache = enabled;
        self
    }

    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scenario.is_build() {
            return Err(Error::InvalidConfig(format!(
                "cannot serve the \"{}\" scenario (expected dev or test)",
                self.scenario
            )));
        }
        Ok(())
    }
}

/// Response body and validators of a served node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedResource {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Quoted entity tag of `body`.
    pub etag: String,
    /// Milliseconds since the Unix epoch, when the source has one.
    pub last_modified: Option<u64>,
}

impl ServedResource {
    /// Whether a conditional request can be answered with `304`.
    ///
    /// `If-None-Match` wins over `If-Modified-Since` when both are sent.
    pub fn is_not_modified(&self, if_none_match: Option<&str>, if_modified_since: Option<u64>) -> bool {
        if let Some(tags) = if_none_match {
            return tags
                .split(',')
                .map(str::trim)
                .any(|tag| tag == "*" || tag.trim_start_matches("W/") == self.etag);
        }
        match (if_modified_since, self.last_modified) {
            // HTTP dates have second precision.
            (Some(since), Some(modified)) => modified / 1000 <= since / 1000,
            _ => false,
        }
    }
}

fn etag_of(body: &[u8]) -> String {
    format!("\"{}\"", &blake3::hash(body).to_hex()[..16])
}

/// Status code and reason phrase for a failed request.
pub fn error_status(error: &Error) -> (u16, &'static str) {
    match error.root() {
        Error::Parse(_) => (500, "parse error"),
        Error::ResourceNotFound { .. } => (404, "not found"),
        Error::UrlResolution { .. } => (500, "cannot resolve specifier"),
        Error::Multiple(errors) => errors.first().map_or((500, "internal error"), error_status),
        _ => (500, "internal error"),
    }
}

#[derive(Debug, Clone)]
pub struct DevKitchen {
    kitchen: Kitchen,
    project_directory: PathBuf,
    sourcemaps: bool,
}

impl DevKitchen {
    pub fn new(options: DevOptions) -> Result<Self> {
        options.validate()?;
        let runtime: Arc<dyn Runtime> = match options.runtime.clone() {
            Some(runtime) => runtime,
            None => Arc::new(NativeRuntime::new()),
        };
        let project_directory = if options.project_directory.is_absolute() {
            options.project_directory.clean()
        } else {
            runtime.get_cwd()?.join(&options.project_directory).clean()
        };
        let project_url = directory_to_url(&project_directory).map_err(jsenv_graph::Error::from)?;

        let mut plugins = builtin_plugins(BuiltinOptions {
            autoreload: options.autoreload,
            css_bundle: false,
        });
        plugins.extend(&options.plugins);
        let cache = options.filesystem_cache.then(|| {
            CacheConfig::new(
                options
                    .cache_directory
                    .clone()
                    .unwrap_or_else(|| project_directory.join(".jsenv").join("cache")),
            )
        });
        let config = KitchenConfig::new(options.scenario, project_url, runtime)
            .with_plugins(plugins)
            .with_import_map(options.import_map)
            .with_preserved_urls(options.preserved_urls)
            .with_node_esm_resolution(options.node_esm_resolution)
            .with_mode(KitchenMode::Dev)
            .with_cache(cache);
        tracing::info!(project = %project_directory.display(), scenario = %options.scenario, "dev kitchen ready");
        Ok(Self {
            kitchen: Kitchen::new(config)?,
            project_directory,
            sourcemaps: options.sourcemaps,
        })
    }

    pub fn kitchen(&self) -> &Kitchen {
        &self.kitchen
    }

    pub fn project_directory(&self) -> &Path {
        &self.project_directory
    }

    /// URL addressed by a request path. `None` for paths that cannot be
    /// files (the autoreload client, malformed `/@fs/` paths).
    pub fn url_for_request(&self, request_path: &str) -> Option<String> {
        let without_fragment = request_path.split('#').next().unwrap_or(request_path);
        let (path, query) = match without_fragment.find('?') {
            Some(index) => without_fragment.split_at(index),
            None => (without_fragment, ""),
        };
        if path == AUTORELOAD_CLIENT_PATH {
            return None;
        }
        let project_url = &self.kitchen.config().project_url;
        let mut url = if let Some(absolute) = path.strip_prefix(FS_PREFIX) {
            let decoded = percent_decode_str(absolute).decode_utf8().ok()?;
            path_to_file_url(&Path::new("/").join(decoded.as_ref())).ok()?
        } else {
            let relative = path.trim_start_matches('/');
            let relative = if relative.is_empty() || relative.ends_with('/') {
                format!("{relative}index.html")
            } else {
                relative.to_string()
            };
            project_url.join(&relative).ok()?
        };
        if let Some(query) = query.strip_prefix('?') {
            url.set_query(Some(query));
        }
        // `..` segments are normalized by the URL parser; anything left
        // outside the project must come in through `/@fs/`.
        if UrlKind::of(&url) != UrlKind::File {
            return None;
        }
        Some(url.to_string())
    }

    /// Cook (when needed) and serve the node behind `request_path`.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] for unknown paths, fetch and parse errors
    /// of the node. Reference errors are logged and leave the specifier as
    /// written.
    pub async fn serve(&self, request_path: &str, headers: &[(String, String)]) -> Result<ServedResource> {
        let url = self
            .url_for_request(request_path)
            .ok_or_else(|| Error::ResourceNotFound {
                url: request_path.to_string(),
                importer_url: None,
                specifier: None,
            })?;
        let request = FetchRequest {
            importer_url: None,
            specifier: None,
            headers: headers.to_vec(),
        };
        self.ensure_cooked(&url, &request).await?;

        let graph = self.kitchen.graph();
        let info = graph
            .get(&url)
            .ok_or_else(|| jsenv_graph::Error::NodeNotFound(url.clone()))?;
        let content_type = info
            .content_type
            .clone()
            .unwrap_or_else(|| content_type::DEFAULT_CONTENT_TYPE.to_string());
        let body = match &info.content {
            Some(Content::Binary(bytes)) => bytes.clone(),
            Some(Content::Text(_)) => {
                finalize::finalize_for_serving(&self.kitchen, &info, self.sourcemaps)
                    .await?
                    .into_bytes()
            }
            None => {
                return Err(Error::ResourceNotFound {
                    url,
                    importer_url: None,
                    specifier: None,
                });
            }
        };
        let last_modified = self.last_modified_of(&info);
        tracing::debug!(url = %info.url, bytes = body.len(), "served");
        Ok(ServedResource {
            etag: etag_of(&body),
            url: info.url,
            body,
            content_type,
            last_modified,
        })
    }

    /// Newest mtime among the inputs of `info`: its source and the page
    /// declaring the import map its specifiers were resolved with.
    fn last_modified_of(&self, info: &UrlInfo) -> Option<u64> {
        let own = info.last_modified?;
        let Some(owner) = info.data.get(IMPORT_MAP_OWNER).and_then(Value::as_str) else {
            return Some(own);
        };
        let owner_modified = self
            .kitchen
            .graph()
            .with_node(owner, |owner| owner.last_modified)
            .flatten()?;
        Some(own.max(owner_modified))
    }

    /// Cook `url` unless it is cooked already, then its inline children.
    async fn ensure_cooked(&self, url: &str, request: &FetchRequest) -> Result<()> {
        let graph = self.kitchen.graph();
        let mut pending = vec![(url.to_string(), request.clone())];
        while let Some((current, request)) = pending.pop() {
            let cooked = graph.with_node(&current, |info| info.cooked).unwrap_or(false);
            if !cooked {
                let outcome = self.kitchen.cook(&current, &request).await?;
                if outcome.stale {
                    // Invalidated meanwhile; cook the new generation.
                    self.kitchen.cook(&current, &request).await?;
                }
            }
            let inline_children: Vec<(String, FetchRequest)> = graph
                .with_node(&current, |info| inline_children_of(info))
                .unwrap_or_default();
            pending.extend(inline_children);
        }
        Ok(())
    }

    /// Invalidate the node backed by `path` and everything depending on it.
    /// Returns the affected URLs, empty when the file is not in the graph.
    pub fn file_changed(&self, path: &Path) -> Vec<String> {
        let Ok(url) = path_to_file_url(&path.clean()) else {
            return Vec::new();
        };
        let graph = self.kitchen.graph();
        if !graph.contains(url.as_str()) {
            return Vec::new();
        }
        let affected = graph.invalidate(url.as_str());
        tracing::info!(url = %url, affected = affected.len(), "file changed");
        affected
    }

    /// Request paths of `urls`, for reload messages.
    pub fn request_paths(&self, urls: &[String]) -> Vec<String> {
        let project_url = &self.kitchen.config().project_url;
        urls.iter()
            .filter(|url| !self.kitchen.graph().with_node(url, |info| info.is_inline).unwrap_or(false))
            .filter_map(|url| Url::parse(url).ok())
            .filter_map(|url| request_path_for(&url, project_url))
            .collect()
    }
}

fn inline_children_of(info: &UrlInfo) -> Vec<(String, FetchRequest)> {
    info.references
        .iter()
        .filter(|reference| reference.is_inline())
        .filter_map(|reference| {
            let url = reference.url.clone()?;
            Some((
                url,
                FetchRequest {
                    importer_url: Some(info.url.clone()),
                    specifier: Some(reference.specifier.clone()),
                    headers: Vec::new(),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsenv_graph::runtime::test_utils::TestRuntime;

    fn dev(runtime: &TestRuntime) -> DevKitchen {
        DevKitchen::new(
            DevOptions::new("/p")
                .runtime(Arc::new(runtime.clone()))
                .node_esm_resolution(false),
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_request() {
        let kitchen = dev(&TestRuntime::new("/p"));
        assert_eq!(kitchen.url_for_request("/").as_deref(), Some("file:///p/index.html"));
        assert_eq!(
            kitchen.url_for_request("/js/main.js?v=1#top").as_deref(),
            Some("file:///p/js/main.js?v=1")
        );
        assert_eq!(
            kitchen.url_for_request("/@fs/opt/lib/a.js").as_deref(),
            Some("file:///opt/lib/a.js")
        );
        assert_eq!(kitchen.url_for_request(AUTORELOAD_CLIENT_PATH), None);
    }

    #[tokio::test]
    async fn test_serve_rewrites_and_injects_autoreload() {
        let runtime = TestRuntime::new("/p")
            .with_file(
                "/p/index.html",
                "<html><head><meta charset=\"utf-8\"></head><body><script type=\"module\" src=\"./main.js\"></script></body></html>",
            )
            .with_file("/p/main.js", "import { a } from '../lib/a.js';\nconsole.log(a, import.meta.dev);\n")
            .with_file("/lib/a.js", "export const a = 1;\n");
        let kitchen = dev(&runtime);

        let html = kitchen.serve("/", &[]).await.unwrap();
        let html_text = String::from_utf8(html.body.clone()).unwrap();
        assert_eq!(html.content_type, "text/html");
        assert!(html_text.contains("src=\"/main.js\""));
        assert!(html_text.contains(AUTORELOAD_CLIENT_PATH));

        let js = kitchen.serve("/main.js", &[]).await.unwrap();
        let js_text = String::from_utf8(js.body).unwrap();
        assert!(js_text.contains("from '/@fs/lib/a.js'"));
        assert!(js_text.contains("console.log(a, true)"));
        assert!(js_text.contains("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));

        let lib = kitchen.serve("/@fs/lib/a.js", &[]).await.unwrap();
        assert!(String::from_utf8(lib.body).unwrap().starts_with("export const a = 1;"));
    }

    #[tokio::test]
    async fn test_conditional_requests() {
        let runtime = TestRuntime::new("/p").with_file("/p/main.css", "body { color: red; }\n");
        let kitchen = dev(&runtime);

        let first = kitchen.serve("/main.css", &[]).await.unwrap();
        assert!(first.is_not_modified(Some(&first.etag), None));
        assert!(first.is_not_modified(None, first.last_modified));
        assert!(!first.is_not_modified(Some("\"other\""), None));
        let again = kitchen.serve("/main.css", &[]).await.unwrap();
        assert_eq!(again.etag, first.etag);

        runtime.set_file("/p/main.css", "body { color: blue; }\n");
        let affected = kitchen.file_changed(Path::new("/p/main.css"));
        assert_eq!(affected, vec!["file:///p/main.css"]);
        let changed = kitchen.serve("/main.css", &[]).await.unwrap();
        assert_ne!(changed.etag, first.etag);
        assert!(!changed.is_not_modified(Some(&first.etag), None));
        assert!(!changed.is_not_modified(None, first.last_modified));
    }

    #[tokio::test]
    async fn test_import_map_edit_defeats_if_modified_since() {
        let page = |target: &str| {
            format!(
                "<script type=\"importmap\">{{\"imports\":{{\"lib\":\"./{target}\"}}}}</script><script type=\"module\" src=\"./main.js\"></script>"
            )
        };
        let runtime = TestRuntime::new("/p")
            .with_file("/p/index.html", page("a.js"))
            .with_file("/p/main.js", "import 'lib';\n")
            .with_file("/p/a.js", "export {};\n")
            .with_file("/p/b.js", "export {};\n");
        let kitchen = dev(&runtime);
        kitchen.serve("/", &[]).await.unwrap();
        let first = kitchen.serve("/main.js", &[]).await.unwrap();
        assert!(first.is_not_modified(None, first.last_modified));

        runtime.set_file("/p/index.html", page("b.js"));
        kitchen.file_changed(Path::new("/p/index.html"));
        kitchen.serve("/", &[]).await.unwrap();
        let after = kitchen.serve("/main.js", &[]).await.unwrap();
        assert!(after.last_modified > first.last_modified);
        assert!(!after.is_not_modified(None, first.last_modified));
    }

    #[tokio::test]
    async fn test_file_changed_reaches_dependents_only() {
        let runtime = TestRuntime::new("/p")
            .with_file("/p/index.html", "<script type=\"module\" src=\"./main.js\"></script>")
            .with_file("/p/main.js", "import './dep.js';\n")
            .with_file("/p/dep.js", "export {};\n")
            .with_file("/p/other.js", "export {};\n");
        let kitchen = dev(&runtime);
        kitchen.serve("/", &[]).await.unwrap();
        kitchen.serve("/main.js", &[]).await.unwrap();
        kitchen.serve("/dep.js", &[]).await.unwrap();
        kitchen.serve("/other.js", &[]).await.unwrap();

        let mut affected = kitchen.file_changed(Path::new("/p/dep.js"));
        affected.sort();
        assert_eq!(
            affected,
            vec!["file:///p/dep.js", "file:///p/index.html", "file:///p/main.js"]
        );
        assert!(kitchen.file_changed(Path::new("/p/unknown.js")).is_empty());
        let graph = kitchen.kitchen().graph();
        assert!(graph.with_node("file:///p/other.js", |info| info.cooked).unwrap());
        assert!(!graph.with_node("file:///p/main.js", |info| info.cooked).unwrap());
    }

    #[tokio::test]
    async fn test_parse_error_status() {
        let runtime = TestRuntime::new("/p").with_file("/p/broken.js", "export const = ;\n");
        let kitchen = dev(&runtime);
        let error = kitchen.serve("/broken.js", &[]).await.unwrap_err();
        assert_eq!(error_status(&error), (500, "parse error"));

        let missing = kitchen.serve("/missing.js", &[]).await.unwrap_err();
        assert_eq!(error_status(&missing), (404, "not found"));
    }
}
