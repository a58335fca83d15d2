//! Per-node pipeline shared by the build and the dev server.
//!
//! [`Kitchen::cook`] takes one URL through fetch, type detection,
//! transforms and reference resolution, then commits the result to the
//! graph. The commit is conditional on the node's generation: a node
//! invalidated while it was being cooked keeps its newer state and the
//! stale result is dropped.
//!
//! Nodes never hold pointers to each other. Everything a parent knows about
//! a child (expected type, inline content, import map in effect) is written
//! to the child node after the parent commits.

use jsenv_graph::content_type;
use jsenv_graph::runtime::Runtime;
use jsenv_graph::sourcemap;
use jsenv_graph::url::Url;
use jsenv_graph::{Content, Reference, ReferenceKind, UrlGraph, UrlInfo, UrlType};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{
    CacheConfig, CacheEntry, CacheKey, CompileCache, CompilerOptions, SourceState,
    compute_cache_key,
};
use crate::fetch::{FetchRequest, Fetcher, PreservedUrls};
use crate::import_map::ImportMap;
use crate::plugins::{PluginList, PluginPhase, PluginRegistry, TransformContext};
use crate::resolver::Resolver;
use crate::scenario::Scenario;
use crate::transform::{BuiltinOptions, builtin_plugins};
use crate::{Error, Result};

/// Node data key naming the node whose import map applies.
pub const IMPORT_MAP_OWNER: &str = "import_map_owner";

/// Node data key holding the type the node's referrers expect.
pub const EXPECTED_TYPE: &str = "expected_type";

/// Node data key set when HTTP redirects changed where content came from.
pub const ORIGINAL_URL: &str = "original_url";

/// How failures of one reference are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitchenMode {
    /// Every failure is reported; the build fails after the walk.
    Build,
    /// Failures are logged and the reference stays unresolved.
    Dev,
}

impl KitchenMode {
    pub fn for_scenario(scenario: Scenario) -> Self {
        if scenario.is_build() {
            KitchenMode::Build
        } else {
            KitchenMode::Dev
        }
    }
}

#[derive(Debug, Clone)]
pub struct KitchenConfig {
    pub scenario: Scenario,
    pub mode: KitchenMode,
    /// Directory URL of the project (trailing slash).
    pub project_url: Url,
    pub runtime: Arc<dyn Runtime>,
    pub plugins: PluginRegistry,
    /// Import map applying to every node, below HTML-declared ones.
    pub import_map: Option<ImportMap>,
    pub preserved_urls: PreservedUrls,
    pub node_esm_resolution: bool,
    pub runtime_compat: BTreeMap<String, String>,
    pub minify: bool,
    /// Compile cache location; `None` disables caching.
    pub cache: Option<CacheConfig>,
}

impl KitchenConfig {
    /// Configuration with the built-in plugins and defaults for `scenario`.
    pub fn new(scenario: Scenario, project_url: Url, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            scenario,
            mode: KitchenMode::for_scenario(scenario),
            project_url,
            runtime,
            plugins: builtin_plugins(BuiltinOptions::default()),
            import_map: None,
            preserved_urls: PreservedUrls::default(),
            node_esm_resolution: true,
            runtime_compat: BTreeMap::new(),
            minify: false,
            cache: None,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_import_map(mut self, import_map: Option<ImportMap>) -> Self {
        self.import_map = import_map;
        self
    }

    pub fn with_preserved_urls(mut self, preserved_urls: PreservedUrls) -> Self {
        self.preserved_urls = preserved_urls;
        self
    }

    pub fn with_cache(mut self, cache: Option<CacheConfig>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mode(mut self, mode: KitchenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_node_esm_resolution(mut self, enabled: bool) -> Self {
        self.node_esm_resolution = enabled;
        self
    }
}

/// A resolved reference the walker should cook next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub url: String,
    pub importer_url: String,
    pub specifier: String,
}

impl Dependency {
    pub fn request(&self) -> FetchRequest {
        FetchRequest {
            importer_url: Some(self.importer_url.clone()),
            specifier: Some(self.specifier.clone()),
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CookOutcome {
    pub url: String,
    /// Distinct targets of resolved, non-preserved references, in source
    /// order.
    pub dependencies: Vec<Dependency>,
    /// References that failed to resolve.
    pub errors: Vec<Error>,
    pub from_cache: bool,
    /// The node was invalidated meanwhile; nothing was committed.
    pub stale: bool,
}

#[derive(Debug, Clone)]
pub struct Kitchen {
    inner: Arc<KitchenInner>,
}

#[derive(Debug)]
struct KitchenInner {
    config: KitchenConfig,
    graph: UrlGraph,
    plugins: Arc<PluginList>,
    resolver: Resolver,
    fetcher: Fetcher,
    cache: Option<CompileCache>,
    /// Import maps declared by HTML nodes, keyed by the declaring URL.
    import_maps: RwLock<FxHashMap<String, ImportMap>>,
}

impl Kitchen {
    pub fn new(config: KitchenConfig) -> Result<Self> {
        Self::with_graph(config, UrlGraph::new())
    }

    /// Kitchen cooking into an existing graph.
    pub fn with_graph(config: KitchenConfig, graph: UrlGraph) -> Result<Self> {
        let plugins = Arc::new(config.plugins.for_scenario(config.scenario));
        let resolver = Resolver::new(
            plugins.clone(),
            config.project_url.clone(),
            config.scenario,
            config.node_esm_resolution,
        );
        let fetcher = Fetcher::new(
            plugins.clone(),
            config.runtime.clone(),
            config.project_url.clone(),
            config.scenario,
        );
        let cache = config.cache.clone().map(CompileCache::open).transpose()?;
        tracing::debug!(
            scenario = %config.scenario,
            plugins = ?plugins.names(),
            cache = cache.is_some(),
            "kitchen ready"
        );
        Ok(Self {
            inner: Arc::new(KitchenInner {
                config,
                graph,
                plugins,
                resolver,
                fetcher,
                cache,
                import_maps: RwLock::new(FxHashMap::default()),
            }),
        })
    }

    pub fn graph(&self) -> &UrlGraph {
        &self.inner.graph
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.inner.config
    }

    pub fn plugins(&self) -> &Arc<PluginList> {
        &self.inner.plugins
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.inner.fetcher
    }

    /// Resolve an entry point against the project directory and mark it.
    pub fn add_entry_point(&self, specifier: &str) -> Result<String> {
        let reference = Reference::entry_point(self.inner.config.project_url.as_str(), specifier);
        let url = self.inner.resolver.resolve(&reference, None)?;
        self.inner.graph.mark_entry_point(url.as_str());
        Ok(url.to_string())
    }

    /// Import map in effect for `info`: the configured one with the map of
    /// the HTML page owning the node on top.
    pub fn import_map_for(&self, info: &UrlInfo) -> Option<ImportMap> {
        let owned = info
            .data
            .get(IMPORT_MAP_OWNER)
            .and_then(Value::as_str)
            .and_then(|owner| self.inner.import_maps.read().get(owner).cloned());
        match (self.inner.config.import_map.as_ref(), owned) {
            (Some(base), Some(owned)) => Some(base.compose(&owned)),
            (Some(base), None) => Some(base.clone()),
            (None, owned) => owned,
        }
    }

    /// Cook `url` and commit it to the graph.
    ///
    /// # Errors
    ///
    /// Fetch failures and hook errors (parse errors included) fail the node.
    /// Reference resolution failures do not: they are returned in
    /// [`CookOutcome::errors`] and the reference stays unresolved.
    pub async fn cook(&self, url: &str, request: &FetchRequest) -> Result<CookOutcome> {
        let inner = &self.inner;
        let mut info = inner.graph.get_or_create(url);
        let generation = info.generation;

        let fetched = inner.fetcher.fetch(&info, request).await?;
        info.url_type = fetched
            .url_type
            .unwrap_or_else(|| detect_url_type(&fetched.content_type, expected_type_of(&info)));
        info.content_type = Some(fetched.content_type);
        info.last_modified = fetched.last_modified;
        if let Some(original_url) = fetched.original_url {
            info.set_data(ORIGINAL_URL, original_url);
        }
        if !info.is_inline {
            info.original_content = Some(fetched.content.clone());
        }
        info.content = Some(fetched.content);
        info.sourcemap = None;
        info.references.clear();
        info.generated_url = None;
        self.forget_own_import_map(&mut info);

        let mut errors = Vec::new();
        let cache_key = self.cache_key_for(&info);
        let from_cache = match &cache_key {
            Some(key) => self.load_from_cache(key, &mut info),
            None => false,
        };
        if from_cache {
            let cached = std::mem::take(&mut info.references);
            let import_map = self.import_map_for(&info);
            info.references = self.resolve_all(cached, import_map.as_ref(), &mut errors);
        } else {
            self.run_transforms(&mut info, &mut errors, None).await?;
            self.consume_sourcemap_comments(&mut info).await;
        }

        let dependencies = dependencies_of(&info);
        let references = info.references.clone();
        let owner = info.data.get(IMPORT_MAP_OWNER).cloned();
        let cache_write = cache_key
            .filter(|_| !from_cache && errors.is_empty())
            .and_then(|key| cache_entry(&info).map(|entry| (key, entry)));
        info.cooked = true;

        if !inner.graph.commit_if_current(info, generation) {
            tracing::debug!(url, "node invalidated while cooking, result dropped");
            return Ok(CookOutcome {
                url: url.to_string(),
                stale: true,
                ..CookOutcome::default()
            });
        }
        self.propagate_to_targets(url, &references, owner);

        if let (Some(cache), Some((key, entry))) = (&inner.cache, cache_write) {
            if let Err(error) = cache.write(&key, &entry) {
                tracing::warn!(url, %error, "failed to write cache entry");
            }
        }
        tracing::debug!(
            url,
            references = references.len(),
            errors = errors.len(),
            from_cache,
            "cooked"
        );
        Ok(CookOutcome {
            url: url.to_string(),
            dependencies,
            errors,
            from_cache,
            stale: false,
        })
    }

    fn transform_context(&self, info: &UrlInfo) -> TransformContext {
        let config = &self.inner.config;
        let mut ctx = TransformContext::new(config.scenario, config.project_url.clone());
        ctx.import_map = self.import_map_for(info);
        ctx.runtime_compat = config.runtime_compat.clone();
        ctx.minify = config.minify;
        ctx
    }

    /// Rediscover the references of a node whose content was replaced after
    /// it was cooked (a bundle). Only reference discovery hooks run; the
    /// content itself is committed as is.
    pub async fn rescan(&self, url: &str) -> Result<CookOutcome> {
        let inner = &self.inner;
        let mut info = inner
            .graph
            .get(url)
            .ok_or_else(|| jsenv_graph::Error::NodeNotFound(url.to_string()))?;
        info.references.clear();

        let mut errors = Vec::new();
        self.run_transforms(&mut info, &mut errors, Some(PluginPhase::References))
            .await?;
        self.consume_sourcemap_comments(&mut info).await;
        let dependencies = dependencies_of(&info);
        let owner = info.data.get(IMPORT_MAP_OWNER).cloned();
        inner.graph.set_references(url, info.references.clone())?;
        self.propagate_to_targets(url, &info.references, owner);
        Ok(CookOutcome {
            url: url.to_string(),
            dependencies,
            errors,
            from_cache: false,
            stale: false,
        })
    }

    /// Run the transformers of the node's type, all of them or those of
    /// `only` phase. References injected by a hook are resolved before the
    /// next hook runs.
    async fn run_transforms(
        &self,
        info: &mut UrlInfo,
        errors: &mut Vec<Error>,
        only: Option<PluginPhase>,
    ) -> Result<()> {
        let plugins = self.inner.plugins.clone();
        for plugin in plugins
            .transformers(info.url_type)
            .filter(|plugin| only.is_none_or(|phase| plugin.phase() == phase))
        {
            let mut ctx = self.transform_context(info);
            if let Some(output) = plugin.transform_url_content(info, &mut ctx).await? {
                info.sourcemap = sourcemap::chain(info.sourcemap.as_ref(), output.sourcemap);
                info.content = Some(Content::Text(output.content));
            }
            if let Some(import_map) = ctx.take_declared_import_map() {
                self.inner
                    .import_maps
                    .write()
                    .insert(info.url.clone(), import_map);
                info.set_data(IMPORT_MAP_OWNER, info.url.clone());
            }
            let injected = ctx.take_injected();
            if !injected.is_empty() {
                let import_map = self.import_map_for(info);
                let resolved = self.resolve_all(injected, import_map.as_ref(), errors);
                info.references.extend(resolved);
            }
        }
        Ok(())
    }

    fn resolve_all(
        &self,
        references: Vec<Reference>,
        import_map: Option<&ImportMap>,
        errors: &mut Vec<Error>,
    ) -> Vec<Reference> {
        let config = &self.inner.config;
        references
            .into_iter()
            .map(|mut reference| {
                match self.inner.resolver.resolve(&reference, import_map) {
                    Ok(url) => {
                        reference.preserved = config.preserved_urls.is_preserved(&url);
                        reference.url = Some(url.to_string());
                    }
                    Err(error) => {
                        if config.mode == KitchenMode::Dev {
                            tracing::warn!(
                                parent = %reference.parent_url,
                                specifier = %reference.specifier,
                                %error,
                                "reference left unresolved"
                            );
                        }
                        reference.url = None;
                        errors.push(error);
                    }
                }
                reference
            })
            .collect()
    }

    /// Load maps named by `sourceMappingURL` comments as the node's input
    /// map, then drop those references: the comment is rewritten on output.
    async fn consume_sourcemap_comments(&self, info: &mut UrlInfo) {
        let (comments, references): (Vec<Reference>, Vec<Reference>) = std::mem::take(&mut info.references)
            .into_iter()
            .partition(|reference| reference.kind == ReferenceKind::SourcemapComment);
        info.references = references;

        for comment in comments {
            let Some(map_url) = comment.url.as_deref() else {
                continue;
            };
            let request = FetchRequest {
                importer_url: Some(info.url.clone()),
                specifier: Some(comment.specifier.clone()),
                headers: Vec::new(),
            };
            let fetched = match self.inner.fetcher.fetch(&UrlInfo::new(map_url), &request).await {
                Ok(fetched) => fetched,
                Err(error) => {
                    tracing::debug!(url = %info.url, map = map_url, %error, "input sourcemap not loaded");
                    continue;
                }
            };
            let Some(json) = fetched.content.as_text() else {
                continue;
            };
            match sourcemap::parse(json) {
                Ok(input) => {
                    info.sourcemap = sourcemap::chain(Some(&input), info.sourcemap.take());
                }
                Err(error) => {
                    tracing::debug!(url = %info.url, map = map_url, %error, "input sourcemap ignored");
                }
            }
        }
    }

    /// An HTML node re-declares its import map on every cook.
    fn forget_own_import_map(&self, info: &mut UrlInfo) {
        let owns = info.data.get(IMPORT_MAP_OWNER).and_then(Value::as_str) == Some(info.url.as_str());
        if owns {
            self.inner.import_maps.write().remove(&info.url);
            info.data.remove(IMPORT_MAP_OWNER);
        }
    }

    /// Hand what the parent knows to each target node.
    fn propagate_to_targets(&self, parent_url: &str, references: &[Reference], owner: Option<Value>) {
        for reference in references {
            let Some(target) = reference.url.as_deref() else {
                continue;
            };
            if reference.preserved || target == parent_url {
                continue;
            }
            let updated = self.inner.graph.update(target, |child| {
                if let Some(inline) = &reference.inline {
                    let content = Content::Text(inline.content.clone());
                    if child.original_content.as_ref() != Some(&content) {
                        child.original_content = Some(content);
                        if child.cooked {
                            child.cooked = false;
                            child.content = None;
                            child.sourcemap = None;
                            child.generation += 1;
                        }
                    }
                    child.is_inline = true;
                    child.inline_parent = Some(parent_url.to_string());
                    child.content_type = Some(inline.content_type.clone());
                }
                if let Some(expected) = reference.expected_type {
                    child.set_data(EXPECTED_TYPE, expected.as_str());
                }
                if child.subtype.is_none() {
                    child.subtype = reference.expected_subtype;
                }
                if let Some(owner) = &owner {
                    if !child.data.contains_key(IMPORT_MAP_OWNER) {
                        child.data.insert(IMPORT_MAP_OWNER.to_string(), owner.clone());
                    }
                }
            });
            if let Err(error) = updated {
                tracing::debug!(parent = parent_url, target, %error, "target vanished");
            }
        }
    }

    fn cache_key_for(&self, info: &UrlInfo) -> Option<CacheKey> {
        self.inner.cache.as_ref()?;
        let cacheable = !info.is_inline
            && info.url_type != UrlType::Html
            && info.url_type.is_source()
            && info.url.starts_with("file:")
            && info.content.as_ref().is_some_and(Content::is_text);
        if !cacheable {
            return None;
        }
        let config = &self.inner.config;
        let options = CompilerOptions {
            scenario: config.scenario,
            plugins: self.inner.plugins.names(),
            minify: config.minify,
            runtime_compat: Some(&config.runtime_compat),
        };
        Some(compute_cache_key(&info.url, &options))
    }

    /// Replace the fetched content with a cached compilation. A corrupted
    /// entry is removed and the node compiles from source.
    fn load_from_cache(&self, key: &CacheKey, info: &mut UrlInfo) -> bool {
        let Some(cache) = &self.inner.cache else {
            return false;
        };
        let Some(content) = info.content.as_ref() else {
            return false;
        };
        let entry = match cache.read(key, &info.url, content.as_bytes(), info.last_modified) {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(error) => {
                tracing::warn!(url = %info.url, %error, "discarding cache entry");
                if let Err(error) = cache.invalidate(key) {
                    tracing::warn!(url = %info.url, %error, "failed to remove cache entry");
                }
                return false;
            }
        };
        if entry.url_type != info.url_type {
            return false;
        }
        let map = match entry.sourcemap.as_deref().map(sourcemap::parse).transpose() {
            Ok(map) => map,
            Err(_) => return false,
        };
        info.content = Some(Content::Text(entry.compiled_content));
        info.sourcemap = map;
        info.references = entry.references;
        info.data.extend(entry.data);
        true
    }
}

/// Node type from its content type, refined by what referrers expect.
///
/// The expected type is a hint: it can make a script classic, JSON a web
/// manifest or any content a sourcemap, and it types content served without
/// a meaningful content type. It never turns CSS into JavaScript.
pub fn detect_url_type(content_type: &str, expected: Option<UrlType>) -> UrlType {
    let base = content_type::url_type_for(content_type);
    match (base, expected) {
        (UrlType::JsModule, Some(UrlType::JsClassic)) => UrlType::JsClassic,
        (UrlType::Json, Some(UrlType::Webmanifest)) => UrlType::Webmanifest,
        (_, Some(UrlType::Sourcemap)) => UrlType::Sourcemap,
        (UrlType::Asset, Some(expected))
            if content_type::essence(content_type) == content_type::DEFAULT_CONTENT_TYPE =>
        {
            expected
        }
        (base, _) => base,
    }
}

fn expected_type_of(info: &UrlInfo) -> Option<UrlType> {
    info.data
        .get(EXPECTED_TYPE)
        .and_then(Value::as_str)
        .and_then(|value| value.parse().ok())
}

fn dependencies_of(info: &UrlInfo) -> Vec<Dependency> {
    let mut seen = rustc_hash::FxHashSet::default();
    info.references
        .iter()
        .filter(|reference| !reference.preserved)
        .filter_map(|reference| {
            let url = reference.url.as_ref()?;
            seen.insert(url.clone()).then(|| Dependency {
                url: url.clone(),
                importer_url: info.url.clone(),
                specifier: reference.specifier.clone(),
            })
        })
        .collect()
}

/// Cache entry for a node compiled from source. References are stored
/// unresolved: resolution depends on import maps outside the node.
fn cache_entry(info: &UrlInfo) -> Option<CacheEntry> {
    let source = info.original_content.as_ref()?;
    let mut entry = CacheEntry::new(
        SourceState::new(info.url.as_str(), source.as_bytes(), info.last_modified),
        source.as_text()?,
        info.text()?,
    );
    entry.sourcemap = info.sourcemap.as_ref().map(sourcemap::to_json);
    entry.references = info
        .references
        .iter()
        .cloned()
        .map(|mut reference| {
            reference.url = None;
            reference.preserved = false;
            reference
        })
        .collect();
    entry.url_type = info.url_type;
    entry.content_type = info.content_type.clone().unwrap_or_default();
    entry.data = info
        .data
        .iter()
        .filter(|(key, _)| ![IMPORT_MAP_OWNER, EXPECTED_TYPE, ORIGINAL_URL].contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(entry)
}
