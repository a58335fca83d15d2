//! Production build.
//!
//! ```text
//! graph_open ──▶ graph_closed ──▶ bundling ──▶ versioning ──▶ writing ──▶ done
//!   walk           (no pending      bundler       layout, rewrite,   BuildResult,
//!   entries         references)     plugins       hash, substitute   atomic write
//! ```
//!
//! Each step is guarded by the [`BuildSession`] of the run. Nothing is
//! written unless every step succeeded.

mod bundle;
mod finalize;
mod options;
mod output;
mod placeholder;
mod session;
mod subbuild;
mod versioning;

pub use finalize::{build_path, relative_path};
pub use options::{BuildFormat, BuildOptions, SourcemapMode};
pub use output::{BuildResult, GeneratedUrlInfo};
pub use placeholder::{PLACEHOLDER_LEN, PlaceholderTable, contains_placeholder};
pub use session::{BuildSession, BuildState};
pub use subbuild::SubbuildConfig;

use futures::future::BoxFuture;
use jsenv_graph::url::{Url, UrlKind, directory_to_url, inject_version_in_filename, url_to_relative};
use jsenv_graph::{Content, NativeRuntime, Runtime};
use path_clean::PathClean;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::CacheConfig;
use crate::kitchen::{Kitchen, KitchenConfig, KitchenMode};
use crate::output::write_build_files;
use crate::runtime::JsenvRuntime;
use crate::transform::{BuiltinOptions, builtin_plugins};
use crate::walker::Walker;
use crate::{Error, Result};
use finalize::{Draft, Finalizer, Layout};
use subbuild::{SubbuildRedirectPlugin, run_subbuilds};

/// Build a project.
///
/// Sub-builds run first, then the entry points are walked, bundled,
/// finalized and versioned. With [`BuildOptions::write`] the files are
/// written to the build directory atomically.
///
/// # Errors
///
/// The first failure of any step. Graph walk failures are collected over
/// the whole graph and reported together.
pub fn build(options: BuildOptions) -> BoxFuture<'static, Result<BuildResult>> {
    Box::pin(run_build(options))
}

async fn run_build(mut options: BuildOptions) -> Result<BuildResult> {
    let started = Instant::now();
    options.validate()?;

    let native: Arc<dyn Runtime> = match options.runtime.clone() {
        Some(runtime) => runtime,
        None => Arc::new(NativeRuntime::new()),
    };
    let cwd = native.get_cwd()?;
    options.project_directory = absolute(&cwd, &options.project_directory);
    options.build_directory = absolute(&cwd, &options.build_directory);
    options.runtime = Some(native.clone());
    let project_url = directory_to_url(&options.project_directory).map_err(jsenv_graph::Error::from)?;
    let build_url = directory_to_url(&options.build_directory).map_err(jsenv_graph::Error::from)?;
    tracing::info!(
        project = %options.project_directory.display(),
        build = %options.build_directory.display(),
        entries = options.entry_points.len(),
        scenario = %options.scenario,
        "build started"
    );

    let runtime = JsenvRuntime::new(native);
    let subbuilds = run_subbuilds(&options.subbuilds, &options, &build_url, &runtime).await?;

    let mut plugins = builtin_plugins(BuiltinOptions {
        autoreload: false,
        css_bundle: options.css_bundle,
    });
    plugins.extend(&options.plugins);
    if !subbuilds.redirects.is_empty() {
        plugins.add_shared(SubbuildRedirectPlugin::new(&subbuilds).into_shared());
    }
    let cache = options.filesystem_cache.then(|| {
        CacheConfig::new(
            options
                .cache_directory
                .clone()
                .unwrap_or_else(|| options.project_directory.join(".jsenv").join("cache")),
        )
    });
    let mut config = KitchenConfig::new(options.scenario, project_url.clone(), Arc::new(runtime))
        .with_plugins(plugins)
        .with_import_map(options.import_map.clone())
        .with_preserved_urls(options.preserved_urls.clone())
        .with_node_esm_resolution(options.node_esm_resolution)
        .with_mode(KitchenMode::Build)
        .with_cache(cache);
    config.runtime_compat = options.runtime_compat.clone();
    config.minify = options.minify;
    let kitchen = Kitchen::new(config)?;
    bundle::check_format(&kitchen, options.format)?;

    let mut session = BuildSession::new();
    for entry_point in &options.entry_points {
        kitchen.add_entry_point(entry_point)?;
    }
    let cooked = Walker::new(kitchen.clone(), options.concurrency)
        .walk_entry_points()
        .await
        .into_result()?;
    tracing::debug!(nodes = cooked.len(), "graph walked");

    session.advance(BuildState::GraphClosed)?;
    session.advance(BuildState::Bundling)?;
    let merged = bundle::run_bundlers(&kitchen, &options).await?;

    session.advance(BuildState::Versioning)?;
    let layout = Layout::plan(
        kitchen.graph(),
        &project_url,
        subbuilds.files.clone(),
        options.versioning,
        session.placeholders_mut()?,
    )?;
    let drafts = Finalizer {
        kitchen: &kitchen,
        build_url: &build_url,
        base: options.base.as_deref(),
        sourcemaps: options.sourcemaps,
        layout: &layout,
        placeholders: session.placeholders(),
    }
    .run()
    .await?;
    let versions = versioning::compute_versions(&drafts, session.placeholders());
    session.set_versions(versions)?;

    let mut result = assemble(&session, drafts, &project_url)?;
    result.build_directory = options.build_directory.clone();
    for entry_point in kitchen.graph().entry_points() {
        let final_path = layout
            .paths
            .get(&entry_point)
            .map(|path| final_path(&session, &entry_point, path));
        if let Some(path) = final_path {
            result.entry_points.insert(entry_point, path);
        }
    }
    for (source, bundle_url) in &merged {
        let Some(path) = layout.paths.get(bundle_url) else {
            continue;
        };
        let path = final_path(&session, bundle_url, path);
        result
            .build_mappings
            .entry(source_key(source, &project_url))
            .or_insert(path);
    }
    for (prefix, subbuild) in subbuilds.results {
        result.merge_subbuild(&prefix, subbuild);
    }
    result.sort();

    session.advance(BuildState::Writing)?;
    if options.write {
        write_build_files(&result.build_file_contents, &options.build_directory)?;
    }
    session.advance(BuildState::Done)?;
    tracing::info!(
        files = result.build_file_contents.len(),
        versioned = session.versions().len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "build done"
    );
    Ok(result)
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.clean()
    } else {
        cwd.join(path).clean()
    }
}

fn final_path(session: &BuildSession, url: &str, path: &str) -> String {
    match session.version_of(url) {
        Some(version) => inject_version_in_filename(path, version),
        None => path.to_string(),
    }
}

/// Key of a source in the build mappings: project-relative path, the URL
/// itself for anything outside the project.
fn source_key(url: &str, project_url: &Url) -> String {
    match Url::parse(url) {
        Ok(parsed) if UrlKind::of(&parsed) == UrlKind::File => {
            url_to_relative(&parsed, project_url).unwrap_or_else(|| url.to_string())
        }
        _ => url.to_string(),
    }
}

/// Substitute versions into the drafts and collect the build files.
fn assemble(session: &BuildSession, drafts: Vec<Draft>, project_url: &Url) -> Result<BuildResult> {
    let placeholders = session.placeholders();
    let versions = session.versions();
    let mut result = BuildResult::default();
    let mut mappings: BTreeMap<String, String> = BTreeMap::new();

    for draft in drafts {
        let path = final_path(session, &draft.url, &draft.path);
        let content = match draft.content {
            Content::Text(text) => {
                let text = versioning::substitute(&text, placeholders, versions);
                if !placeholders.owners_in(&text).is_empty() {
                    return Err(Error::InvalidState {
                        expected: "every version placeholder resolved",
                        found: "a leftover version placeholder",
                    });
                }
                Content::Text(text)
            }
            binary => binary,
        };
        if let Some(map) = draft.sourcemap {
            let map = versioning::substitute(&map, placeholders, versions);
            let map_path = format!("{path}.map");
            result.generated_urls_config.insert(
                map_path.clone(),
                GeneratedUrlInfo {
                    versioned: false,
                    version: None,
                },
            );
            result.build_file_contents.insert(map_path, Content::Text(map));
        }
        let version = session.version_of(&draft.url).map(str::to_string);
        result.generated_urls_config.insert(
            path.clone(),
            GeneratedUrlInfo {
                versioned: version.is_some(),
                version,
            },
        );
        mappings.insert(source_key(&draft.url, project_url), path.clone());
        result.build_file_contents.insert(path, content);
    }
    result.build_mappings = mappings.into_iter().collect();
    Ok(result)
}
