//! Configuration sections to pipeline options.

use jsenv_bundler::dev::DevOptions;
use jsenv_bundler::fetch::PreservedUrls;
use jsenv_bundler::jsenv_graph::url::path_to_file_url;
use jsenv_bundler::{BuildFormat, BuildOptions, ImportMap, SourcemapMode, SubbuildConfig};
use jsenv_config::{BuildConfig, DevConfig, PreservedUrlRule};
use path_clean::PathClean;
use std::path::Path;

use crate::error::{BuildError, Result, ResultExt};

/// Options of `jsenv build` for a project whose configuration lives in
/// `root`.
pub fn build_options(root: &Path, config: &BuildConfig) -> Result<BuildOptions> {
    let project_directory = root.join(&config.project_directory);
    let format: BuildFormat = config.format.parse().map_err(|_| BuildError::InvalidValue {
        field: "format".into(),
        value: config.format.clone(),
        hint: "Use esmodule, systemjs, global or commonjs".into(),
    })?;
    let sourcemaps: SourcemapMode = config.sourcemaps.parse().map_err(|_| BuildError::InvalidValue {
        field: "sourcemaps".into(),
        value: config.sourcemaps.clone(),
        hint: "Use none, inline or file".into(),
    })?;

    let mut options = BuildOptions::new(&project_directory, root.join(&config.build_directory))
        .entry_points(config.entry_points.iter().cloned())
        .format(format)
        .runtime_compat(config.runtime_compat.clone())
        .preserved_urls(preserved_urls(&config.preserved_urls)?)
        .minify(config.minify)
        .sourcemaps(sourcemaps)
        .versioning(config.versioning)
        .node_esm_resolution(config.node_esm_resolution)
        .css_bundle(config.css_bundle)
        .filesystem_cache(config.filesystem_cache)
        .concurrency(config.concurrency);
    if let Some(base) = &config.base {
        options = options.base(base.clone());
    }
    if let Some(import_map) = &config.import_map {
        options = options.import_map(load_import_map(&project_directory.join(import_map))?);
    }
    if let Some(cache_directory) = &config.cache_directory {
        options = options.cache_directory(root.join(cache_directory));
    }

    for entry in &config.subbuilds {
        let mut sub = BuildOptions::new(
            project_directory.join(&entry.project_directory),
            root.join(&config.build_directory).join(&entry.directory),
        )
        .entry_points(entry.entry_points.iter().cloned())
        .format(format)
        .runtime_compat(config.runtime_compat.clone())
        .preserved_urls(options.preserved_urls.clone())
        .minify(entry.minify.unwrap_or(config.minify))
        .sourcemaps(sourcemaps)
        .versioning(entry.versioning.unwrap_or(config.versioning))
        .node_esm_resolution(config.node_esm_resolution)
        .css_bundle(config.css_bundle)
        .filesystem_cache(config.filesystem_cache)
        .concurrency(config.concurrency);
        if let Some(import_map) = &options.import_map {
            sub = sub.import_map(import_map.clone());
        }
        options = options.subbuild(SubbuildConfig::new(&entry.name, &entry.directory, sub));
    }
    Ok(options)
}

/// Options of `jsenv dev`. Resolution settings come from `[build]` so that
/// both commands see the same graph.
pub fn dev_options(root: &Path, build: &BuildConfig, dev: &DevConfig) -> Result<DevOptions> {
    let project_directory = root.join(&build.project_directory);
    let mut options = DevOptions::new(&project_directory)
        .autoreload(dev.autoreload)
        .sourcemaps(dev.sourcemaps)
        .preserved_urls(preserved_urls(&build.preserved_urls)?)
        .node_esm_resolution(build.node_esm_resolution)
        .filesystem_cache(dev.filesystem_cache);
    if let Some(import_map) = &build.import_map {
        options = options.import_map(load_import_map(&project_directory.join(import_map))?);
    }
    if let Some(cache_directory) = &build.cache_directory {
        options.cache_directory = Some(root.join(cache_directory));
    }
    Ok(options)
}

/// The default rule (every `http(s)` URL stays remote) followed by the
/// configured rules, in order.
pub fn preserved_urls(rules: &[PreservedUrlRule]) -> Result<PreservedUrls> {
    rules.iter().try_fold(PreservedUrls::default(), |set, rule| {
        set.with(rule.pattern.as_str(), rule.preserve).map_err(|e| {
            BuildError::InvalidPreservedUrl {
                pattern: rule.pattern.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    })
}

/// Read an import map file; relative addresses resolve against the file.
pub fn load_import_map(path: &Path) -> Result<ImportMap> {
    let path = path.clean();
    let json = std::fs::read_to_string(&path).with_path(&path)?;
    let base = path_to_file_url(&path).map_err(|e| BuildError::InvalidImportMap {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    ImportMap::parse(&json, &base).map_err(|e| {
        BuildError::InvalidImportMap {
            path,
            reason: e.to_string(),
        }
        .into()
    })
}
