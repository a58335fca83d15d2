//! Bundling step: bundler plugins merge nodes, the graph follows.

use jsenv_graph::{ContentUpdate, UrlType, content_type};
use std::collections::BTreeMap;

use super::options::{BuildFormat, BuildOptions};
use crate::kitchen::Kitchen;
use crate::plugins::{Bundle, BundleContext};
use crate::walker::Walker;
use crate::{Error, Result};

/// Types offered to bundlers, in this order.
const BUNDLED_TYPES: [UrlType; 3] = [UrlType::Css, UrlType::JsClassic, UrlType::JsModule];

/// Formats other than ES modules need a plugin converting JS modules.
pub(crate) fn check_format(kitchen: &Kitchen, format: BuildFormat) -> Result<()> {
    if format == BuildFormat::EsModule {
        return Ok(());
    }
    if kitchen.plugins().bundlers(UrlType::JsModule).next().is_none() {
        return Err(Error::InvalidConfig(format!(
            "format \"{format}\" requires a plugin bundling js_module nodes"
        )));
    }
    Ok(())
}

/// Run every bundler plugin and fold its bundles into the graph.
///
/// Returns the URLs that were merged away, mapped to the bundle that now
/// holds them.
pub(crate) async fn run_bundlers(
    kitchen: &Kitchen,
    options: &BuildOptions,
) -> Result<BTreeMap<String, String>> {
    let graph = kitchen.graph();
    let config = kitchen.config();
    let mut merged: BTreeMap<String, String> = BTreeMap::new();

    for url_type in BUNDLED_TYPES {
        let bundlers: Vec<_> = kitchen.plugins().bundlers(url_type).cloned().collect();
        for plugin in bundlers {
            let nodes: Vec<_> = graph
                .snapshot()
                .into_iter()
                .filter(|info| info.cooked && info.url_type == url_type)
                .collect();
            if nodes.is_empty() {
                continue;
            }
            let ctx = BundleContext {
                scenario: config.scenario,
                graph,
                project_url: &config.project_url,
                format: options.format,
                minify: options.minify,
                runtime_compat: &options.runtime_compat,
            };
            let bundles = plugin.bundle(&nodes, &ctx).await?;
            tracing::debug!(
                plugin = plugin.name(),
                url_type = url_type.as_str(),
                bundles = bundles.len(),
                "bundled"
            );
            for bundle in bundles {
                apply_bundle(kitchen, bundle, options.concurrency, &mut merged).await?;
            }
        }
    }
    Ok(merged)
}

async fn apply_bundle(
    kitchen: &Kitchen,
    bundle: Bundle,
    concurrency: usize,
    merged: &mut BTreeMap<String, String>,
) -> Result<()> {
    let graph = kitchen.graph();
    let url_type = content_type::url_type_for(&bundle.content_type);
    graph.get_or_create(&bundle.url);
    graph.update_content(
        &bundle.url,
        ContentUpdate::content(bundle.content).with_content_type(bundle.content_type),
    )?;
    let sourcemap = bundle.sourcemap;
    graph.update(&bundle.url, |info| {
        info.url_type = url_type;
        info.sourcemap = sourcemap;
        info.cooked = true;
    })?;

    // New content, new references. Targets first seen here are cooked
    // before anything else happens.
    let outcome = kitchen.rescan(&bundle.url).await?;
    if let Some(error) = Error::from_many(outcome.errors) {
        return Err(error);
    }
    let uncooked: Vec<_> = outcome
        .dependencies
        .into_iter()
        .filter(|dependency| !graph.with_node(&dependency.url, |info| info.cooked).unwrap_or(false))
        .map(|dependency| {
            let request = dependency.request();
            (dependency.url, request)
        })
        .collect();
    if !uncooked.is_empty() {
        Walker::new(kitchen.clone(), concurrency)
            .walk(uncooked)
            .await
            .into_result()?;
    }

    let sources: Vec<&String> = bundle
        .sources
        .iter()
        .filter(|source| **source != bundle.url)
        .collect();
    for source in &sources {
        redirect_referrers(kitchen, source, &bundle.url)?;
        merged.insert((*source).clone(), bundle.url.clone());
    }
    remove_unreferenced(kitchen, &sources);
    Ok(())
}

/// Point every reference to `source` at `bundle_url` instead.
fn redirect_referrers(kitchen: &Kitchen, source: &str, bundle_url: &str) -> Result<()> {
    let graph = kitchen.graph();
    for dependent in graph.dependents_of(source) {
        if dependent == bundle_url {
            continue;
        }
        let Some(mut references) = graph.with_node(&dependent, |info| info.references.clone()) else {
            continue;
        };
        for reference in references.iter_mut() {
            if reference.url.as_deref() == Some(source) {
                reference.url = Some(bundle_url.to_string());
            }
        }
        graph.set_references(&dependent, references)?;
    }
    Ok(())
}

/// Drop merged nodes nothing points to anymore. Sources referencing each
/// other go once the last outside referrer is gone.
fn remove_unreferenced(kitchen: &Kitchen, sources: &[&String]) {
    let graph = kitchen.graph();
    let mut remaining: Vec<&String> = sources.to_vec();
    loop {
        let before = remaining.len();
        remaining.retain(|source| graph.remove_node(source).is_err());
        if remaining.len() == before {
            break;
        }
    }
    for source in remaining {
        tracing::debug!(url = %source, dependents = ?graph.dependents_of(source), "merged node still referenced");
    }
}
