use futures::future::BoxFuture;
use jsenv_graph::sourcemap::{self, SourcemapComment};
use jsenv_graph::url::{Url, UrlKind, url_to_relative};
use jsenv_graph::{EditBatch, ReferenceKind, SourceMap, UrlInfo, UrlType};

use super::FS_PREFIX;
use crate::kitchen::Kitchen;
use crate::plugins::FinalizeContext;
use crate::{Error, Result};

const NAME: &str = "jsenv:dev";

/// Server path of a `file:` URL: `/<relative>` inside the project,
/// `/@fs/<absolute>` elsewhere. The query is kept.
pub fn request_path_for(url: &Url, project_url: &Url) -> Option<String> {
    if UrlKind::of(url) != UrlKind::File {
        return None;
    }
    let mut clean = url.clone();
    clean.set_fragment(None);
    let path = match url_to_relative(&clean, project_url) {
        Some(relative) => format!("/{relative}"),
        None => {
            let query = clean.query().map(|query| format!("?{query}")).unwrap_or_default();
            format!("{}{}{query}", FS_PREFIX.trim_end_matches('/'), clean.path())
        }
    };
    Some(path)
}

/// Text served for `info`.
pub(super) async fn finalize_for_serving(kitchen: &Kitchen, info: &UrlInfo, sourcemaps: bool) -> Result<String> {
    let (text, edit_map) = finalize_text(kitchen, info).await?;
    if !info.url_type.supports_sourcemap() {
        return Ok(text);
    }
    if !sourcemaps {
        return Ok(sourcemap::strip_comment(&text).to_string());
    }
    let project_url = &kitchen.config().project_url;
    let map = sourcemap::chain(info.sourcemap.as_ref(), Some(edit_map))
        .unwrap_or_else(|| sourcemap::identity(&info.url, info.text().unwrap_or_default()));
    let map = sourcemap::rename_sources(&map, |source| {
        Url::parse(source)
            .ok()
            .and_then(|url| request_path_for(&url, project_url))
            .unwrap_or_else(|| source.to_string())
    });
    let kind = if info.url_type == UrlType::Css {
        SourcemapComment::Css
    } else {
        SourcemapComment::Js
    };
    Ok(sourcemap::set_comment(&text, kind, &sourcemap::to_data_url(&map)))
}

/// Rewrite references to server paths, splicing inline children, then run
/// the finalize hooks.
fn finalize_text<'a>(kitchen: &'a Kitchen, info: &'a UrlInfo) -> BoxFuture<'a, Result<(String, SourceMap)>> {
    Box::pin(async move {
        let text = info
            .text()
            .ok_or_else(|| Error::plugin(NAME, format!("{} has no text content", info.url)))?;
        let config = kitchen.config();
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
                    continue;
                }
                let Some(child) = kitchen.graph().get(target) else {
                    continue;
                };
                if child.text().is_none() {
                    continue;
                }
                let (child_text, _) = finalize_text(kitchen, &child).await?;
                batch.replace(
                    reference.start,
                    reference.end,
                    sourcemap::strip_comment(&child_text).to_string(),
                );
                continue;
            }
            let Ok(target_url) = Url::parse(target) else {
                continue;
            };
            if let Some(path) = request_path_for(&target_url, &config.project_url) {
                batch.replace(reference.start, reference.end, path);
            }
        }
        let (mut text, map) = batch
            .apply_with_map(text, &info.url)
            .map_err(|e| Error::plugin(NAME, format!("{}: {e}", info.url)))?;

        let ctx = FinalizeContext {
            scenario: config.scenario,
            project_url: &config.project_url,
        };
        for plugin in kitchen.plugins().iter() {
            if let Some(updated) = plugin.finalize_url_content(info, &text, &ctx).await? {
                text = updated;
            }
        }
        Ok((text, map))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_for() {
        let project = Url::parse("file:///p/").unwrap();
        let path = |url: &str| request_path_for(&Url::parse(url).unwrap(), &project);
        assert_eq!(path("file:///p/js/main.js").as_deref(), Some("/js/main.js"));
        assert_eq!(path("file:///p/a.js?v=2#x").as_deref(), Some("/a.js?v=2"));
        assert_eq!(path("file:///opt/lib/a.js").as_deref(), Some("/@fs/opt/lib/a.js"));
        assert_eq!(path("https://cdn.example.com/a.js"), None);
        assert_eq!(path("data:text/javascript,export{}"), None);
    }
}
