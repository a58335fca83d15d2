//! Sourcemap composition and lookup.
//!
//! Every transform that changes a node's content produces a map from its
//! output back to its input. Those maps are chained onto the node's
//! accumulated map so the final content always maps to the original source.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Errors raised while reading sourcemaps.
#[derive(Debug, thiserror::Error)]
pub enum SourcemapError {
    #[error("invalid sourcemap: {0}")]
    Invalid(String),
}

/// Where a sourcemap is written in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcemapComment {
    /// `//# sourceMappingURL=` for JavaScript
    #[default]
    Js,
    /// `/*# sourceMappingURL= */` for CSS
    Css,
}

/// Position in an original source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginalPosition {
    pub source: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

/// Parse a JSON sourcemap.
pub fn parse(json: &str) -> Result<SourceMap, SourcemapError> {
    SourceMap::from_json_string(json).map_err(|e| SourcemapError::Invalid(format!("{e:?}")))
}

/// Serialize a sourcemap to JSON.
pub fn to_json(map: &SourceMap) -> String {
    map.to_json_string()
}

/// Chain `next` (output -> intermediate) onto `prior` (intermediate ->
/// original), producing output -> original.
///
/// Tokens of `next` that do not land on a mapped position of `prior` are
/// dropped; every mapping that does survives.
pub fn compose(prior: &SourceMap, next: &SourceMap) -> SourceMap {
    let lookup = prior.generate_lookup_table();
    let mut builder = SourceMapBuilder::default();
    let mut source_ids: FxHashMap<u32, u32> = FxHashMap::default();
    let mut name_ids: FxHashMap<u32, u32> = FxHashMap::default();

    for token in next.get_tokens() {
        let Some(original) =
            prior.lookup_token(&lookup, token.get_src_line(), token.get_src_col())
        else {
            continue;
        };
        let Some(prior_source_id) = original.get_source_id() else {
            continue;
        };

        let source_id = *source_ids.entry(prior_source_id).or_insert_with(|| {
            let source = prior
                .get_source(prior_source_id)
                .map(|s| s.to_string())
                .unwrap_or_default();
            let content = prior
                .get_source_content(prior_source_id)
                .map(|s| s.to_string())
                .unwrap_or_default();
            builder.add_source_and_content(&source, &content)
        });

        let name_id = original.get_name_id().and_then(|prior_name_id| {
            if let Some(id) = name_ids.get(&prior_name_id) {
                return Some(*id);
            }
            let name = prior.get_name(prior_name_id)?.to_string();
            let id = builder.add_name(&name);
            name_ids.insert(prior_name_id, id);
            Some(id)
        });

        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original.get_src_col(),
            Some(source_id),
            name_id,
        );
    }

    builder.into_sourcemap()
}

/// Compose an optional accumulated map with the map of a new transform.
///
/// A transform that returns no map keeps the accumulated one; the first map
/// becomes the accumulated one as is.
pub fn chain(prior: Option<&SourceMap>, next: Option<SourceMap>) -> Option<SourceMap> {
    match (prior, next) {
        (Some(prior), Some(next)) => Some(compose(prior, &next)),
        (None, Some(next)) => Some(next),
        (Some(prior), None) => Some(prior.clone()),
        (None, None) => None,
    }
}

/// Map a 1-based generated position back to its original position.
pub fn original_position(map: &SourceMap, line: u32, column: u32) -> Option<OriginalPosition> {
    let lookup = map.generate_lookup_table();
    let token = map.lookup_token(
        &lookup,
        line.saturating_sub(1),
        column.saturating_sub(1),
    )?;
    let source_id = token.get_source_id()?;
    let source = map.get_source(source_id)?.to_string();
    Some(OriginalPosition {
        source,
        line: token.get_src_line() + 1,
        column: token.get_src_col() + 1,
    })
}

/// `data:application/json;charset=utf-8;base64,...` form, for inline sourcemaps.
pub fn to_data_url(map: &SourceMap) -> String {
    map.to_data_url()
}

/// Comment referencing a sourcemap.
pub fn comment(kind: SourcemapComment, url: &str) -> String {
    match kind {
        SourcemapComment::Js => format!("//# sourceMappingURL={url}"),
        SourcemapComment::Css => format!("/*# sourceMappingURL={url} */"),
    }
}

/// Append (or replace) the sourcemap comment at the end of `content`.
pub fn set_comment(content: &str, kind: SourcemapComment, url: &str) -> String {
    let base = strip_comment(content);
    let separator = if base.is_empty() || base.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    format!("{base}{separator}{}\n", comment(kind, url))
}

/// Remove a trailing `sourceMappingURL` comment, if any.
pub fn strip_comment(content: &str) -> &str {
    let trimmed = content.trim_end();
    let line_start = trimmed.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let last_line = &trimmed[line_start..];
    if last_line.starts_with("//# sourceMappingURL=")
        || (last_line.starts_with("/*# sourceMappingURL=") && last_line.ends_with("*/"))
    {
        &content[..line_start]
    } else {
        content
    }
}

/// Copy of `map` with every source renamed by `rename`.
///
/// The build uses it to point sources at paths relative to the written
/// sourcemap file instead of absolute `file:` URLs.
pub fn rename_sources(map: &SourceMap, rename: impl Fn(&str) -> String) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let mut source_ids: FxHashMap<u32, u32> = FxHashMap::default();
    let mut name_ids: FxHashMap<u32, u32> = FxHashMap::default();

    for token in map.get_tokens() {
        let source_id = token.get_source_id().map(|id| {
            *source_ids.entry(id).or_insert_with(|| {
                let source = map.get_source(id).map(|s| rename(s)).unwrap_or_default();
                let content = map
                    .get_source_content(id)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                builder.add_source_and_content(&source, &content)
            })
        });
        let name_id = token.get_name_id().and_then(|id| {
            if let Some(mapped) = name_ids.get(&id) {
                return Some(*mapped);
            }
            let name = map.get_name(id)?.to_string();
            let mapped = builder.add_name(&name);
            name_ids.insert(id, mapped);
            Some(mapped)
        });
        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            token.get_src_line(),
            token.get_src_col(),
            source_id,
            name_id,
        );
    }
    builder.into_sourcemap()
}

/// Identity map for content that was loaded verbatim.
pub fn identity(source_url: &str, content: &str) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let source_id = builder.add_source_and_content(source_url, content);
    for (line, _) in content.split('\n').enumerate() {
        builder.add_token(line as u32, 0, line as u32, 0, Some(source_id), None);
    }
    builder.into_sourcemap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::EditBatch;

    #[test]
    fn test_compose_keeps_original_source() {
        let original = "const a = import.meta.dev;\nexport { a };\n";
        let mut first = EditBatch::new();
        let start = original.find("import.meta.dev").unwrap();
        first.replace(start, start + "import.meta.dev".len(), "true");
        let (step1, map1) = first.apply_with_map(original, "file:///p/a.js").unwrap();

        let mut second = EditBatch::new();
        second.insert(0, "// banner\n");
        let (step2, map2) = second.apply_with_map(&step1, "file:///p/a.js").unwrap();
        assert!(step2.starts_with("// banner\n"));

        let composed = compose(&map1, &map2);
        let position = original_position(&composed, 3, 1).unwrap();
        assert_eq!(position.source, "file:///p/a.js");
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 1);
    }

    #[test]
    fn test_chain_keeps_prior_when_next_missing() {
        let map = identity("file:///p/a.js", "a\nb");
        let chained = chain(Some(&map), None).unwrap();
        assert_eq!(chained.get_tokens().count(), map.get_tokens().count());
        assert!(chain(None, None).is_none());
    }

    #[test]
    fn test_set_comment_replaces_existing() {
        let content = "console.log(1);\n//# sourceMappingURL=old.js.map\n";
        let updated = set_comment(content, SourcemapComment::Js, "new.js.map");
        assert_eq!(updated, "console.log(1);\n//# sourceMappingURL=new.js.map\n");

        let css = set_comment("body{}", SourcemapComment::Css, "a.css.map");
        assert_eq!(css, "body{}\n/*# sourceMappingURL=a.css.map */\n");
    }

    #[test]
    fn test_json_round_trip() {
        let map = identity("file:///p/a.css", "body {}\n");
        let json = to_json(&map);
        let parsed = parse(&json).unwrap();
        assert_eq!(parsed.get_tokens().count(), map.get_tokens().count());
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn test_rename_sources() {
        let map = identity("file:///p/src/a.js", "a\nb");
        let renamed = rename_sources(&map, |source| source.replace("file:///p/", "../"));
        assert_eq!(renamed.get_source(0).map(|s| s.to_string()), Some("../src/a.js".to_string()));
        assert_eq!(renamed.get_tokens().count(), 2);
    }

    #[test]
    fn test_data_url_prefix() {
        let map = identity("file:///p/a.js", "x");
        assert!(to_data_url(&map).starts_with("data:application/json;charset=utf-8;base64,"));
    }
}
