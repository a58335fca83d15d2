//! CSS reference discovery: `@import` and `url()`.
//!
//! Stylesheets are parsed with lightningcss, with error recovery so an
//! invalid rule is dropped the way a browser drops it. Import rules come
//! from the top-level rule list, `url()`s from a visitor. Both only carry
//! a line and column, so each value is located back in the source text to
//! get the byte range edits need.

use async_trait::async_trait;
use jsenv_graph::{Reference, ReferenceKind, UrlInfo, UrlType};
use lightningcss::rules::{CssRule, Location};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::values::url::Url as CssUrl;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};
use std::convert::Infallible;

use super::{is_ignored_specifier, reference_at, text_of};
use crate::diagnostics::ParseError;
use crate::plugins::{Plugin, PluginPhase, TransformContext, TransformOutput};
use crate::Result;

const NAME: &str = "jsenv:css-references";

/// A specifier found in CSS, with the byte range of its text (quotes
/// excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssSpecifier {
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub kind: ReferenceKind,
}

/// Parse options shared by reference discovery and bundling.
pub(crate) fn parser_options<'i>(filename: &str) -> ParserOptions<'i> {
    ParserOptions {
        filename: filename.to_string(),
        error_recovery: true,
        ..ParserOptions::default()
    }
}

#[derive(Default)]
struct UrlCollector {
    found: Vec<(String, Location)>,
}

impl<'i> Visitor<'i> for UrlCollector {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(URLS)
    }

    fn visit_url(&mut self, url: &mut CssUrl<'i>) -> std::result::Result<(), Self::Error> {
        self.found.push((url.url.to_string(), url.loc));
        Ok(())
    }
}

/// Every `@import` and `url()` specifier of `css`, in source order.
///
/// # Errors
///
/// A [`ParseError`] when the stylesheet cannot be parsed at all. Invalid
/// rules are skipped instead.
pub fn scan_css(url: &str, css: &str) -> std::result::Result<Vec<CssSpecifier>, ParseError> {
    let mut stylesheet = StyleSheet::parse(css, parser_options(url)).map_err(|error| {
        let offset = error
            .loc
            .as_ref()
            .map(|loc| offset_of(css, loc.line, loc.column))
            .unwrap_or(0);
        ParseError::new(url, css, offset, error.kind.to_string())
    })?;

    let mut located: Vec<(String, Location, ReferenceKind)> = stylesheet
        .rules
        .0
        .iter()
        .filter_map(|rule| match rule {
            CssRule::Import(import) => Some((import.url.to_string(), import.loc, ReferenceKind::CssImport)),
            _ => None,
        })
        .collect();
    let mut collector = UrlCollector::default();
    // The collector never fails.
    let _ = stylesheet.visit(&mut collector);
    located.extend(
        collector
            .found
            .into_iter()
            .map(|(value, loc)| (value, loc, ReferenceKind::CssUrl)),
    );
    located.sort_by_key(|(_, loc, _)| (loc.line, loc.column));

    let mut found: Vec<CssSpecifier> = Vec::with_capacity(located.len());
    for (value, loc, kind) in located {
        let claimed: Vec<(usize, usize)> = found.iter().map(|s| (s.start, s.end)).collect();
        match locate(css, &value, loc, &claimed) {
            Some((start, end)) => found.push(CssSpecifier {
                value,
                start,
                end,
                kind,
            }),
            None => tracing::debug!(url, specifier = %value, "css specifier not found in source"),
        }
    }
    found.sort_by_key(|specifier| specifier.start);
    Ok(found)
}

/// Byte offset of a 0-based line and 1-based column. Lines end at `\n`,
/// `\r\n`, `\r` or form feed; columns count UTF-16 code units.
fn offset_of(css: &str, line: u32, column: u32) -> usize {
    let mut line_start = 0;
    let mut remaining = line;
    let bytes = css.as_bytes();
    let mut index = 0;
    while remaining > 0 && index < bytes.len() {
        match bytes[index] {
            b'\r' if bytes.get(index + 1) == Some(&b'\n') => {
                index += 2;
                remaining -= 1;
                line_start = index;
            }
            b'\n' | b'\r' | b'\x0C' => {
                index += 1;
                remaining -= 1;
                line_start = index;
            }
            _ => index += 1,
        }
    }
    let mut units = column.saturating_sub(1) as usize;
    let mut offset = line_start;
    for ch in css[line_start..].chars() {
        if units == 0 || matches!(ch, '\n' | '\r' | '\x0C') {
            break;
        }
        units = units.saturating_sub(ch.len_utf16());
        offset += ch.len_utf8();
    }
    offset
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// Byte range of `value` for a token starting at `loc`: the value right
/// after the `@import`/`url(` keyword and an optional quote, else the next
/// unclaimed occurrence on or after the token's line.
fn locate(css: &str, value: &str, loc: Location, claimed: &[(usize, usize)]) -> Option<(usize, usize)> {
    if value.is_empty() {
        return None;
    }
    let token = offset_of(css, loc.line, loc.column);
    let mut rest = &css[token..];
    if let Some(after) = strip_prefix_ignore_case(rest, "@import") {
        rest = after.trim_start();
    }
    if let Some(after) = strip_prefix_ignore_case(rest, "url(") {
        rest = after.trim_start();
    }
    rest = rest.strip_prefix(['"', '\'']).unwrap_or(rest);
    let start = css.len() - rest.len();
    let free = |start: usize| !claimed.iter().any(|(s, _)| *s == start);
    if rest.starts_with(value) && free(start) {
        return Some((start, start + value.len()));
    }

    let line_start = offset_of(css, loc.line, 1);
    let mut from = line_start;
    while let Some(position) = css[from..].find(value) {
        let start = from + position;
        if free(start) {
            return Some((start, start + value.len()));
        }
        from = start + value.len();
    }
    None
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CssReferencesPlugin;

impl CssReferencesPlugin {
    pub fn references(info: &UrlInfo, css: &str) -> std::result::Result<Vec<Reference>, ParseError> {
        let mut references: Vec<Reference> = scan_css(&info.url, css)?
            .into_iter()
            .filter(|specifier| !is_ignored_specifier(&specifier.value))
            .map(|specifier| {
                let reference = reference_at(
                    info,
                    css,
                    &specifier.value,
                    specifier.start,
                    specifier.end,
                    specifier.kind,
                );
                match specifier.kind {
                    ReferenceKind::CssImport => reference.with_expected_type(UrlType::Css),
                    _ => reference,
                }
            })
            .collect();
        if let Some(reference) = sourcemap_comment_reference(info, css) {
            references.push(reference);
        }
        Ok(references)
    }
}

/// `/*# sourceMappingURL=... */` on the last line.
pub(crate) fn sourcemap_comment_reference(info: &UrlInfo, content: &str) -> Option<Reference> {
    let trimmed = content.trim_end();
    let line_start = trimmed.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let last_line = &trimmed[line_start..];
    let (prefix, suffix) = if last_line.starts_with("//# sourceMappingURL=") {
        ("//# sourceMappingURL=", "")
    } else if last_line.starts_with("/*# sourceMappingURL=") && last_line.ends_with("*/") {
        ("/*# sourceMappingURL=", "*/")
    } else {
        return None;
    };
    let value_start = line_start + prefix.len();
    let raw = &content[value_start..line_start + last_line.len() - suffix.len()];
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let start = value_start + (raw.len() - raw.trim_start().len());
    Some(
        reference_at(
            info,
            content,
            value,
            start,
            start + value.len(),
            ReferenceKind::SourcemapComment,
        )
        .with_expected_type(UrlType::Sourcemap),
    )
}

#[async_trait]
impl Plugin for CssReferencesPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::References
    }

    fn transform_types(&self) -> &[UrlType] {
        &[UrlType::Css]
    }

    async fn transform_url_content(
        &self,
        info: &UrlInfo,
        ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        let css = text_of(info, NAME)?;
        for reference in Self::references(info, css)? {
            ctx.inject_reference(reference);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(css: &str) -> Vec<String> {
        scan_css("file:///p/a.css", css)
            .unwrap()
            .into_iter()
            .map(|specifier| specifier.value)
            .collect()
    }

    #[test]
    fn test_scan_imports_and_urls() {
        let css = r#"@import "./reset.css";
@import url('theme.css') screen and (min-width: 600px);
/* url(./commented.png) */
.logo { background: url(./logo.png) no-repeat; content: "url(not-a-ref)"; }
.font { background-image: URL( "fonts/a.png" ); }
"#;
        let found = scan_css("file:///p/a.css", css).unwrap();
        let values: Vec<&str> = found.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["./reset.css", "theme.css", "./logo.png", "fonts/a.png"]
        );
        for specifier in &found {
            assert_eq!(&css[specifier.start..specifier.end], specifier.value);
        }
        assert_eq!(found[0].kind, ReferenceKind::CssImport);
        assert_eq!(found[1].kind, ReferenceKind::CssImport);
        assert_eq!(found[2].kind, ReferenceKind::CssUrl);
    }

    #[test]
    fn test_same_url_twice_on_a_line() {
        let css = ".a { background: url(x.png), url(x.png); }";
        let found = scan_css("file:///p/a.css", css).unwrap();
        assert_eq!(found.len(), 2);
        assert_ne!(found[0].start, found[1].start);
        for specifier in &found {
            assert_eq!(&css[specifier.start..specifier.end], "x.png");
        }
    }

    #[test]
    fn test_non_ascii_before_url() {
        let css = ".é::before { content: \"→\"; background: url(./café.png); }";
        let found = scan_css("file:///p/a.css", css).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(&css[found[0].start..found[0].end], "./café.png");
    }

    #[test]
    fn test_unterminated_string_is_dropped() {
        assert!(values("@import \"café\n").is_empty());
        let found = values("@import \"caf\n.a { background: url(b.png) }\n.c { background: url(d.png) }");
        assert!(found.contains(&"d.png".to_string()));
    }

    #[test]
    fn test_references_skip_fragments() {
        let info = UrlInfo::new("file:///p/a.css");
        let css = ".a { fill: url(#gradient); mask-image: url(./mask.svg); }";
        let references = CssReferencesPlugin::references(&info, css).unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].specifier, "./mask.svg");
        assert_eq!(references[0].kind, ReferenceKind::CssUrl);
        assert_eq!(references[0].line, 1);
    }

    #[test]
    fn test_sourcemap_comment() {
        let info = UrlInfo::new("file:///p/a.css");
        let css = "a{}\n/*# sourceMappingURL=a.css.map */\n";
        let references = CssReferencesPlugin::references(&info, css).unwrap();
        let comment = references.last().unwrap();
        assert_eq!(comment.kind, ReferenceKind::SourcemapComment);
        assert_eq!(&css[comment.start..comment.end], "a.css.map");
    }
}
