//! HTML reference discovery.
//!
//! A small tag scanner, not a full HTML parser: it understands comments,
//! quoted and unquoted attributes, and the raw text of `<script>` and
//! `<style>`, which is all reference discovery needs. Offsets are byte
//! offsets into the HTML so references can be rewritten in place.

use async_trait::async_trait;
use jsenv_graph::url::{Url, inline_url, line_column_at};
use jsenv_graph::{Reference, ReferenceKind, Subtype, UrlInfo, UrlType};

use super::{is_ignored_specifier, reference_at, text_of};
use crate::diagnostics::ParseError;
use crate::import_map::ImportMap;
use crate::plugins::{Plugin, PluginPhase, TransformContext, TransformOutput};
use crate::{Error, Result};

const NAME: &str = "jsenv:html-references";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    pub value: Option<String>,
    /// Byte range of the value, quotes excluded.
    pub value_start: usize,
    pub value_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Lowercased tag name.
    pub name: String,
    /// Offset of `<`.
    pub start: usize,
    /// Offset just past the opening tag's `>`.
    pub open_end: usize,
    /// Offset just past the closing tag for raw text elements, `open_end`
    /// otherwise.
    pub element_end: usize,
    pub attributes: Vec<Attribute>,
    /// Raw text range of `<script>`/`<style>` bodies.
    pub body: Option<(usize, usize)>,
}

impl Tag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(|attribute| attribute.value.as_deref())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// Every opening tag of `html`, in document order.
pub fn scan_tags(html: &str) -> Vec<Tag> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut index = 0;

    while let Some(relative) = html[index..].find('<') {
        let start = index + relative;
        let rest = &html[start..];
        if rest.starts_with("<!--") {
            index = match rest.find("-->") {
                Some(end) => start + end + 3,
                None => html.len(),
            };
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") || rest.starts_with("</") {
            index = match rest.find('>') {
                Some(end) => start + end + 1,
                None => html.len(),
            };
            continue;
        }
        let name_start = start + 1;
        let name_end = name_start
            + html[name_start..]
                .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
                .unwrap_or(html.len() - name_start);
        if name_end == name_start || !bytes[name_start].is_ascii_alphabetic() {
            index = name_start;
            continue;
        }
        let name = html[name_start..name_end].to_ascii_lowercase();
        let (attributes, open_end) = scan_attributes(html, name_end);

        let mut tag = Tag {
            name,
            start,
            open_end,
            element_end: open_end,
            attributes,
            body: None,
        };
        if tag.name == "script" || tag.name == "style" {
            let closing = format!("</{}", tag.name);
            let lower_rest = html[open_end..].to_ascii_lowercase();
            let body_end = lower_rest
                .find(&closing)
                .map(|offset| open_end + offset)
                .unwrap_or(html.len());
            let element_end = html[body_end..]
                .find('>')
                .map(|offset| body_end + offset + 1)
                .unwrap_or(html.len());
            tag.body = Some((open_end, body_end));
            tag.element_end = element_end;
        }
        index = tag.element_end.max(start + 1);
        tags.push(tag);
    }
    tags
}

/// Attributes from `from` up to the end of the tag; returns them with the
/// offset just past `>`.
fn scan_attributes(html: &str, from: usize) -> (Vec<Attribute>, usize) {
    let bytes = html.as_bytes();
    let mut attributes = Vec::new();
    let mut index = from;

    loop {
        while index < bytes.len() && (bytes[index].is_ascii_whitespace() || bytes[index] == b'/') {
            index += 1;
        }
        if index >= bytes.len() {
            return (attributes, bytes.len());
        }
        if bytes[index] == b'>' {
            return (attributes, index + 1);
        }

        let name_start = index;
        while index < bytes.len()
            && !bytes[index].is_ascii_whitespace()
            && !matches!(bytes[index], b'=' | b'>' | b'/')
        {
            index += 1;
        }
        let name = html[name_start..index].to_ascii_lowercase();

        let mut cursor = index;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            attributes.push(Attribute {
                name,
                value: None,
                value_start: index,
                value_end: index,
            });
            continue;
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }

        let (value_start, value_end, next) = match bytes.get(cursor) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = cursor + 1;
                let value_end = html[value_start..]
                    .find(quote as char)
                    .map(|offset| value_start + offset)
                    .unwrap_or(bytes.len());
                (value_start, value_end, (value_end + 1).min(bytes.len()))
            }
            _ => {
                let value_start = cursor;
                let mut value_end = cursor;
                while value_end < bytes.len()
                    && !bytes[value_end].is_ascii_whitespace()
                    && bytes[value_end] != b'>'
                {
                    value_end += 1;
                }
                (value_start, value_end, value_end)
            }
        };
        attributes.push(Attribute {
            name,
            value: Some(html[value_start..value_end].to_string()),
            value_start,
            value_end,
        });
        index = next;
    }
}

/// Candidates of a `srcset` value as `(url, start, end)`, offsets relative
/// to the value.
pub fn parse_srcset(value: &str) -> Vec<(&str, usize, usize)> {
    let mut candidates = Vec::new();
    let mut offset = 0;
    for candidate in value.split(',') {
        let leading = candidate.len() - candidate.trim_start().len();
        let trimmed = candidate.trim_start();
        let url_len = trimmed
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(trimmed.len());
        if url_len > 0 {
            let start = offset + leading;
            candidates.push((&trimmed[..url_len], start, start + url_len));
        }
        offset += candidate.len() + 1;
    }
    candidates
}

/// How a `<script>` element is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptKind {
    Classic,
    Module,
    ImportMap,
    /// Data blocks (`application/ld+json`, templates): not code.
    Other,
}

fn script_kind(tag: &Tag) -> ScriptKind {
    match tag
        .attribute_value("type")
        .map(|value| value.trim().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("") | Some("text/javascript") | Some("application/javascript") => {
            ScriptKind::Classic
        }
        Some("module") => ScriptKind::Module,
        Some("importmap") => ScriptKind::ImportMap,
        Some(_) => ScriptKind::Other,
    }
}

/// Expected type of a `<link>` target, by `rel` (and `as`).
fn link_expected_type(tag: &Tag) -> Option<Option<UrlType>> {
    let rel = tag.attribute_value("rel")?.to_ascii_lowercase();
    let rels: Vec<&str> = rel.split_ascii_whitespace().collect();
    if rels.contains(&"stylesheet") {
        return Some(Some(UrlType::Css));
    }
    if rels.contains(&"modulepreload") {
        return Some(Some(UrlType::JsModule));
    }
    if rels.contains(&"manifest") {
        return Some(Some(UrlType::Webmanifest));
    }
    if rels.contains(&"preload") || rels.contains(&"prefetch") {
        return Some(match tag.attribute_value("as") {
            Some("script") => Some(UrlType::JsClassic),
            Some("style") => Some(UrlType::Css),
            _ => None,
        });
    }
    if rels.iter().any(|rel| rel.contains("icon")) {
        return Some(None);
    }
    None
}

/// Discover references in HTML.
///
/// Inline `<script>` and `<style>` bodies become inline child nodes whose
/// URL encodes their position; an inline import map is parsed and declared
/// for everything the page references.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlReferencesPlugin;

impl HtmlReferencesPlugin {
    pub fn collect(info: &UrlInfo, html: &str, ctx: &mut TransformContext) -> Result<()> {
        let parent = Url::parse(&info.url).map_err(|e| Error::plugin(NAME, e))?;
        for tag in scan_tags(html) {
            match tag.name.as_str() {
                "script" => collect_script(info, html, &parent, &tag, ctx)?,
                "style" => {
                    if let Some((start, end)) = tag.body {
                        ctx.inject_reference(inline_reference(
                            info,
                            html,
                            &parent,
                            (start, end),
                            ReferenceKind::HtmlInlineStyle,
                            ("style", "css", "text/css"),
                            UrlType::Css,
                        ));
                    }
                }
                "link" => {
                    if let Some(expected) = link_expected_type(&tag) {
                        if let Some(reference) =
                            attribute_reference(info, html, &tag, "href", ReferenceKind::HtmlHref)
                        {
                            ctx.inject_reference(match expected {
                                Some(expected) => reference.with_expected_type(expected),
                                None => reference,
                            });
                        }
                    }
                }
                "img" | "source" | "video" | "audio" | "track" | "embed" => {
                    for name in ["src", "poster"] {
                        if let Some(reference) =
                            attribute_reference(info, html, &tag, name, ReferenceKind::HtmlSrc)
                        {
                            ctx.inject_reference(reference);
                        }
                    }
                    if let Some(srcset) = tag.attribute("srcset") {
                        for reference in srcset_references(info, html, srcset) {
                            ctx.inject_reference(reference);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn collect_script(
    info: &UrlInfo,
    html: &str,
    parent: &Url,
    tag: &Tag,
    ctx: &mut TransformContext,
) -> Result<()> {
    let kind = script_kind(tag);
    let expected = match kind {
        ScriptKind::Classic => UrlType::JsClassic,
        ScriptKind::Module => UrlType::JsModule,
        ScriptKind::ImportMap => UrlType::Json,
        ScriptKind::Other => return Ok(()),
    };

    if tag.has_attribute("src") {
        let reference_kind = if kind == ScriptKind::ImportMap {
            ReferenceKind::ImportMap
        } else {
            ReferenceKind::HtmlSrc
        };
        if let Some(reference) = attribute_reference(info, html, tag, "src", reference_kind) {
            ctx.inject_reference(reference.with_expected_type(expected));
        }
        return Ok(());
    }

    let Some((start, end)) = tag.body else {
        return Ok(());
    };
    if html[start..end].trim().is_empty() {
        return Ok(());
    }

    if kind == ScriptKind::ImportMap {
        let json = &html[start..end];
        let import_map = ImportMap::parse(json, parent).map_err(|e| {
            ParseError::new(info.url.as_str(), html, start, e.to_string())
                .remap(info.sourcemap.as_ref())
        })?;
        ctx.declare_import_map(import_map);
        // The whole element: the build removes it once specifiers are
        // rewritten.
        let (line, column) = line_column_at(html, start);
        let specifier = inline_url(parent, line, column, "importmap", "json");
        ctx.inject_reference(
            reference_at(
                info,
                html,
                specifier.as_str(),
                tag.start,
                tag.element_end,
                ReferenceKind::ImportMap,
            )
            .with_inline(json, "application/importmap+json")
            .with_expected_type(UrlType::Json),
        );
        return Ok(());
    }

    ctx.inject_reference(inline_reference(
        info,
        html,
        parent,
        (start, end),
        ReferenceKind::HtmlInlineScript,
        ("script", "js", "text/javascript"),
        expected,
    ));
    Ok(())
}

fn inline_reference(
    info: &UrlInfo,
    html: &str,
    parent: &Url,
    (start, end): (usize, usize),
    kind: ReferenceKind,
    (label, extension, content_type): (&str, &str, &str),
    expected: UrlType,
) -> Reference {
    let (line, column) = line_column_at(html, start);
    let specifier = inline_url(parent, line, column, label, extension);
    reference_at(info, html, specifier.as_str(), start, end, kind)
        .with_inline(&html[start..end], content_type)
        .with_expected_type(expected)
        .with_expected_subtype(Subtype::Inline)
}

fn attribute_reference(
    info: &UrlInfo,
    html: &str,
    tag: &Tag,
    name: &str,
    kind: ReferenceKind,
) -> Option<Reference> {
    let attribute = tag.attribute(name)?;
    let value = attribute.value.as_deref()?;
    if is_ignored_specifier(value) {
        return None;
    }
    // Keep the span on the trimmed value.
    let leading = value.len() - value.trim_start().len();
    let start = attribute.value_start + leading;
    let end = start + value.trim().len();
    Some(reference_at(info, html, value.trim(), start, end, kind))
}

fn srcset_references(info: &UrlInfo, html: &str, srcset: &Attribute) -> Vec<Reference> {
    let Some(value) = srcset.value.as_deref() else {
        return Vec::new();
    };
    parse_srcset(value)
        .into_iter()
        .filter(|(url, _, _)| !is_ignored_specifier(url))
        .map(|(url, start, end)| {
            reference_at(
                info,
                html,
                url,
                srcset.value_start + start,
                srcset.value_start + end,
                ReferenceKind::HtmlSrcset,
            )
        })
        .collect()
}

#[async_trait]
impl Plugin for HtmlReferencesPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::References
    }

    fn transform_types(&self) -> &[UrlType] {
        &[UrlType::Html]
    }

    async fn transform_url_content(
        &self,
        info: &UrlInfo,
        ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        let html = text_of(info, NAME)?;
        Self::collect(info, html, ctx)?;
        Ok(None)
    }
}
