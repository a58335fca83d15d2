//! References: one mention of a specifier inside a parent resource.

use serde::{Deserialize, Serialize};

use crate::url_info::{Subtype, UrlType};

/// Syntactic construct a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    EntryPoint,
    HtmlHref,
    HtmlSrc,
    HtmlSrcset,
    HtmlInlineScript,
    HtmlInlineStyle,
    ImportMap,
    CssImport,
    CssUrl,
    JsImport,
    JsDynamicImport,
    JsUrl,
    JsWorker,
    JsServiceWorker,
    JsImportScripts,
    SourcemapComment,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::EntryPoint => "entry_point",
            ReferenceKind::HtmlHref => "html_href",
            ReferenceKind::HtmlSrc => "html_src",
            ReferenceKind::HtmlSrcset => "html_srcset",
            ReferenceKind::HtmlInlineScript => "html_inline_script",
            ReferenceKind::HtmlInlineStyle => "html_inline_style",
            ReferenceKind::ImportMap => "import_map",
            ReferenceKind::CssImport => "css_import",
            ReferenceKind::CssUrl => "css_url",
            ReferenceKind::JsImport => "js_import",
            ReferenceKind::JsDynamicImport => "js_dynamic_import",
            ReferenceKind::JsUrl => "js_url",
            ReferenceKind::JsWorker => "js_worker",
            ReferenceKind::JsServiceWorker => "js_service_worker",
            ReferenceKind::JsImportScripts => "js_import_scripts",
            ReferenceKind::SourcemapComment => "sourcemap_comment",
        }
    }

    /// References written inside JavaScript source.
    pub fn is_js(&self) -> bool {
        matches!(
            self,
            ReferenceKind::JsImport
                | ReferenceKind::JsDynamicImport
                | ReferenceKind::JsUrl
                | ReferenceKind::JsWorker
                | ReferenceKind::JsServiceWorker
                | ReferenceKind::JsImportScripts
        )
    }

    /// ES module specifiers, subject to import map resolution.
    pub fn is_module_specifier(&self) -> bool {
        matches!(
            self,
            ReferenceKind::JsImport | ReferenceKind::JsDynamicImport
        )
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content carried by an inline reference (`<script>` body, `<style>` body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineContent {
    pub content: String,
    pub content_type: String,
}

/// One occurrence of a specifier inside its parent.
///
/// `start..end` are byte offsets of the specifier text in the parent's
/// content at the time the reference was discovered; the finalize stage
/// replaces exactly that range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub parent_url: String,
    /// Specifier as written in source.
    pub specifier: String,
    pub kind: ReferenceKind,
    /// Type the parent expects the target to have.
    pub expected_type: Option<UrlType>,
    pub expected_subtype: Option<Subtype>,
    pub start: usize,
    pub end: usize,
    /// 1-based line of the specifier in the parent.
    pub line: u32,
    /// 1-based column of the specifier in the parent.
    pub column: u32,
    /// Resolved target URL; `None` until resolution succeeds.
    pub url: Option<String>,
    pub inline: Option<InlineContent>,
    /// Not written in source (e.g. an entry point); never rewritten.
    pub implicit: bool,
    /// Remote URL kept verbatim in output.
    pub preserved: bool,
}

impl Reference {
    pub fn new(
        parent_url: impl Into<String>,
        specifier: impl Into<String>,
        kind: ReferenceKind,
    ) -> Self {
        Self {
            parent_url: parent_url.into(),
            specifier: specifier.into(),
            kind,
            expected_type: None,
            expected_subtype: None,
            start: 0,
            end: 0,
            line: 0,
            column: 0,
            url: None,
            inline: None,
            implicit: false,
            preserved: false,
        }
    }

    /// Reference to an entry point, owned by no parent content.
    pub fn entry_point(project_url: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            implicit: true,
            ..Self::new(project_url, specifier, ReferenceKind::EntryPoint)
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_expected_type(mut self, expected: UrlType) -> Self {
        self.expected_type = Some(expected);
        self
    }

    pub fn with_expected_subtype(mut self, subtype: Subtype) -> Self {
        self.expected_subtype = Some(subtype);
        self
    }

    pub fn with_inline(mut self, content: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.inline = Some(InlineContent {
            content: content.into(),
            content_type: content_type.into(),
        });
        self
    }

    pub fn is_inline(&self) -> bool {
        self.inline.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.url.is_some()
    }

    /// Whether the specifier occupies a real range in the parent content.
    pub fn is_rewritable(&self) -> bool {
        !self.implicit && self.end >= self.start && (self.end > self.start || self.is_inline())
    }
}
