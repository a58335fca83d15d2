//! Graph node: everything known about one URL.

use indexmap::IndexSet;
use oxc_sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reference::Reference;

/// Internal resource type; drives which transform and bundle hooks apply.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UrlType {
    Html,
    Css,
    JsModule,
    JsClassic,
    Json,
    Webmanifest,
    Sourcemap,
    Asset,
    #[default]
    Unknown,
}

impl UrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlType::Html => "html",
            UrlType::Css => "css",
            UrlType::JsModule => "js_module",
            UrlType::JsClassic => "js_classic",
            UrlType::Json => "json",
            UrlType::Webmanifest => "webmanifest",
            UrlType::Sourcemap => "sourcemap",
            UrlType::Asset => "asset",
            UrlType::Unknown => "unknown",
        }
    }

    pub fn is_js(&self) -> bool {
        matches!(self, UrlType::JsModule | UrlType::JsClassic)
    }

    /// Source files get transformed and scanned for references; assets are
    /// copied byte for byte.
    pub fn is_source(&self) -> bool {
        !matches!(self, UrlType::Asset | UrlType::Unknown)
    }

    /// Types whose content may carry a `sourceMappingURL` comment.
    pub fn supports_sourcemap(&self) -> bool {
        matches!(self, UrlType::Css | UrlType::JsModule | UrlType::JsClassic)
    }
}

impl std::fmt::Display for UrlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UrlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "html" => UrlType::Html,
            "css" => UrlType::Css,
            "js_module" => UrlType::JsModule,
            "js_classic" => UrlType::JsClassic,
            "json" => UrlType::Json,
            "webmanifest" => UrlType::Webmanifest,
            "sourcemap" => UrlType::Sourcemap,
            "asset" => UrlType::Asset,
            "unknown" => UrlType::Unknown,
            other => return Err(format!("unknown url type: {other}")),
        })
    }
}

/// Refinement of a [`UrlType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    Worker,
    ServiceWorker,
    SharedWorker,
    ImportDynamic,
    ImportStatic,
    Inline,
}

impl Subtype {
    pub fn is_worker(&self) -> bool {
        matches!(
            self,
            Subtype::Worker | Subtype::ServiceWorker | Subtype::SharedWorker
        )
    }
}

/// Node content, either UTF-8 text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    /// Build content from bytes, keeping text when the bytes are valid UTF-8
    /// and the caller expects text.
    pub fn from_bytes(bytes: Vec<u8>, expect_text: bool) -> Self {
        if expect_text {
            match String::from_utf8(bytes) {
                Ok(text) => Content::Text(text),
                Err(err) => Content::Binary(err.into_bytes()),
            }
        } else {
            Content::Binary(bytes)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Content::Text(_))
    }

    /// Hex blake3 digest of the bytes.
    pub fn hash(&self) -> String {
        blake3::hash(self.as_bytes()).to_hex().to_string()
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Content::Binary(value)
    }
}

/// One resolved URL in the graph.
///
/// Nodes are owned by [`crate::UrlGraph`]; the `references` and
/// `dependents` sets hold URL keys, never pointers, so cycles between nodes
/// do not create ownership cycles.
#[derive(Debug, Clone, Default)]
pub struct UrlInfo {
    /// Canonical source-side URL, the graph key.
    pub url: String,
    /// URL addressing this node in the current scenario (server path in dev,
    /// build URL with version placeholder in build).
    pub generated_url: Option<String>,
    pub url_type: UrlType,
    pub subtype: Option<Subtype>,
    pub content_type: Option<String>,
    pub content: Option<Content>,
    /// Content as first loaded; feeds `sourcesContent`.
    pub original_content: Option<Content>,
    /// Accumulated map from current content back to original content.
    pub sourcemap: Option<SourceMap>,
    /// Outgoing references, in discovery order.
    pub references: Vec<Reference>,
    /// URLs of nodes referencing this one. Used for impact queries only.
    pub dependents: IndexSet<String>,
    /// Free-form plugin metadata, preserved across passes.
    pub data: Map<String, Value>,
    pub is_entry_point: bool,
    pub is_inline: bool,
    pub inline_parent: Option<String>,
    /// Bumped whenever the node is invalidated.
    pub generation: u64,
    /// Milliseconds since the Unix epoch of the backing resource, when known.
    pub last_modified: Option<u64>,
    /// Set once the transform pipeline ran for the current generation.
    pub cooked: bool,
}

impl UrlInfo {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Current content as text, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Content::as_text)
    }

    /// Original content as text, if any.
    pub fn original_text(&self) -> Option<&str> {
        self.original_content.as_ref().and_then(Content::as_text)
    }

    /// Record the first loaded content. Later calls are ignored until the
    /// node is invalidated.
    pub fn capture_original(&mut self, content: &Content) {
        if self.original_content.is_none() {
            self.original_content = Some(content.clone());
        }
    }

    /// URLs of resolved outgoing references, deduplicated, discovery order.
    pub fn dependency_urls(&self) -> IndexSet<String> {
        self.references
            .iter()
            .filter_map(|reference| reference.url.clone())
            .collect()
    }

    /// Whether any reference of this node points at `url`.
    pub fn references_url(&self, url: &str) -> bool {
        self.references
            .iter()
            .any(|reference| reference.url.as_deref() == Some(url))
    }

    pub fn is_worker(&self) -> bool {
        self.subtype.is_some_and(|subtype| subtype.is_worker())
    }

    pub fn is_service_worker(&self) -> bool {
        self.subtype == Some(Subtype::ServiceWorker)
    }

    /// Quoted HTTP entity tag derived from the current content.
    pub fn content_etag(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        Some(format!("\"{}\"", &content.hash()[..16]))
    }

    /// Plugin metadata accessor.
    pub fn data_flag(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_etag_follows_content() {
        let mut info = UrlInfo::new("file:///p/a.js");
        assert!(info.content_etag().is_none());
        info.content = Some(Content::from("a"));
        let first = info.content_etag().unwrap();
        assert!(first.starts_with('"') && first.ends_with('"'));
        assert_eq!(first.len(), 18);
        info.content = Some(Content::from("b"));
        assert_ne!(info.content_etag().unwrap(), first);
    }

    #[test]
    fn test_content_from_bytes_falls_back_to_binary() {
        let content = Content::from_bytes(vec![0xff, 0xfe], true);
        assert!(!content.is_text());
        let content = Content::from_bytes(b"hello".to_vec(), true);
        assert_eq!(content.as_text(), Some("hello"));
    }

    #[test]
    fn test_capture_original_only_once() {
        let mut info = UrlInfo::new("file:///a.js");
        info.capture_original(&Content::from("first"));
        info.capture_original(&Content::from("second"));
        assert_eq!(info.original_text(), Some("first"));
    }

    #[test]
    fn test_url_type_round_trip_str() {
        for ty in [UrlType::Html, UrlType::JsClassic, UrlType::Asset] {
            assert_eq!(ty.as_str().parse::<UrlType>().unwrap(), ty);
        }
        assert!("nope".parse::<UrlType>().is_err());
    }

    #[test]
    fn test_data_flags() {
        let mut info = UrlInfo::new("file:///a.js");
        assert!(!info.data_flag("bundled"));
        info.set_data("bundled", true);
        assert!(info.data_flag("bundled"));
    }
}
