//! On-disk cache entry.

use jsenv_graph::{Reference, UrlType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::key::CACHE_FORMAT_VERSION;

/// State of one source an entry was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    pub url: String,
    /// BLAKE3 hex of the source content.
    pub hash: String,
    /// Last modification time in milliseconds, when known.
    pub mtime: Option<u64>,
}

impl SourceState {
    pub fn new(url: impl Into<String>, content: &[u8], mtime: Option<u64>) -> Self {
        Self {
            url: url.into(),
            hash: blake3::hash(content).to_hex().to_string(),
            mtime,
        }
    }

    /// Whether `content` (modified at `mtime`) is the content this state was
    /// recorded for. Equal mtimes are trusted without hashing.
    pub fn matches(&self, content: &[u8], mtime: Option<u64>) -> bool {
        if let (Some(recorded), Some(current)) = (self.mtime, mtime) {
            if recorded == current {
                return true;
            }
        }
        blake3::hash(content).to_hex().as_str() == self.hash
    }
}

/// Output of the transform pipeline for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub sources: Vec<SourceState>,
    pub sources_content: Vec<String>,
    pub compiled_content: String,
    /// JSON sourcemap from `compiled_content` back to the sources.
    pub sourcemap: Option<String>,
    pub references: Vec<Reference>,
    pub url_type: UrlType,
    pub content_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl CacheEntry {
    pub fn new(
        source: SourceState,
        source_content: impl Into<String>,
        compiled_content: impl Into<String>,
    ) -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            sources: vec![source],
            sources_content: vec![source_content.into()],
            compiled_content: compiled_content.into(),
            sourcemap: None,
            references: Vec::new(),
            url_type: UrlType::Unknown,
            content_type: String::new(),
            data: Map::new(),
        }
    }

    /// Check the entry is internally consistent. Returns the reason when it
    /// is not.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != CACHE_FORMAT_VERSION {
            return Err(format!(
                "format version {} (expected {CACHE_FORMAT_VERSION})",
                self.version
            ));
        }
        if self.sources.is_empty() {
            return Err("no sources recorded".to_string());
        }
        if self.sources.len() != self.sources_content.len() {
            return Err(format!(
                "{} sources but {} source contents",
                self.sources.len(),
                self.sources_content.len()
            ));
        }
        let len = self.compiled_content.len();
        for reference in &self.references {
            if reference.start > reference.end || reference.end > len {
                return Err(format!(
                    "reference \"{}\" spans {}..{} outside content of length {len}",
                    reference.specifier, reference.start, reference.end
                ));
            }
        }
        if let Some(sourcemap) = &self.sourcemap {
            jsenv_graph::sourcemap::parse(sourcemap).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Source state recorded for `url`.
    pub fn source(&self, url: &str) -> Option<&SourceState> {
        self.sources.iter().find(|source| source.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsenv_graph::ReferenceKind;

    fn entry() -> CacheEntry {
        CacheEntry::new(
            SourceState::new("file:///p/a.js", b"import './b.js'", Some(1000)),
            "import './b.js'",
            "import './b.js'",
        )
    }

    #[test]
    fn test_source_state_mtime_shortcut() {
        let state = SourceState::new("file:///p/a.js", b"one", Some(1000));
        assert!(state.matches(b"anything", Some(1000)));
        assert!(state.matches(b"one", Some(2000)));
        assert!(!state.matches(b"two", Some(2000)));
        assert!(!state.matches(b"two", None));
    }

    #[test]
    fn test_validate_accepts_consistent_entry() {
        let mut entry = entry();
        entry.references.push(
            Reference::new("file:///p/a.js", "./b.js", ReferenceKind::JsImport).with_span(8, 14),
        );
        assert!(entry.validate().is_ok());
        assert!(entry.source("file:///p/a.js").is_some());
    }

    #[test]
    fn test_validate_rejects_inconsistent_entries() {
        let mut wrong_version = entry();
        wrong_version.version = CACHE_FORMAT_VERSION + 1;
        assert!(wrong_version.validate().is_err());

        let mut out_of_bounds = entry();
        out_of_bounds.references.push(
            Reference::new("file:///p/a.js", "./b.js", ReferenceKind::JsImport).with_span(8, 400),
        );
        assert!(out_of_bounds.validate().unwrap_err().contains("outside content"));

        let mut bad_map = entry();
        bad_map.sourcemap = Some("{not json".into());
        assert!(bad_map.validate().is_err());
    }
}
