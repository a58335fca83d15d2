//! Remote URLs kept verbatim in output.
//!
//! A preserved URL is never fetched: references to it are left as written
//! and the browser loads it at runtime. Patterns use `*` as a wildcard and
//! are checked in order; the last matching pattern decides.

use jsenv_graph::url::{Url, UrlKind};
use regex::Regex;

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    regex: Regex,
    preserve: bool,
}

#[derive(Debug, Clone)]
pub struct PreservedUrls {
    patterns: Vec<Pattern>,
}

impl PreservedUrls {
    /// No pattern: nothing is preserved.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Build from `(pattern, preserve)` pairs, in order.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        patterns
            .into_iter()
            .try_fold(Self::none(), |set, (pattern, preserve)| set.with(pattern, preserve))
    }

    pub fn with(mut self, pattern: impl Into<String>, preserve: bool) -> Result<Self, regex::Error> {
        let source = pattern.into();
        let regex = compile(&source)?;
        self.patterns.push(Pattern {
            source,
            regex,
            preserve,
        });
        Ok(self)
    }

    pub fn is_preserved(&self, url: &Url) -> bool {
        self.patterns
            .iter()
            .rev()
            .find(|pattern| pattern.regex.is_match(url.as_str()))
            .is_some_and(|pattern| pattern.preserve)
    }

    /// Remote URLs that are not preserved get fetched at build time.
    pub fn should_fetch(&self, url: &Url) -> bool {
        UrlKind::of(url) == UrlKind::Http && !self.is_preserved(url)
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&str, bool)> {
        self.patterns
            .iter()
            .map(|pattern| (pattern.source.as_str(), pattern.preserve))
    }
}

impl Default for PreservedUrls {
    /// Every `http(s)` URL is preserved.
    fn default() -> Self {
        Self {
            patterns: ["http://*", "https://*"]
                .into_iter()
                .filter_map(|source| {
                    Some(Pattern {
                        source: source.to_string(),
                        regex: compile(source).ok()?,
                        preserve: true,
                    })
                })
                .collect(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_preserves_remote_only() {
        let preserved = PreservedUrls::default();
        assert!(preserved.is_preserved(&url("https://cdn.example.com/a.js")));
        assert!(preserved.is_preserved(&url("http://example.com/")));
        assert!(!preserved.is_preserved(&url("file:///p/a.js")));
        assert!(!preserved.should_fetch(&url("https://cdn.example.com/a.js")));
    }

    #[test]
    fn test_last_match_wins() {
        let preserved = PreservedUrls::from_patterns([
            ("https://*", true),
            ("https://cdn.example.com/*", false),
        ])
        .unwrap();
        assert!(!preserved.is_preserved(&url("https://cdn.example.com/lib.js")));
        assert!(preserved.should_fetch(&url("https://cdn.example.com/lib.js")));
        assert!(preserved.is_preserved(&url("https://fonts.example.com/a.css")));
    }

    #[test]
    fn test_pattern_is_literal_except_wildcard() {
        let preserved = PreservedUrls::none().with("https://a.com/x.js?v=1", true).unwrap();
        assert!(preserved.is_preserved(&url("https://a.com/x.js?v=1")));
        assert!(!preserved.is_preserved(&url("https://a.com/xxjs?v=1")));
        assert_eq!(preserved.patterns().count(), 1);
    }
}
