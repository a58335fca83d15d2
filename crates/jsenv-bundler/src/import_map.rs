//! Import maps.
//!
//! `imports` map specifiers to URLs; `scopes` restrict extra mappings to
//! parents under a URL prefix. A key ending with `/` maps every specifier
//! starting with it. Among matching keys the longest wins, and scopes are
//! consulted (most specific first) before the top-level imports.

use jsenv_graph::url::{Url, is_bare_specifier, resolve_url};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ImportMapError {
    #[error("invalid import map JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawImportMap {
    #[serde(default)]
    imports: BTreeMap<String, String>,
    #[serde(default)]
    scopes: BTreeMap<String, BTreeMap<String, String>>,
}

type SpecifierMap = BTreeMap<String, Url>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportMap {
    imports: SpecifierMap,
    scopes: BTreeMap<String, SpecifierMap>,
}

impl ImportMap {
    /// Parse an import map. Addresses and URL-like keys are resolved
    /// against `base`, the URL of the import map itself (the HTML page for
    /// an inline map). Invalid entries are skipped.
    pub fn parse(json: &str, base: &Url) -> Result<Self, ImportMapError> {
        let raw: RawImportMap = serde_json::from_str(json)?;
        let imports = normalize_specifier_map(&raw.imports, base);
        let scopes = raw
            .scopes
            .iter()
            .filter_map(|(scope, map)| {
                let scope_url = resolve_url(scope, base)?;
                Some((scope_url.to_string(), normalize_specifier_map(map, base)))
            })
            .collect();
        Ok(Self { imports, scopes })
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }

    /// Resolve `specifier` written in `parent_url`, or `None` when the map
    /// has no entry for it.
    pub fn resolve(&self, specifier: &str, parent_url: &Url) -> Option<Url> {
        let normalized = normalize_key(specifier, parent_url)?;

        let mut scopes: Vec<(&String, &SpecifierMap)> = self
            .scopes
            .iter()
            .filter(|(scope, _)| scope_matches(scope, parent_url.as_str()))
            .collect();
        scopes.sort_by_key(|(scope, _)| std::cmp::Reverse(scope.len()));
        for (_, map) in scopes {
            if let Some(url) = match_specifier(map, &normalized) {
                return Some(url);
            }
        }
        match_specifier(&self.imports, &normalized)
    }

    /// Entries of `other` override entries of `self`.
    pub fn compose(&self, other: &ImportMap) -> ImportMap {
        let mut composed = self.clone();
        composed
            .imports
            .extend(other.imports.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (scope, map) in &other.scopes {
            composed
                .scopes
                .entry(scope.clone())
                .or_default()
                .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        composed
    }
}

/// Bare specifiers stay as written; URL-like ones become absolute URLs.
fn normalize_key(specifier: &str, base: &Url) -> Option<String> {
    if specifier.is_empty() {
        return None;
    }
    if is_bare_specifier(specifier) {
        return Some(specifier.to_string());
    }
    resolve_url(specifier, base).map(|url| url.to_string())
}

fn normalize_specifier_map(raw: &BTreeMap<String, String>, base: &Url) -> SpecifierMap {
    let mut map = SpecifierMap::new();
    for (key, address) in raw {
        let Some(key) = normalize_key(key, base) else {
            tracing::warn!(key, "ignoring empty import map key");
            continue;
        };
        let Some(url) = resolve_url(address, base) else {
            tracing::warn!(key, address, "ignoring import map address that is not a URL");
            continue;
        };
        if key.ends_with('/') && !url.as_str().ends_with('/') {
            tracing::warn!(key, address, "ignoring prefix mapping to an address without trailing slash");
            continue;
        }
        map.insert(key, url);
    }
    map
}

fn scope_matches(scope: &str, parent_url: &str) -> bool {
    parent_url == scope || (scope.ends_with('/') && parent_url.starts_with(scope))
}

fn match_specifier(map: &SpecifierMap, normalized: &str) -> Option<Url> {
    if let Some(url) = map.get(normalized) {
        return Some(url.clone());
    }
    let (prefix, address) = map
        .iter()
        .filter(|(key, _)| key.ends_with('/') && normalized.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())?;
    address.join(&normalized[prefix.len()..]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    const MAP: &str = r#"{
        "imports": {
            "lodash": "/node_modules/lodash-es/lodash.js",
            "lodash/": "/node_modules/lodash-es/",
            "./config.js": "./config.prod.js"
        },
        "scopes": {
            "/vendor/": { "lodash": "/vendor/lodash.js" }
        }
    }"#;

    #[test]
    fn test_exact_and_prefix_matches() {
        let map = ImportMap::parse(MAP, &url("file:///p/index.html")).unwrap();
        let parent = url("file:///p/src/main.js");
        assert_eq!(
            map.resolve("lodash", &parent).unwrap().as_str(),
            "file:///node_modules/lodash-es/lodash.js"
        );
        assert_eq!(
            map.resolve("lodash/map.js", &parent).unwrap().as_str(),
            "file:///node_modules/lodash-es/map.js"
        );
        assert!(map.resolve("react", &parent).is_none());
    }

    #[test]
    fn test_url_like_keys_are_remapped() {
        let map = ImportMap::parse(MAP, &url("file:///p/index.html")).unwrap();
        assert_eq!(
            map.resolve("../config.js", &url("file:///p/src/main.js"))
                .unwrap()
                .as_str(),
            "file:///p/config.prod.js"
        );
    }

    #[test]
    fn test_scopes_win_over_imports() {
        let map = ImportMap::parse(MAP, &url("file:///p/index.html")).unwrap();
        assert_eq!(
            map.resolve("lodash", &url("file:///vendor/lib.js"))
                .unwrap()
                .as_str(),
            "file:///vendor/lodash.js"
        );
    }

    #[test]
    fn test_invalid_prefix_mapping_is_skipped() {
        let map = ImportMap::parse(
            r#"{"imports":{"pkg/":"./pkg/index.js"}}"#,
            &url("file:///p/index.html"),
        )
        .unwrap();
        assert!(map.is_empty());
        assert!(ImportMap::parse("{", &url("file:///p/")).is_err());
    }

    #[test]
    fn test_compose_overrides() {
        let base = url("file:///p/index.html");
        let first = ImportMap::parse(r#"{"imports":{"a":"./a1.js"}}"#, &base).unwrap();
        let second = ImportMap::parse(r#"{"imports":{"a":"./a2.js"}}"#, &base).unwrap();
        let composed = first.compose(&second);
        assert_eq!(
            composed.resolve("a", &base).unwrap().as_str(),
            "file:///p/a2.js"
        );
    }
}
