//! Cache key computation using BLAKE3 content-addressed hashing.
//!
//! A key identifies "this URL compiled by this pipeline": the URL itself,
//! the scenario, and every compiler option that changes the output. Source
//! freshness is checked separately, against the entry's recorded sources.

use blake3::Hasher;
use std::collections::BTreeMap;

use crate::scenario::Scenario;

/// Current cache format version. Increment when the entry format changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Content-addressed cache key (BLAKE3 hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from a hex string.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the cache key as a hex string.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiler options that take part in the key.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions<'a> {
    pub scenario: Scenario,
    /// Names of the plugins transforming the node, in order.
    pub plugins: Vec<&'a str>,
    pub minify: bool,
    pub runtime_compat: Option<&'a BTreeMap<String, String>>,
}

/// Compute the cache key for `url` compiled with `options`.
///
/// The key is a BLAKE3 hash of:
/// 1. Cache format version
/// 2. Crate version
/// 3. Source URL
/// 4. Scenario
/// 5. Transforming plugins, in order
/// 6. Minification and runtime compatibility targets (sorted)
pub fn compute_cache_key(url: &str, options: &CompilerOptions<'_>) -> CacheKey {
    let mut hasher = Hasher::new();

    hasher.update(&CACHE_FORMAT_VERSION.to_le_bytes());
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    hasher.update(b"\0");

    hasher.update(url.as_bytes());
    hasher.update(b"\0");

    hasher.update(options.scenario.as_str().as_bytes());
    hasher.update(b"\0");

    for plugin in &options.plugins {
        hasher.update(plugin.as_bytes());
        hasher.update(b"\0");
    }

    hasher.update(&[u8::from(options.minify)]);
    if let Some(runtime_compat) = options.runtime_compat {
        // BTreeMap iterates sorted
        for (runtime, version) in runtime_compat {
            hasher.update(runtime.as_bytes());
            hasher.update(b"=");
            hasher.update(version.as_bytes());
            hasher.update(b"\0");
        }
    }

    CacheKey(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(scenario: Scenario) -> CompilerOptions<'static> {
        CompilerOptions {
            scenario,
            plugins: vec!["jsenv:import-meta", "jsenv:js-references"],
            ..CompilerOptions::default()
        }
    }

    #[test]
    fn test_cache_key_deterministic() {
        let key1 = compute_cache_key("file:///p/a.js", &options(Scenario::Dev));
        let key2 = compute_cache_key("file:///p/a.js", &options(Scenario::Dev));
        assert_eq!(key1, key2);
        assert_eq!(key1.as_hex().len(), 64);
    }

    #[test]
    fn test_cache_key_changes_on_url_or_scenario() {
        let base = compute_cache_key("file:///p/a.js", &options(Scenario::Dev));
        assert_ne!(base, compute_cache_key("file:///p/b.js", &options(Scenario::Dev)));
        assert_ne!(base, compute_cache_key("file:///p/a.js", &options(Scenario::Prod)));
    }

    #[test]
    fn test_cache_key_changes_on_compiler_options() {
        let base = compute_cache_key("file:///p/a.js", &options(Scenario::Prod));

        let mut minified = options(Scenario::Prod);
        minified.minify = true;
        assert_ne!(base, compute_cache_key("file:///p/a.js", &minified));

        let compat = BTreeMap::from([("chrome".to_string(), "64".to_string())]);
        let mut targeted = options(Scenario::Prod);
        targeted.runtime_compat = Some(&compat);
        assert_ne!(base, compute_cache_key("file:///p/a.js", &targeted));

        let mut fewer_plugins = options(Scenario::Prod);
        fewer_plugins.plugins.pop();
        assert_ne!(base, compute_cache_key("file:///p/a.js", &fewer_plugins));
    }
}
