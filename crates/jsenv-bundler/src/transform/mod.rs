//! Built-in plugins.
//!
//! Reference discovery for HTML, CSS and JavaScript, scenario flags in
//! `import.meta`, JSON validation, dev autoreload injection and CSS
//! `@import` bundling. [`builtin_plugins`] registers them in the order the
//! kitchen expects: content transforms before reference discovery.

pub mod autoreload;
pub mod css;
pub mod css_bundle;
pub mod html;
pub mod import_meta;
pub mod js;
pub mod json;

pub use autoreload::{AUTORELOAD_CLIENT_PATH, AutoreloadPlugin};
pub use css::CssReferencesPlugin;
pub use css_bundle::CssBundlePlugin;
pub use html::HtmlReferencesPlugin;
pub use import_meta::ImportMetaScenarioPlugin;
pub use js::JsReferencesPlugin;
pub use json::JsonValidationPlugin;

use jsenv_graph::url::line_column_at;
use jsenv_graph::{Reference, ReferenceKind, UrlInfo};

use crate::plugins::PluginRegistry;
use crate::{Error, Result};

/// Which optional built-ins to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinOptions {
    /// Inject the autoreload client into HTML (dev only).
    pub autoreload: bool,
    /// Inline CSS `@import`s at build time.
    pub css_bundle: bool,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            autoreload: true,
            css_bundle: true,
        }
    }
}

/// Registry holding the built-in plugins.
pub fn builtin_plugins(options: BuiltinOptions) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.add(ImportMetaScenarioPlugin);
    registry.add(JsonValidationPlugin);
    registry.add(HtmlReferencesPlugin);
    registry.add(CssReferencesPlugin);
    registry.add(JsReferencesPlugin);
    if options.css_bundle {
        registry.add(CssBundlePlugin);
    }
    if options.autoreload {
        registry.add(AutoreloadPlugin);
    }
    registry
}

/// Reference to `specifier`, found at `start..end` of `content`.
pub(crate) fn reference_at(
    info: &UrlInfo,
    content: &str,
    specifier: &str,
    start: usize,
    end: usize,
    kind: ReferenceKind,
) -> Reference {
    let (line, column) = line_column_at(content, start);
    Reference::new(info.url.as_str(), specifier, kind)
        .with_span(start, end)
        .with_position(line, column)
}

/// Specifiers that never designate a resource.
pub(crate) fn is_ignored_specifier(specifier: &str) -> bool {
    let specifier = specifier.trim();
    specifier.is_empty()
        || specifier.starts_with('#')
        || ["javascript:", "mailto:", "tel:", "about:"]
            .iter()
            .any(|scheme| specifier.starts_with(scheme))
}

/// Text content of a node about to be transformed.
pub(crate) fn text_of<'a>(info: &'a UrlInfo, plugin: &str) -> Result<&'a str> {
    info.text()
        .ok_or_else(|| Error::plugin(plugin, format!("{} has no text content", info.url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;

    #[test]
    fn test_builtin_order() {
        let list = builtin_plugins(BuiltinOptions::default()).for_scenario(Scenario::Dev);
        let names = list.names();
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("jsenv:import-meta") < position("jsenv:js-references"));
        assert!(position("jsenv:html-references") < position("jsenv:autoreload"));
        // Build-only
        assert!(!names.contains(&"jsenv:css-bundle"));

        let prod = builtin_plugins(BuiltinOptions::default()).for_scenario(Scenario::Prod);
        assert!(prod.names().contains(&"jsenv:css-bundle"));
        assert!(!prod.names().contains(&"jsenv:autoreload"));
    }

    #[test]
    fn test_ignored_specifiers() {
        assert!(is_ignored_specifier(""));
        assert!(is_ignored_specifier("#top"));
        assert!(is_ignored_specifier("javascript:void(0)"));
        assert!(!is_ignored_specifier("./a.js"));
        assert!(!is_ignored_specifier("data:text/plain,a"));
    }
}
