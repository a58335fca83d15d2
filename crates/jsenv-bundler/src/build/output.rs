//! What a build hands back to its caller.

use indexmap::IndexMap;
use jsenv_graph::Content;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version information of one build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedUrlInfo {
    pub versioned: bool,
    pub version: Option<String>,
}

/// Result of a build.
///
/// Every map is sorted by key, so two builds of the same inputs compare
/// equal.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// Build-relative path to final content.
    pub build_file_contents: IndexMap<String, Content>,
    /// Project-relative source path (the URL for remote sources) to the
    /// build-relative path holding it.
    pub build_mappings: IndexMap<String, String>,
    /// Build-relative path to its version information.
    pub generated_urls_config: IndexMap<String, GeneratedUrlInfo>,
    /// Entry point URL to its build-relative path.
    pub entry_points: IndexMap<String, String>,
    pub build_directory: PathBuf,
}

impl BuildResult {
    /// Content of a build file as text.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.build_file_contents.get(path).and_then(Content::as_text)
    }

    /// Build-relative path of a source, by project-relative path.
    pub fn mapping(&self, source: &str) -> Option<&str> {
        self.build_mappings.get(source).map(String::as_str)
    }

    /// Fold the result of a sub-build written to `prefix` into this one.
    pub(crate) fn merge_subbuild(&mut self, prefix: &str, subbuild: BuildResult) {
        let prefixed = |path: &str| format!("{prefix}/{path}");
        for (path, content) in subbuild.build_file_contents {
            self.build_file_contents.insert(prefixed(&path), content);
        }
        for (source, path) in subbuild.build_mappings {
            self.build_mappings
                .entry(format!("{prefix}/{source}"))
                .or_insert_with(|| prefixed(&path));
        }
        for (path, info) in subbuild.generated_urls_config {
            self.generated_urls_config.insert(prefixed(&path), info);
        }
    }

    /// Sort every map by key.
    pub(crate) fn sort(&mut self) {
        self.build_file_contents.sort_keys();
        self.build_mappings.sort_keys();
        self.generated_urls_config.sort_keys();
        self.entry_points.sort_keys();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_subbuild_prefixes_paths() {
        let mut parent = BuildResult::default();
        parent
            .build_file_contents
            .insert("main.html".into(), Content::from("<html></html>"));

        let mut sub = BuildResult::default();
        sub.build_file_contents
            .insert("sw_1a2b3c4d.js".into(), Content::from("self;"));
        sub.build_mappings
            .insert("sw.js".into(), "sw_1a2b3c4d.js".into());
        sub.generated_urls_config.insert(
            "sw_1a2b3c4d.js".into(),
            GeneratedUrlInfo {
                versioned: true,
                version: Some("1a2b3c4d".into()),
            },
        );

        parent.merge_subbuild("worker", sub);
        parent.sort();
        assert_eq!(
            parent.build_file_contents.keys().collect::<Vec<_>>(),
            vec!["main.html", "worker/sw_1a2b3c4d.js"]
        );
        assert_eq!(parent.mapping("worker/sw.js"), Some("worker/sw_1a2b3c4d.js"));
        assert!(parent.generated_urls_config["worker/sw_1a2b3c4d.js"].versioned);
        assert_eq!(parent.text("worker/sw_1a2b3c4d.js"), Some("self;"));
    }
}
