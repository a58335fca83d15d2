//! Query methods for UrlGraph.

use super::store::UrlGraph;
use crate::url_info::UrlInfo;

impl UrlGraph {
    /// Snapshot of a node.
    pub fn get(&self, url: &str) -> Option<UrlInfo> {
        self.inner.read().nodes.get(url).cloned()
    }

    /// Run `f` against a node without cloning it.
    pub fn with_node<R>(&self, url: &str, f: impl FnOnce(&UrlInfo) -> R) -> Option<R> {
        self.inner.read().nodes.get(url).map(f)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.read().nodes.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// All node URLs, sorted for deterministic iteration.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.inner.read().nodes.keys().cloned().collect();
        urls.sort();
        urls
    }

    /// Entry point URLs in registration order.
    pub fn entry_points(&self) -> Vec<String> {
        self.inner.read().entry_points.iter().cloned().collect()
    }

    /// Sorted snapshot of every node.
    pub fn snapshot(&self) -> Vec<UrlInfo> {
        let inner = self.inner.read();
        let mut nodes: Vec<UrlInfo> = inner.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.url.cmp(&b.url));
        nodes
    }

    /// Direct dependents of a node, sorted.
    pub fn dependents_of(&self, url: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .inner
            .read()
            .nodes
            .get(url)
            .map(|node| node.dependents.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    /// Current generation of a node, `None` if it does not exist.
    pub fn generation(&self, url: &str) -> Option<u64> {
        self.inner.read().nodes.get(url).map(|node| node.generation)
    }
}
