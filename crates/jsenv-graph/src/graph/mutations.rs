//! Mutation methods for UrlGraph.

use indexmap::IndexSet;
use oxc_sourcemap::SourceMap;

use super::store::{GraphInner, UrlGraph};
use crate::reference::Reference;
use crate::url_info::{Content, UrlInfo};
use crate::{Error, Result};

/// New content for a node.
#[derive(Debug, Clone, Default)]
pub struct ContentUpdate {
    pub content: Option<Content>,
    pub content_type: Option<String>,
    pub sourcemap: Option<SourceMap>,
}

impl ContentUpdate {
    pub fn content(content: impl Into<Content>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_sourcemap(mut self, sourcemap: Option<SourceMap>) -> Self {
        self.sourcemap = sourcemap;
        self
    }
}

impl UrlGraph {
    /// Return the node for `url`, creating an empty one if it does not exist.
    ///
    /// Never duplicates a node for the same URL.
    pub fn get_or_create(&self, url: &str) -> UrlInfo {
        let mut inner = self.inner.write();
        inner
            .nodes
            .entry(url.to_string())
            .or_insert_with(|| UrlInfo::new(url))
            .clone()
    }

    /// Replace a node wholesale, keeping the graph's view of its dependents.
    ///
    /// Used to commit a node cooked from a snapshot. References are synced so
    /// the `dependents` sets of targets stay accurate.
    pub fn commit(&self, info: UrlInfo) {
        let mut inner = self.inner.write();
        commit_locked(&mut inner, info);
    }

    /// Commit `info` only if the node is still at `generation`.
    ///
    /// Returns `false` (and drops `info`) when the node was invalidated
    /// after the snapshot `info` was cooked from was taken.
    pub fn commit_if_current(&self, info: UrlInfo, generation: u64) -> bool {
        let mut inner = self.inner.write();
        let current = inner.nodes.get(&info.url).map(|node| node.generation);
        if current.is_some_and(|current| current != generation) {
            return false;
        }
        commit_locked(&mut inner, info);
        true
    }

    /// Update a node's content in place.
    ///
    /// The node keeps its identity, so anything keyed by its URL (such as a
    /// version placeholder) remains valid; only the content it hashes to
    /// changes.
    pub fn update_content(&self, url: &str, update: ContentUpdate) -> Result<()> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(url)
            .ok_or_else(|| Error::NodeNotFound(url.to_string()))?;
        if let Some(content) = update.content {
            node.capture_original(&content);
            node.content = Some(content);
        }
        if let Some(content_type) = update.content_type {
            node.content_type = Some(content_type);
        }
        if update.sourcemap.is_some() {
            node.sourcemap = update.sourcemap;
        }
        Ok(())
    }

    /// Apply an arbitrary mutation to one node under the write lock.
    pub fn update<R>(&self, url: &str, f: impl FnOnce(&mut UrlInfo) -> R) -> Result<R> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(url)
            .ok_or_else(|| Error::NodeNotFound(url.to_string()))?;
        Ok(f(node))
    }

    /// Replace the outgoing references of a node.
    ///
    /// Targets that are newly referenced are created on demand and get the
    /// parent added to their `dependents`; targets no longer referenced lose
    /// it.
    pub fn set_references(&self, url: &str, references: Vec<Reference>) -> Result<()> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(url)
            .ok_or_else(|| Error::NodeNotFound(url.to_string()))?;
        let old_targets = node.dependency_urls();
        node.references = references;
        let new_targets = node.dependency_urls();
        sync_dependents(&mut inner, url, &old_targets, &new_targets);
        Ok(())
    }

    /// Mark a node as an entry point, creating it if needed.
    pub fn mark_entry_point(&self, url: &str) {
        let mut inner = self.inner.write();
        inner.entry_points.insert(url.to_string());
        inner
            .nodes
            .entry(url.to_string())
            .or_insert_with(|| UrlInfo::new(url))
            .is_entry_point = true;
    }

    /// Remove a node that nothing references anymore.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StillReferenced`] while another node lists `url`
    /// among its dependencies, and [`Error::NodeNotFound`] for unknown URLs.
    pub fn remove_node(&self, url: &str) -> Result<UrlInfo> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get(url)
            .ok_or_else(|| Error::NodeNotFound(url.to_string()))?;
        let referrers: Vec<String> = node
            .dependents
            .iter()
            .filter(|dependent| dependent.as_str() != url)
            .cloned()
            .collect();
        if !referrers.is_empty() {
            return Err(Error::StillReferenced {
                url: url.to_string(),
                dependents: referrers,
            });
        }

        let Some(removed) = inner.nodes.remove(url) else {
            return Err(Error::NodeNotFound(url.to_string()));
        };
        for target in removed.dependency_urls() {
            if let Some(target_node) = inner.nodes.get_mut(&target) {
                target_node.dependents.shift_remove(url);
            }
        }
        inner.entry_points.shift_remove(url);
        Ok(removed)
    }

    /// Invalidate a node and every node transitively depending on it.
    ///
    /// Invalidated nodes lose their cooked content and get a new generation,
    /// so results of in-flight work started before the invalidation can be
    /// recognised as stale and discarded. References are kept so later
    /// invalidations still cascade. Returns the affected URLs, sorted.
    pub fn invalidate(&self, url: &str) -> Vec<String> {
        let affected = self.dependents_closure(url);
        let mut inner = self.inner.write();
        for affected_url in &affected {
            if let Some(node) = inner.nodes.get_mut(affected_url) {
                node.generation += 1;
                node.content = None;
                // Inline content lives in the parent; keep it until the
                // parent is cooked again and overwrites it.
                if !node.is_inline {
                    node.original_content = None;
                }
                node.sourcemap = None;
                node.generated_url = None;
                node.cooked = false;
            }
        }
        affected
    }
}

fn commit_locked(inner: &mut GraphInner, mut info: UrlInfo) {
    let previous = inner.nodes.remove(&info.url);
    if let Some(previous) = &previous {
        info.dependents = previous.dependents.clone();
    }
    let url = info.url.clone();
    let old_targets = previous
        .map(|node| node.dependency_urls())
        .unwrap_or_default();
    let new_targets = info.dependency_urls();
    if info.is_entry_point {
        inner.entry_points.insert(url.clone());
    }
    inner.nodes.insert(url.clone(), info);
    sync_dependents(inner, &url, &old_targets, &new_targets);
}

fn sync_dependents(
    inner: &mut GraphInner,
    parent: &str,
    old_targets: &IndexSet<String>,
    new_targets: &IndexSet<String>,
) {
    for removed in old_targets.difference(new_targets) {
        if let Some(target) = inner.nodes.get_mut(removed) {
            target.dependents.shift_remove(parent);
        }
    }
    for added in new_targets {
        inner
            .nodes
            .entry(added.clone())
            .or_insert_with(|| UrlInfo::new(added.clone()))
            .dependents
            .insert(parent.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceKind;

    fn reference_to(parent: &str, target: &str) -> Reference {
        let mut reference = Reference::new(parent, target, ReferenceKind::JsImport);
        reference.url = Some(target.to_string());
        reference
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let graph = UrlGraph::new();
        graph.get_or_create("file:///a.js");
        graph.get_or_create("file:///a.js");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_set_references_tracks_dependents() {
        let graph = UrlGraph::new();
        graph.get_or_create("file:///a.js");
        graph
            .set_references("file:///a.js", vec![reference_to("file:///a.js", "file:///b.js")])
            .unwrap();
        let b = graph.get("file:///b.js").unwrap();
        assert!(b.dependents.contains("file:///a.js"));

        graph.set_references("file:///a.js", vec![]).unwrap();
        let b = graph.get("file:///b.js").unwrap();
        assert!(b.dependents.is_empty());
    }

    #[test]
    fn test_remove_node_refuses_referenced() {
        let graph = UrlGraph::new();
        graph.get_or_create("file:///a.js");
        graph
            .set_references("file:///a.js", vec![reference_to("file:///a.js", "file:///b.js")])
            .unwrap();

        let err = graph.remove_node("file:///b.js").unwrap_err();
        assert!(matches!(err, Error::StillReferenced { .. }));

        graph.remove_node("file:///a.js").unwrap();
        assert!(graph.get("file:///b.js").unwrap().dependents.is_empty());
        graph.remove_node("file:///b.js").unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_update_content_keeps_original() {
        let graph = UrlGraph::new();
        graph.get_or_create("file:///a.js");
        graph
            .update_content("file:///a.js", ContentUpdate::content("v1"))
            .unwrap();
        graph
            .update_content(
                "file:///a.js",
                ContentUpdate::content("v2").with_content_type("text/javascript"),
            )
            .unwrap();
        let node = graph.get("file:///a.js").unwrap();
        assert_eq!(node.text(), Some("v2"));
        assert_eq!(node.original_text(), Some("v1"));
        assert_eq!(node.content_type.as_deref(), Some("text/javascript"));
    }

    #[test]
    fn test_update_content_unknown_node() {
        let graph = UrlGraph::new();
        let err = graph
            .update_content("file:///missing.js", ContentUpdate::content("x"))
            .unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
    }

    #[test]
    fn test_invalidate_cascades_to_dependents_only() {
        let graph = UrlGraph::new();
        for url in ["file:///html", "file:///main.js", "file:///dep.js", "file:///other.js"] {
            graph.get_or_create(url);
            graph.update_content(url, ContentUpdate::content("x")).unwrap();
        }
        graph
            .set_references("file:///html", vec![reference_to("file:///html", "file:///main.js")])
            .unwrap();
        graph
            .set_references(
                "file:///main.js",
                vec![
                    reference_to("file:///main.js", "file:///dep.js"),
                    reference_to("file:///main.js", "file:///other.js"),
                ],
            )
            .unwrap();

        let affected = graph.invalidate("file:///dep.js");
        assert_eq!(
            affected,
            vec!["file:///dep.js", "file:///html", "file:///main.js"]
        );
        assert!(graph.get("file:///other.js").unwrap().content.is_some());
        assert!(graph.get("file:///html").unwrap().content.is_none());
        assert_eq!(graph.get("file:///dep.js").unwrap().generation, 1);
    }

    #[test]
    fn test_commit_preserves_dependents() {
        let graph = UrlGraph::new();
        graph.get_or_create("file:///a.js");
        graph
            .set_references("file:///a.js", vec![reference_to("file:///a.js", "file:///b.js")])
            .unwrap();
        let mut b = graph.get("file:///b.js").unwrap();
        b.dependents.clear();
        b.content = Some(Content::from("export {}"));
        graph.commit(b);
        assert!(graph
            .get("file:///b.js")
            .unwrap()
            .dependents
            .contains("file:///a.js"));
    }

    #[test]
    fn test_commit_if_current_rejects_stale_snapshot() {
        let graph = UrlGraph::new();
        let snapshot = graph.get_or_create("file:///a.js");
        graph.invalidate("file:///a.js");

        let mut cooked = snapshot.clone();
        cooked.content = Some(Content::from("stale"));
        assert!(!graph.commit_if_current(cooked, snapshot.generation));
        assert!(graph.get("file:///a.js").unwrap().content.is_none());

        let fresh = graph.get("file:///a.js").unwrap();
        let generation = fresh.generation;
        let mut cooked = fresh;
        cooked.content = Some(Content::from("fresh"));
        assert!(graph.commit_if_current(cooked, generation));
        assert_eq!(graph.get("file:///a.js").unwrap().text(), Some("fresh"));
    }

    #[test]
    fn test_invalidate_keeps_inline_source() {
        let graph = UrlGraph::new();
        let url = "file:///p/main.html@L3C5-script.js";
        graph.get_or_create(url);
        graph
            .update(url, |node| {
                node.is_inline = true;
                node.original_content = Some(Content::from("console.log(1)"));
                node.content = Some(Content::from("console.log(1);"));
            })
            .unwrap();
        graph.invalidate(url);
        let node = graph.get(url).unwrap();
        assert!(node.content.is_none());
        assert_eq!(node.original_text(), Some("console.log(1)"));
    }
}
