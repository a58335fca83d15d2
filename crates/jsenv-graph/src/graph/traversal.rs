//! Traversal helpers. Each call tracks its own visited set, so cycles in the
//! graph never cause infinite recursion.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use super::store::UrlGraph;

impl UrlGraph {
    /// The node itself plus every node that transitively depends on it,
    /// sorted.
    pub fn dependents_closure(&self, url: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut queue = VecDeque::from([url.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = inner.nodes.get(&current) {
                for dependent in &node.dependents {
                    if !visited.contains(dependent) {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }

        let mut result: Vec<String> = visited
            .into_iter()
            .filter(|candidate| inner.nodes.contains_key(candidate))
            .collect();
        result.sort();
        result
    }

    /// Every node reachable from `roots` (roots included), in breadth-first
    /// discovery order.
    pub fn dependencies_closure(&self, roots: &[String]) -> Vec<String> {
        let inner = self.inner.read();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<String> = roots.iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(node) = inner.nodes.get(&current) else {
                continue;
            };
            order.push(current);
            for dependency in node.dependency_urls() {
                if !visited.contains(&dependency) {
                    queue.push_back(dependency);
                }
            }
        }
        order
    }

    /// Nodes reachable from the entry points, dependencies before dependents.
    ///
    /// Back edges of cycles are ignored, so a node inside a cycle may come
    /// before one of its dependencies. Sorting is deterministic.
    pub fn post_order(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut order = Vec::new();

        let mut roots: Vec<String> = inner.entry_points.iter().cloned().collect();
        roots.sort();

        for root in roots {
            // Iterative DFS: (url, expanded)
            let mut stack = vec![(root, false)];
            while let Some((url, expanded)) = stack.pop() {
                if expanded {
                    order.push(url);
                    continue;
                }
                if !visited.insert(url.clone()) {
                    continue;
                }
                stack.push((url.clone(), true));
                if let Some(node) = inner.nodes.get(&url) {
                    let mut dependencies: Vec<String> =
                        node.dependency_urls().into_iter().collect();
                    dependencies.sort();
                    for dependency in dependencies.into_iter().rev() {
                        if !visited.contains(&dependency) {
                            stack.push((dependency, false));
                        }
                    }
                }
            }
        }
        order
    }
}
