//! Graph walk with bounded concurrency.
//!
//! A worklist of URLs is drained by tasks on a [`JoinSet`]; a semaphore caps
//! how many cook at once and a visited set guarantees each URL is cooked at
//! most once per walk, cycles included. A failing node stops its own branch
//! only.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::fetch::FetchRequest;
use crate::kitchen::{CookOutcome, Kitchen};
use crate::{Error, Result};

pub const DEFAULT_CONCURRENCY: usize = 16;

#[derive(Debug, Default)]
pub struct WalkReport {
    /// Cooked URLs, sorted.
    pub cooked: Vec<String>,
    /// Node failures and unresolved references, in completion order.
    pub errors: Vec<Error>,
    pub from_cache: usize,
}

impl WalkReport {
    /// Fail with every collected error.
    pub fn into_result(self) -> Result<Vec<String>> {
        match Error::from_many(self.errors) {
            Some(error) => Err(error),
            None => Ok(self.cooked),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Walker {
    kitchen: Kitchen,
    concurrency: usize,
}

impl Walker {
    pub fn new(kitchen: Kitchen, concurrency: usize) -> Self {
        Self {
            kitchen,
            concurrency: concurrency.max(1),
        }
    }

    /// Walk everything reachable from the graph's entry points.
    pub async fn walk_entry_points(&self) -> WalkReport {
        let roots = self
            .kitchen
            .graph()
            .entry_points()
            .into_iter()
            .map(|url| (url, FetchRequest::default()))
            .collect();
        self.walk(roots).await
    }

    pub async fn walk(&self, roots: Vec<(String, FetchRequest)>) -> WalkReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<(String, FetchRequest)> = roots.into();
        let mut tasks: JoinSet<(String, Result<CookOutcome>)> = JoinSet::new();
        let mut report = WalkReport::default();

        loop {
            while let Some((url, request)) = queue.pop_front() {
                if !visited.insert(url.clone()) {
                    continue;
                }
                let kitchen = self.kitchen.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            let error = Error::InvalidState {
                                expected: "open walk",
                                found: "closed semaphore",
                            };
                            return (url, Err(error));
                        }
                    };
                    let outcome = kitchen.cook(&url, &request).await;
                    (url, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((url, Ok(outcome))) => {
                    if outcome.from_cache {
                        report.from_cache += 1;
                    }
                    report.cooked.push(url);
                    report.errors.extend(outcome.errors);
                    queue.extend(
                        outcome
                            .dependencies
                            .into_iter()
                            .filter(|dependency| !visited.contains(&dependency.url))
                            .map(|dependency| {
                                let request = dependency.request();
                                (dependency.url, request)
                            }),
                    );
                }
                Ok((url, Err(error))) => {
                    tracing::debug!(%url, %error, "branch failed");
                    report.errors.push(error);
                }
                Err(join_error) => {
                    report
                        .errors
                        .push(Error::plugin("walker", format!("cook task aborted: {join_error}")));
                }
            }
        }

        report.cooked.sort();
        tracing::info!(
            cooked = report.cooked.len(),
            cached = report.from_cache,
            errors = report.errors.len(),
            "graph walk complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kitchen::KitchenConfig;
    use crate::scenario::Scenario;
    use jsenv_graph::runtime::test_utils::TestRuntime;
    use jsenv_graph::url::Url;

    fn walker(runtime: TestRuntime, concurrency: usize) -> Walker {
        let config = KitchenConfig::new(
            Scenario::Prod,
            Url::parse("file:///p/").unwrap(),
            Arc::new(runtime),
        )
        .with_node_esm_resolution(false);
        Walker::new(Kitchen::new(config).unwrap(), concurrency)
    }

    #[tokio::test]
    async fn test_walks_html_to_leaves() {
        let runtime = TestRuntime::new("/p")
            .with_file("/p/main.html", "<script type=\"module\" src=\"./main.js\"></script>")
            .with_file("/p/main.js", "import { answer } from './file.js';\nexport { answer };")
            .with_file("/p/file.js", "export const answer = 42;");
        let walker = walker(runtime, 4);
        walker.kitchen.add_entry_point("main.html").unwrap();
        let cooked = walker.walk_entry_points().await.into_result().unwrap();
        assert_eq!(
            cooked,
            vec!["file:///p/file.js", "file:///p/main.html", "file:///p/main.js"]
        );
    }

    #[tokio::test]
    async fn test_cycles_terminate_with_single_worker() {
        let runtime = TestRuntime::new("/p")
            .with_file("/p/a.js", "import './b.js'; export const a = 1;")
            .with_file("/p/b.js", "import './a.js'; export const b = 2;");
        let walker = walker(runtime, 1);
        walker.kitchen.add_entry_point("a.js").unwrap();
        let report = walker.walk_entry_points().await;
        assert!(report.errors.is_empty());
        assert_eq!(report.cooked.len(), 2);
        for url in ["file:///p/a.js", "file:///p/b.js"] {
            let node = walker.kitchen.graph().get(url).unwrap();
            assert!(node.cooked);
            assert!(!node.content.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_failing_branch_does_not_stop_siblings() {
        let runtime = TestRuntime::new("/p")
            .with_file(
                "/p/main.js",
                "import './missing.js';\nimport './broken.js';\nimport './ok.js';\nimport 'bare';",
            )
            .with_file("/p/broken.js", "export const = ;")
            .with_file("/p/ok.js", "import './leaf.js';")
            .with_file("/p/leaf.js", "export {};");
        let walker = walker(runtime, 2);
        walker.kitchen.add_entry_point("main.js").unwrap();
        let report = walker.walk_entry_points().await;
        assert!(report.cooked.contains(&"file:///p/leaf.js".to_string()));
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors.iter().any(|e| matches!(e, Error::Parse(_))));
        assert!(report.errors.iter().any(|e| matches!(e, Error::ResourceNotFound { .. })));
        assert!(report.errors.iter().any(|e| matches!(e, Error::UrlResolution { .. })));
        assert!(matches!(report.into_result(), Err(Error::Multiple(errors)) if errors.len() == 3));
    }
}
