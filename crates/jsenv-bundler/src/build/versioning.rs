//! Content versions.
//!
//! A file's version hashes its final bytes, which include the versions of
//! the files it references. Files are hashed dependencies first, one
//! strongly connected component at a time. Inside a cycle the members'
//! placeholders are replaced by [`NEUTRAL_VERSION`] before hashing and
//! every member's version also covers the hashes of the whole cycle, so a
//! change anywhere in the cycle changes all of its members.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

use super::finalize::Draft;
use super::placeholder::{NEUTRAL_VERSION, PLACEHOLDER_LEN, PlaceholderTable};
use jsenv_graph::Content;

/// Version of each versioned draft, by URL.
pub(crate) fn compute_versions(
    drafts: &[Draft],
    placeholders: &PlaceholderTable,
) -> BTreeMap<String, String> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut index_of: FxHashMap<&str, NodeIndex> = FxHashMap::default();
    for (position, draft) in drafts.iter().enumerate() {
        index_of.insert(draft.url.as_str(), graph.add_node(position));
    }
    for draft in drafts {
        let Content::Text(text) = &draft.content else {
            continue;
        };
        let from = index_of[draft.url.as_str()];
        let mut seen = FxHashSet::default();
        for owner in placeholders.owners_in(text) {
            if owner == draft.url || !seen.insert(owner) {
                continue;
            }
            if let Some(&to) = index_of.get(owner) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut versions: BTreeMap<String, String> = BTreeMap::new();
    for component in tarjan_scc(&graph) {
        let mut members: Vec<&Draft> = component.iter().map(|index| &drafts[graph[*index]]).collect();
        members.sort_by(|a, b| a.url.cmp(&b.url));
        let member_urls: FxHashSet<&str> = members.iter().map(|draft| draft.url.as_str()).collect();

        let hashes: Vec<blake3::Hash> = members
            .iter()
            .map(|draft| {
                let bytes = match &draft.content {
                    Content::Text(text) => placeholders
                        .replace_all(text, |owner| {
                            if member_urls.contains(owner) {
                                Some(NEUTRAL_VERSION.to_string())
                            } else {
                                versions.get(owner).cloned()
                            }
                        })
                        .into_bytes(),
                    Content::Binary(bytes) => bytes.clone(),
                };
                blake3::hash(&bytes)
            })
            .collect();

        if members.len() == 1 {
            if members[0].versioned {
                versions.insert(members[0].url.clone(), short(&hashes[0]));
            }
            continue;
        }

        let mut sorted: Vec<&blake3::Hash> = hashes.iter().collect();
        sorted.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        let mut cycle = blake3::Hasher::new();
        for hash in sorted {
            cycle.update(hash.as_bytes());
        }
        let cycle = cycle.finalize();
        tracing::debug!(members = members.len(), "versioning a reference cycle");
        for (draft, hash) in members.iter().zip(&hashes) {
            if !draft.versioned {
                continue;
            }
            let mut hasher = blake3::Hasher::new();
            hasher.update(hash.as_bytes());
            hasher.update(cycle.as_bytes());
            versions.insert(draft.url.clone(), short(&hasher.finalize()));
        }
    }
    versions
}

fn short(hash: &blake3::Hash) -> String {
    hash.to_hex()[..PLACEHOLDER_LEN].to_string()
}

/// Replace every known placeholder in `text` by its owner's version.
/// Placeholders of unversioned owners are left in place.
pub(crate) fn substitute(
    text: &str,
    placeholders: &PlaceholderTable,
    versions: &BTreeMap<String, String>,
) -> String {
    placeholders.replace_all(text, |owner| versions.get(owner).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(url: &str, text: impl Into<String>) -> Draft {
        Draft {
            url: url.to_string(),
            path: url.rsplit('/').next().unwrap_or(url).to_string(),
            content: Content::Text(text.into()),
            versioned: true,
            sourcemap: None,
        }
    }

    fn table(urls: &[&str]) -> PlaceholderTable {
        let mut table = PlaceholderTable::new();
        for url in urls {
            table.allocate(url).unwrap();
        }
        table
    }

    const A: &str = "file:///p/a.js";
    const B: &str = "file:///p/b.js";
    const C: &str = "file:///p/c.js";

    #[test]
    fn test_versions_follow_dependencies() {
        let table = table(&[A, B, C]);
        let b_token = table.token_of(B).unwrap().to_string();
        let build = |b_text: &str| {
            compute_versions(
                &[
                    draft(A, format!("import './b_{b_token}.js';")),
                    draft(B, b_text),
                    draft(C, "export const c = 1;"),
                ],
                &table,
            )
        };
        let first = build("export const b = 1;");
        let second = build("export const b = 2;");
        assert_eq!(first.len(), 3);
        assert!(first.values().all(|version| version.len() == PLACEHOLDER_LEN));
        assert_ne!(first[A], second[A]);
        assert_ne!(first[B], second[B]);
        assert_eq!(first[C], second[C]);
        assert_eq!(first, build("export const b = 1;"));
    }

    #[test]
    fn test_cycle_members_change_together() {
        let table = table(&[A, B]);
        let a_token = table.token_of(A).unwrap().to_string();
        let b_token = table.token_of(B).unwrap().to_string();
        let build = |a_body: &str| {
            compute_versions(
                &[
                    draft(A, format!("import './b_{b_token}.js'; {a_body}")),
                    draft(B, format!("import './a_{a_token}.js';")),
                ],
                &table,
            )
        };
        let first = build("1");
        let second = build("2");
        assert_ne!(first[A], first[B]);
        assert_ne!(first[A], second[A]);
        assert_ne!(first[B], second[B]);
        assert_eq!(first, build("1"));
    }

    #[test]
    fn test_unversioned_drafts_get_no_version() {
        let table = table(&[A]);
        let a_token = table.token_of(A).unwrap().to_string();
        let mut html = draft("file:///p/index.html", format!("<script src=\"a_{a_token}.js\"></script>"));
        html.versioned = false;
        let versions = compute_versions(&[html.clone(), draft(A, "export {};")], &table);
        assert!(!versions.contains_key("file:///p/index.html"));

        let text = substitute(html.content.as_text().unwrap(), &table, &versions);
        assert_eq!(text, format!("<script src=\"a_{}.js\"></script>", versions[A]));
    }
}
