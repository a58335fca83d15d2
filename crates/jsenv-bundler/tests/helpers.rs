//! Shared helpers for the build integration tests.

#![allow(dead_code)]

use jsenv_bundler::{BuildOptions, BuildResult};
use jsenv_graph::runtime::test_utils::TestRuntime;
use std::sync::Arc;

/// In-memory project rooted at `/p`.
pub fn project(files: &[(&str, &str)]) -> TestRuntime {
    files
        .iter()
        .fold(TestRuntime::new("/p"), |runtime, (path, content)| {
            runtime.with_file(format!("/p/{path}"), content.as_bytes().to_vec())
        })
}

/// Build options for `/p` into `/dist`, nothing written to disk.
pub fn options(runtime: &TestRuntime, entries: &[&str]) -> BuildOptions {
    BuildOptions::new("/p", "/dist")
        .entry_points(entries.iter().copied())
        .runtime(Arc::new(runtime.clone()))
        .node_esm_resolution(false)
        .write(false)
}

/// Text of a build file, failing with the list of files when it is missing.
pub fn text<'a>(result: &'a BuildResult, path: &str) -> &'a str {
    match result.text(path) {
        Some(text) => text,
        None => panic!(
            "no text file {path} in build, files: {:?}",
            result.build_file_contents.keys().collect::<Vec<_>>()
        ),
    }
}

/// Build path of a source, failing with the mappings when it is missing.
pub fn mapped<'a>(result: &'a BuildResult, source: &str) -> &'a str {
    match result.mapping(source) {
        Some(path) => path,
        None => panic!("no mapping for {source}, mappings: {:?}", result.build_mappings),
    }
}

/// `name_<8 hex>.ext`
pub fn is_versioned(path: &str, name: &str, extension: &str) -> bool {
    let Some(rest) = path.strip_prefix(&format!("{name}_")) else {
        return false;
    };
    let Some(version) = rest.strip_suffix(&format!(".{extension}")) else {
        return false;
    };
    version.len() == 8 && version.chars().all(|c| c.is_ascii_hexdigit())
}
