//! Per-build state.
//!
//! A [`BuildSession`] is created by each build invocation and dropped with
//! it. Placeholders and versions never outlive the run, so a parent build
//! and its sub-builds do not see each other's tables.

use std::collections::BTreeMap;

use super::placeholder::PlaceholderTable;
use crate::{Error, Result};

/// Steps of a build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    /// References may still resolve to new nodes.
    GraphOpen,
    /// Every reachable node is cooked.
    GraphClosed,
    Bundling,
    Versioning,
    Writing,
    Done,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::GraphOpen => "graph_open",
            BuildState::GraphClosed => "graph_closed",
            BuildState::Bundling => "bundling",
            BuildState::Versioning => "versioning",
            BuildState::Writing => "writing",
            BuildState::Done => "done",
        }
    }

    pub fn next(&self) -> Option<BuildState> {
        match self {
            BuildState::GraphOpen => Some(BuildState::GraphClosed),
            BuildState::GraphClosed => Some(BuildState::Bundling),
            BuildState::Bundling => Some(BuildState::Versioning),
            BuildState::Versioning => Some(BuildState::Writing),
            BuildState::Writing => Some(BuildState::Done),
            BuildState::Done => None,
        }
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct BuildSession {
    state: BuildState,
    placeholders: PlaceholderTable,
    versions: BTreeMap<String, String>,
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSession {
    pub fn new() -> Self {
        Self {
            state: BuildState::GraphOpen,
            placeholders: PlaceholderTable::new(),
            versions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Move to `to`, which must directly follow the current state.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] when a step is skipped or repeated.
    pub fn advance(&mut self, to: BuildState) -> Result<()> {
        if self.state.next() != Some(to) {
            return Err(Error::InvalidState {
                expected: self.state.next().map_or("nothing", |next| next.as_str()),
                found: to.as_str(),
            });
        }
        tracing::debug!(from = %self.state, to = %to, "build state");
        self.state = to;
        Ok(())
    }

    /// Fail unless the session is in `state`.
    pub fn ensure(&self, state: BuildState) -> Result<()> {
        if self.state != state {
            return Err(Error::InvalidState {
                expected: state.as_str(),
                found: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Placeholders are handed out while specifiers are rewritten, before
    /// any version is known.
    pub fn placeholders_mut(&mut self) -> Result<&mut PlaceholderTable> {
        self.ensure(BuildState::Versioning)?;
        Ok(&mut self.placeholders)
    }

    pub fn placeholders(&self) -> &PlaceholderTable {
        &self.placeholders
    }

    pub fn set_versions(&mut self, versions: BTreeMap<String, String>) -> Result<()> {
        self.ensure(BuildState::Versioning)?;
        self.versions = versions;
        Ok(())
    }

    pub fn version_of(&self, url: &str) -> Option<&str> {
        self.versions.get(url).map(String::as_str)
    }

    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.versions
    }
}
