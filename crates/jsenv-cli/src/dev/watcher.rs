//! File system watcher with debouncing.
//!
//! Watches the project directory (and any extra directories) and filters
//! out ignored path segments, hidden files and changes repeated within the
//! debounce window.

use crate::error::{CliError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_kind(kind: &EventKind, path: PathBuf) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch `roots` recursively.
    ///
    /// # Errors
    ///
    /// [`CliError::FileNotFound`] for a missing root, [`CliError::Watch`]
    /// when the platform watcher fails.
    pub fn new(
        roots: Vec<PathBuf>,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(CliError::FileNotFound(missing.clone()));
        }

        let (tx, rx) = mpsc::channel(100);
        let debounce = Duration::from_millis(debounce_ms);
        let mut last_seen: HashMap<PathBuf, Instant> = HashMap::new();
        let filter_roots = roots.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watch error");
                    return;
                }
            };
            for path in &event.paths {
                if should_ignore(path, &filter_roots, &ignore_patterns) {
                    continue;
                }
                let now = Instant::now();
                if let Some(last) = last_seen.get(path) {
                    if now.duration_since(*last) < debounce {
                        continue;
                    }
                }
                last_seen.insert(path.clone(), now);

                let Some(change) = FileChange::from_kind(&event.kind, path.clone()) else {
                    continue;
                };
                // The receiver is gone once the dev loop stopped.
                let _ = tx.blocking_send(change);
            }
        })?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Whether a change under `roots` is irrelevant: outside every root, below
/// an ignored segment (`node_modules`), matching an extension pattern
/// (`*.log`) or hidden.
pub fn should_ignore(path: &Path, roots: &[PathBuf], ignore_patterns: &[String]) -> bool {
    let Some(relative) = roots.iter().find_map(|root| path.strip_prefix(root).ok()) else {
        return true;
    };

    let file_name = relative.to_string_lossy();
    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if file_name.ends_with(suffix) {
                return true;
            }
        }
    }

    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        ignore_patterns.iter().any(|pattern| *pattern == name)
            || (name.starts_with('.') && name != "." && name != "..")
    })
}
