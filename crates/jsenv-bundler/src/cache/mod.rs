//! Filesystem compile cache.
//!
//! Stores the output of the transform pipeline per URL so unchanged sources
//! skip their transforms on the next run. Entries are JSON files named by
//! their [`CacheKey`] inside the cache directory.
//!
//! # Freshness
//!
//! An entry records the state (hash, mtime) of every source it was compiled
//! from. A read returns the entry only when every source still matches;
//! otherwise it is a miss and the next write replaces it.
//!
//! # Corruption
//!
//! An entry that cannot be parsed or is internally inconsistent is reported
//! as [`Error::CacheCorruption`]. Callers remove it and compile from source.

#![allow(clippy::disallowed_methods)]

mod entry;
mod key;

pub use entry::{CacheEntry, SourceState};
pub use key::{CACHE_FORMAT_VERSION, CacheKey, CompilerOptions, compute_cache_key};

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Configuration for the compile cache.
///
/// The embedder controls where cache files are stored. Keys are
/// content-addressed, so stale entries are never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one JSON file per entry.
    pub dir: PathBuf,

    /// Bypass reads; entries are still written.
    pub force_rebuild: bool,
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            force_rebuild: false,
        }
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Check if force rebuild is requested via environment variable.
    pub fn should_force_rebuild(&self) -> bool {
        self.force_rebuild || std::env::var_os("JSENV_FORCE_REBUILD").is_some()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(".cache/jsenv")
    }
}

#[derive(Debug, Clone)]
pub struct CompileCache {
    config: CacheConfig,
}

impl CompileCache {
    /// Open the cache, creating its directory if needed.
    pub fn open(config: CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir)?;
        Ok(Self { config })
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.config.dir.join(format!("{}.json", key.as_hex()))
    }

    /// Look up the entry for `key` and check it against the current state
    /// of its primary source (`url` with `content`, modified at `mtime`).
    ///
    /// Secondary sources are re-read from disk. Returns `Ok(None)` on a miss
    /// or when any source changed.
    pub fn read(
        &self,
        key: &CacheKey,
        url: &str,
        content: &[u8],
        mtime: Option<u64>,
    ) -> Result<Option<CacheEntry>> {
        if self.config.should_force_rebuild() {
            return Ok(None);
        }
        let path = self.entry_path(key);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&json).map_err(|e| Error::CacheCorruption {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        entry
            .validate()
            .map_err(|reason| Error::CacheCorruption {
                path: path.clone(),
                reason,
            })?;

        let Some(primary) = entry.source(url) else {
            return Err(Error::CacheCorruption {
                path,
                reason: format!("entry does not list {url} among its sources"),
            });
        };
        if !primary.matches(content, mtime) {
            tracing::debug!(url, "cache entry is stale");
            return Ok(None);
        }
        for source in entry.sources.iter().filter(|source| source.url != url) {
            if !secondary_source_matches(source) {
                tracing::debug!(url, source = %source.url, "cache entry dependency changed");
                return Ok(None);
            }
        }
        tracing::debug!(url, key = %key, "cache hit");
        Ok(Some(entry))
    }

    /// Store `entry` under `key`. The file is written to a temporary file in
    /// the cache directory first, then renamed over the entry.
    pub fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_vec(entry).map_err(|e| Error::CacheCorruption {
            path: self.entry_path(key),
            reason: e.to_string(),
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.config.dir)?;
        temp.write_all(&json)?;
        temp.persist(self.entry_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove the entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) -> Result<()> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

fn secondary_source_matches(source: &SourceState) -> bool {
    let Ok(url) = jsenv_graph::url::Url::parse(&source.url) else {
        return false;
    };
    let Ok(path) = jsenv_graph::url::file_url_to_path(&url) else {
        return false;
    };
    match std::fs::read(&path) {
        Ok(bytes) => source.matches(&bytes, None),
        Err(_) => false,
    }
}
