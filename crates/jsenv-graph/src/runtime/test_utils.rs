//! In-memory runtime for tests.
//!
//! Files live in a map keyed by absolute path. Modification times are a
//! logical clock bumped on every write, so tests can observe "the file
//! changed" without sleeping.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: u64,
}

/// In-memory `Runtime`.
///
/// ```rust
/// use jsenv_graph::runtime::test_utils::TestRuntime;
///
/// let runtime = TestRuntime::new("/project")
///     .with_file("/project/main.js", "export const answer = 42;");
/// assert_eq!(runtime.file_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TestRuntime {
    cwd: PathBuf,
    files: Arc<RwLock<FxHashMap<PathBuf, MemoryFile>>>,
    clock: Arc<AtomicU64>,
}

impl TestRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            files: Arc::default(),
            clock: Arc::new(AtomicU64::new(1_700_000_000_000)),
        }
    }

    /// Builder-style file insertion.
    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.set_file(path, content);
        self
    }

    /// Insert or replace a file, advancing its modification time.
    pub fn set_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let modified = self.clock.fetch_add(1_000, Ordering::SeqCst);
        self.files.write().insert(
            self.absolute(path.as_ref()),
            MemoryFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Content of a file written through the runtime, if any.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .read()
            .get(&self.absolute(path.as_ref()))
            .map(|file| file.content.clone())
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

#[async_trait]
impl Runtime for TestRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.file(path)
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.set_file(path, content.to_vec());
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let absolute = self.absolute(path);
        let files = self.files.read();
        if let Some(file) = files.get(&absolute) {
            return Ok(FileMetadata {
                size: file.content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: Some(file.modified),
            });
        }
        if files.keys().any(|key| key.starts_with(&absolute)) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let absolute = self.absolute(path);
        self.files.read().keys().any(|key| key.starts_with(&absolute))
    }

    async fn create_dir(&self, _path: &Path, _recursive: bool) -> RuntimeResult<()> {
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        self.files
            .write()
            .remove(&self.absolute(path))
            .map(|_| ())
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let absolute = self.absolute(path);
        let mut names: Vec<String> = self
            .files
            .read()
            .keys()
            .filter_map(|key| key.strip_prefix(&absolute).ok())
            .filter_map(|rest| rest.components().next())
            .filter_map(|component| component.as_os_str().to_str().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_bumps_modified_time() {
        let runtime = TestRuntime::new("/p").with_file("/p/a.js", "1");
        let first = runtime.metadata(Path::new("/p/a.js")).await.unwrap();
        runtime.set_file("/p/a.js", "2");
        let second = runtime.metadata(Path::new("/p/a.js")).await.unwrap();
        assert!(second.modified > first.modified);
    }

    #[tokio::test]
    async fn test_relative_paths_use_cwd() {
        let runtime = TestRuntime::new("/p").with_file("src/a.js", "x");
        assert_eq!(
            runtime.read_file(Path::new("/p/src/a.js")).await.unwrap(),
            b"x"
        );
        assert!(runtime.exists(Path::new("/p/src")));
        assert_eq!(
            runtime.read_dir(Path::new("/p")).await.unwrap(),
            vec!["src"]
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let runtime = TestRuntime::new("/p");
        assert!(runtime
            .read_file(Path::new("/p/nope.js"))
            .await
            .unwrap_err()
            .is_not_found());
    }
}
