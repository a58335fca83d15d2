//! Build-side Runtime implementation
//!
//! `JsenvRuntime` layers in-memory files over another [`Runtime`]. Reads
//! check the virtual files first and fall back to the inner runtime; writes
//! always go to the inner runtime. The build uses it to expose sub-build
//! output to the parent build at the paths it will be written to, before
//! anything touches the disk.

use async_trait::async_trait;
use jsenv_graph::runtime::{FileMetadata, Runtime, RuntimeResult};
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct JsenvRuntime {
    inner: Arc<dyn Runtime>,
    virtual_files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
}

impl JsenvRuntime {
    pub fn new(inner: Arc<dyn Runtime>) -> Self {
        Self {
            inner,
            virtual_files: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    /// Add a virtual file. The path is normalized before storage.
    pub fn add_virtual_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let normalized = self.normalize(path.as_ref());
        self.virtual_files.write().insert(normalized, content.into());
    }

    pub fn has_virtual_file(&self, path: &Path) -> bool {
        self.virtual_files.read().contains_key(&self.normalize(path))
    }

    pub fn virtual_file_count(&self) -> usize {
        self.virtual_files.read().len()
    }

    /// Relative paths resolve against the inner runtime's cwd.
    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.clean();
        }
        match self.inner.get_cwd() {
            Ok(cwd) => cwd.join(path).clean(),
            Err(_) => path.clean(),
        }
    }

    fn virtual_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.virtual_files.read().get(&self.normalize(path)).cloned()
    }
}

#[async_trait]
impl Runtime for JsenvRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        if let Some(content) = self.virtual_file(path) {
            return Ok(content);
        }
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.inner.write_file(path, content).await
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        if let Some(content) = self.virtual_file(path) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: None,
            });
        }
        self.inner.metadata(path).await
    }

    fn exists(&self, path: &Path) -> bool {
        self.has_virtual_file(path) || self.inner.exists(path)
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        self.inner.create_dir(path, recursive).await
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        if self
            .virtual_files
            .write()
            .remove(&self.normalize(path))
            .is_some()
        {
            return Ok(());
        }
        self.inner.remove_file(path).await
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let directory = self.normalize(path);
        let mut entries = match self.inner.read_dir(path).await {
            Ok(entries) => entries,
            Err(error) if error.is_not_found() => Vec::new(),
            Err(error) => return Err(error),
        };
        for virtual_path in self.virtual_files.read().keys() {
            if virtual_path.parent() != Some(directory.as_path()) {
                continue;
            }
            if let Some(name) = virtual_path.file_name().and_then(|n| n.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        self.inner.get_cwd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsenv_graph::runtime::test_utils::TestRuntime;

    fn runtime() -> JsenvRuntime {
        let inner = TestRuntime::new("/project").with_file("/project/disk.js", "disk");
        JsenvRuntime::new(Arc::new(inner))
    }

    #[tokio::test]
    async fn test_virtual_file_is_read_first() {
        let runtime = runtime();
        runtime.add_virtual_file("/project/disk.js", "virtual");
        let content = runtime.read_file(Path::new("/project/disk.js")).await.unwrap();
        assert_eq!(content, b"virtual");
    }

    #[tokio::test]
    async fn test_falls_back_to_inner() {
        let runtime = runtime();
        let content = runtime.read_file(Path::new("/project/disk.js")).await.unwrap();
        assert_eq!(content, b"disk");
        let missing = runtime.read_file(Path::new("/project/missing.js")).await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_relative_paths_use_inner_cwd() {
        let runtime = runtime();
        runtime.add_virtual_file("dist/sw/sw.js", "self.x = 1;");
        assert!(runtime.exists(Path::new("/project/dist/sw/sw.js")));
        let metadata = runtime
            .metadata(Path::new("/project/dist/sw/./sw.js"))
            .await
            .unwrap();
        assert_eq!(metadata.size, 11);
    }

    #[tokio::test]
    async fn test_read_dir_merges_virtual_entries() {
        let runtime = runtime();
        runtime.add_virtual_file("/project/virtual.js", "v");
        let entries = runtime.read_dir(Path::new("/project")).await.unwrap();
        assert_eq!(entries, vec!["disk.js", "virtual.js"]);
    }
}
