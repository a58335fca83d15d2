//! Native filesystem runtime.
//!
//! Blocking `std::fs` calls run on tokio's blocking pool so graph walks never
//! stall the async executor.

#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::task;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// `Runtime` backed by the operating system filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, action: &'static str, error: std::io::Error) -> RuntimeError {
    match error.kind() {
        std::io::ErrorKind::NotFound => RuntimeError::FileNotFound(path.to_path_buf()),
        _ => RuntimeError::Io {
            action,
            path: path.to_path_buf(),
            message: error.to_string(),
        },
    }
}

/// Run a blocking filesystem call off the async executor.
async fn blocking<T, F>(f: F) -> RuntimeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RuntimeResult<T> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::TaskFailed(e.to_string()))?
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();
        blocking(move || {
            std::fs::read(&path).map_err(|e| io_error(&path, "read", e))
        })
        .await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();
        blocking(move || {
            std::fs::write(&path, content).map_err(|e| io_error(&path, "write", e))
        })
        .await
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.to_path_buf();
        blocking(move || {
            let metadata =
                std::fs::metadata(&path).map_err(|e| io_error(&path, "stat", e))?;
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);
            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                modified,
            })
        })
        .await
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            let result = if recursive {
                std::fs::create_dir_all(&path)
            } else {
                std::fs::create_dir(&path)
            };
            result.map_err(|e| io_error(&path, "create directory", e))
        })
        .await
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            std::fs::remove_file(&path).map_err(|e| io_error(&path, "remove", e))
        })
        .await
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let path = path.to_path_buf();
        blocking(move || {
            let entries =
                std::fs::read_dir(&path).map_err(|e| io_error(&path, "read directory", e))?;
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| io_error(&path, "read directory", e))?;
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            names.sort();
            Ok(names)
        })
        .await
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        std::env::current_dir().map_err(|e| io_error(Path::new("."), "resolve", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_write_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        let runtime = NativeRuntime::new();

        runtime.write_file(&file_path, b"Hello, World!").await.unwrap();
        let content = runtime.read_file(&file_path).await.unwrap();
        assert_eq!(content, b"Hello, World!");

        let metadata = runtime.metadata(&file_path).await.unwrap();
        assert_eq!(metadata.size, 13);
        assert!(metadata.is_file);
        assert!(metadata.modified.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = NativeRuntime::new();
        let err = runtime
            .read_file(&temp_dir.path().join("missing.js"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_dir_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = NativeRuntime::new();
        runtime
            .write_file(&temp_dir.path().join("b.js"), b"")
            .await
            .unwrap();
        runtime
            .write_file(&temp_dir.path().join("a.js"), b"")
            .await
            .unwrap();
        let entries = runtime.read_dir(temp_dir.path()).await.unwrap();
        assert_eq!(entries, vec!["a.js", "b.js"]);
    }
}
