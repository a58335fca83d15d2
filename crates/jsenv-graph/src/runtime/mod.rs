//! Filesystem abstraction.
//!
//! The pipeline never touches `std::fs` directly; it goes through a
//! [`Runtime`] so tests can run against an in-memory filesystem and so the
//! build can layer virtual files over disk.

mod native;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use native::NativeRuntime;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("no such file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Any other filesystem failure, with the path it happened on.
    #[error("cannot {action} {}: {message}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        message: String,
    },

    /// A blocking filesystem task panicked or was cancelled.
    #[error("filesystem task failed: {0}")]
    TaskFailed(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::FileNotFound(_))
    }
}

/// What the pipeline needs to know about a file.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Milliseconds since the Unix epoch. Feeds `Last-Modified` in dev and
    /// the mtime check of the compile cache.
    pub modified: Option<u64>,
}

/// Filesystem access for the kitchen, the cache and the build writer.
///
/// Paths are absolute; relative paths resolve against [`Runtime::get_cwd`].
/// A missing file must surface as [`RuntimeError::FileNotFound`] so the
/// fetch layer can turn it into a 404 instead of an I/O failure.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Entry names of a directory, sorted.
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;

    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
