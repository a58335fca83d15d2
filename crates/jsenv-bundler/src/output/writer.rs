#![allow(clippy::disallowed_methods)]

//! Writing build files to disk.
//!
//! Every path is validated against the build directory before anything is
//! written, so a crafted build-relative path (`../`, absolute paths, null
//! bytes) cannot escape it. Files are written to temporary siblings first
//! and renamed into place once all of them are on disk; a failure removes
//! the temporary files and leaves the previous build untouched.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use jsenv_graph::Content;
use path_clean::PathClean;

use crate::{Error, Result};

const TEMP_SUFFIX: &str = ".jsenv-tmp";

/// Write build-relative `files` under `dir`, all or nothing.
///
/// # Errors
///
/// [`Error::InvalidOutputPath`] when a path escapes `dir`, and
/// [`Error::WriteFailure`] for I/O failures.
///
/// # Examples
///
/// ```no_run
/// use indexmap::IndexMap;
/// use jsenv_bundler::jsenv_graph::Content;
/// use jsenv_bundler::output::writer::write_build_files;
/// use std::path::Path;
///
/// # fn example() -> jsenv_bundler::Result<()> {
/// let mut files = IndexMap::new();
/// files.insert("main.html".to_string(), Content::from("<!doctype html>"));
/// write_build_files(&files, Path::new("dist"))?;
/// # Ok(())
/// # }
/// ```
pub fn write_build_files(files: &IndexMap<String, Content>, dir: &Path) -> Result<()> {
    let dir = validate_and_normalize_dir(dir)?;

    fs::create_dir_all(&dir).map_err(|e| write_failure("create", &dir, e))?;

    let operations = files
        .iter()
        .map(|(path, content)| Ok((validate_output_path(&dir, path)?, content.as_bytes())))
        .collect::<Result<Vec<_>>>()?;

    write_files_atomic(&operations)?;
    tracing::info!(dir = %dir.display(), files = operations.len(), "build files written");
    Ok(())
}

/// Absolute, cleaned form of `dir`.
fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::InvalidOutputPath(format!("no current directory: {e}")))?;
    Ok(cwd.join(&cleaned).clean())
}

/// Join a build-relative path onto `base_dir`, refusing anything that ends
/// up outside of it.
pub(crate) fn validate_output_path(base_dir: &Path, relative: &str) -> Result<PathBuf> {
    if relative.contains('\0') {
        return Err(Error::InvalidOutputPath(format!("{relative:?} contains a null byte")));
    }
    if cfg!(windows) && is_reserved_device_name(relative) {
        return Err(Error::InvalidOutputPath(format!(
            "{relative} is a reserved device name"
        )));
    }

    let full_path = base_dir.join(Path::new(relative).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "{relative} resolves to {}, outside of {}",
            full_path.display(),
            base_dir.display()
        )));
    }
    Ok(full_path)
}

/// `CON`, `nul.txt`, `lpt1.js`...
fn is_reserved_device_name(relative: &str) -> bool {
    const DEVICES: &[&str] = &["CON", "PRN", "AUX", "NUL"];
    let filename = relative.rsplit('/').next().unwrap_or(relative);
    let stem = filename.split('.').next().unwrap_or(filename).to_ascii_uppercase();
    if DEVICES.contains(&stem.as_str()) {
        return true;
    }
    match stem.strip_prefix("COM").or_else(|| stem.strip_prefix("LPT")) {
        Some(digit) => matches!(digit, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9"),
        None => false,
    }
}

fn write_failure(action: &str, path: &Path, error: std::io::Error) -> Error {
    Error::WriteFailure(format!("cannot {action} {}: {error}", path.display()))
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Two phases: write every temporary file, then rename them all.
fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files = Vec::new();

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                write_failure("create", parent, e)
            })?;
        }

        let temp_path = temp_path_for(target_path);
        fs::write(&temp_path, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            write_failure("write", &temp_path, e)
        })?;
        temp_files.push((temp_path, target_path.clone()));
    }

    for (temp_path, target_path) in &temp_files {
        fs::rename(temp_path, target_path).map_err(|e| {
            cleanup_temp_files(&temp_files);
            write_failure("move into place", target_path, e)
        })?;
    }
    Ok(())
}

/// Best effort: we are already failing.
fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(path = %temp_path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_path_normal() {
        let base = Path::new("/tmp/dist");
        let result = validate_output_path(base, "main.html");
        assert_eq!(result.unwrap(), Path::new("/tmp/dist/main.html"));
    }

    #[test]
    fn test_validate_output_path_nested() {
        let base = Path::new("/tmp/dist");
        let result = validate_output_path(base, "@remote/cdn.example.com/lib.js");
        assert_eq!(
            result.unwrap(),
            Path::new("/tmp/dist/@remote/cdn.example.com/lib.js")
        );
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/dist");
        assert!(matches!(
            validate_output_path(base, "../etc/passwd"),
            Err(Error::InvalidOutputPath(_))
        ));
        assert!(validate_output_path(base, "js/../../../../etc/passwd").is_err());
        assert!(validate_output_path(base, ".").is_err());
    }

    #[test]
    fn test_validate_output_path_null_byte() {
        let base = Path::new("/tmp/dist");
        assert!(validate_output_path(base, "file\0name.js").is_err());
    }

    #[test]
    fn test_validate_output_path_current_dir() {
        let base = Path::new("/tmp/dist");
        let result = validate_output_path(base, "./main.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/dist/main.js"));
    }

    #[test]
    fn test_reserved_device_names() {
        assert!(is_reserved_device_name("nul.txt"));
        assert!(is_reserved_device_name("js/COM3.js"));
        assert!(!is_reserved_device_name("console.js"));
        assert!(!is_reserved_device_name("com10.js"));
    }

    #[test]
    fn test_write_build_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = IndexMap::new();
        files.insert("main.js".to_string(), Content::from("export {};"));
        files.insert("main.css".to_string(), Content::from("body{}"));
        files.insert("img/logo.png".to_string(), Content::Binary(vec![137, 80, 78, 71]));
        write_build_files(&files, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("main.js")).unwrap(), "export {};");
        assert_eq!(fs::read_to_string(dir.path().join("main.css")).unwrap(), "body{}");
        assert_eq!(fs::read(dir.path().join("img/logo.png")).unwrap(), vec![137, 80, 78, 71]);
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(TEMP_SUFFIX)
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_escaping_path_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = IndexMap::new();
        files.insert("ok.js".to_string(), Content::from("1"));
        files.insert("../escape.js".to_string(), Content::from("2"));
        assert!(write_build_files(&files, dir.path()).is_err());
        assert!(!dir.path().join("ok.js").exists());
    }
}
