//! URL helpers shared by the graph, the resolver and the build stages.
//!
//! Every node in the graph is keyed by an absolute URL string. These helpers
//! keep that key canonical (no fragment), convert between `file:` URLs and
//! filesystem paths, and compute the relative forms the build writes into
//! rewritten content.

use std::path::{Path, PathBuf};

pub use url::Url;

/// Broad classification of a URL by scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    /// `file:` URL backed by the local filesystem
    File,
    /// `http:` or `https:` URL
    Http,
    /// `data:` URL carrying its own content
    Data,
    /// Any other scheme (`blob:`, `javascript:`, custom virtual schemes)
    Other,
}

impl UrlKind {
    /// Classify an already-parsed URL.
    pub fn of(url: &Url) -> Self {
        match url.scheme() {
            "file" => UrlKind::File,
            "http" | "https" => UrlKind::Http,
            "data" => UrlKind::Data,
            _ => UrlKind::Other,
        }
    }

    /// Classify a URL string. Unparseable strings are reported as `Other`.
    pub fn of_str(url: &str) -> Self {
        Url::parse(url).map(|u| Self::of(&u)).unwrap_or(UrlKind::Other)
    }
}

/// Error converting between paths and URLs.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("path is not absolute: {0}")]
    RelativePath(PathBuf),

    #[error("URL is not a file URL: {0}")]
    NotFileUrl(String),

    #[error("invalid URL '{url}': {reason}")]
    Invalid { url: String, reason: String },
}

/// Parse a string into a canonical URL.
pub fn parse_url(url: &str) -> Result<Url, UrlError> {
    Url::parse(url)
        .map(|u| canonicalize(&u))
        .map_err(|e| UrlError::Invalid {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Drop the fragment. Two URLs that differ only by `#hash` address the same node.
pub fn canonicalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Resolve `specifier` against `base` the way a browser would.
pub fn resolve_url(specifier: &str, base: &Url) -> Option<Url> {
    base.join(specifier).ok().map(|u| canonicalize(&u))
}

/// Whether `specifier` is neither relative, root-relative nor an absolute URL.
///
/// ```
/// use jsenv_graph::url::is_bare_specifier;
///
/// assert!(is_bare_specifier("preact"));
/// assert!(is_bare_specifier("@scope/pkg/file.js"));
/// assert!(!is_bare_specifier("./file.js"));
/// assert!(!is_bare_specifier("/file.js"));
/// assert!(!is_bare_specifier("https://cdn.example.com/lib.js"));
/// ```
pub fn is_bare_specifier(specifier: &str) -> bool {
    if specifier.is_empty() {
        return false;
    }
    if specifier.starts_with('/') || specifier.starts_with("./") || specifier.starts_with("../") {
        return false;
    }
    if specifier == "." || specifier == ".." {
        return false;
    }
    Url::parse(specifier).is_err()
}

/// Convert an absolute filesystem path into a `file:` URL.
pub fn path_to_file_url(path: &Path) -> Result<Url, UrlError> {
    Url::from_file_path(path).map_err(|_| UrlError::RelativePath(path.to_path_buf()))
}

/// Convert an absolute directory path into a `file:` URL with a trailing slash.
pub fn directory_to_url(path: &Path) -> Result<Url, UrlError> {
    Url::from_directory_path(path).map_err(|_| UrlError::RelativePath(path.to_path_buf()))
}

/// Convert a `file:` URL back into a filesystem path.
pub fn file_url_to_path(url: &Url) -> Result<PathBuf, UrlError> {
    if url.scheme() != "file" {
        return Err(UrlError::NotFileUrl(url.to_string()));
    }
    url.to_file_path()
        .map_err(|_| UrlError::NotFileUrl(url.to_string()))
}

/// Whether `url` lives under the directory URL `directory`.
pub fn url_is_inside_of(url: &Url, directory: &Url) -> bool {
    let dir = directory.as_str();
    let dir_prefix = if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    };
    url.as_str().starts_with(&dir_prefix)
}

/// Path of `url` relative to `directory` (query kept, no leading `./`).
///
/// Returns `None` when `url` is not inside `directory`.
pub fn url_to_relative(url: &Url, directory: &Url) -> Option<String> {
    if !url_is_inside_of(url, directory) {
        return None;
    }
    let dir = directory.as_str();
    let skip = if dir.ends_with('/') {
        dir.len()
    } else {
        dir.len() + 1
    };
    Some(url.as_str()[skip..].to_string())
}

/// Relative URL leading from the resource at `from` to `to`.
///
/// Falls back to the absolute form of `to` when both URLs do not share an
/// origin.
pub fn relative_url(from: &Url, to: &Url) -> String {
    if from.scheme() != to.scheme()
        || from.host_str() != to.host_str()
        || from.port() != to.port()
    {
        return to.to_string();
    }
    match from.make_relative(to) {
        Some(relative) if relative.is_empty() => url_filename(to),
        Some(relative) => relative,
        None => to.to_string(),
    }
}

/// Last path segment of the URL (`"main.js"` for `file:///p/main.js?v=1`).
pub fn url_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .unwrap_or_default()
}

/// Lowercased extension of the last path segment, without the dot.
pub fn url_extension(url: &Url) -> Option<String> {
    extension_of(&url_filename(url))
}

/// Lowercased extension of a file name or relative path.
pub fn extension_of(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let filename = name.rsplit('/').next().unwrap_or(name);
    let dot = filename.rfind('.')?;
    if dot == 0 || dot + 1 == filename.len() {
        return None;
    }
    Some(filename[dot + 1..].to_ascii_lowercase())
}

/// Filename without its extension.
pub fn url_basename(url: &Url) -> String {
    let filename = url_filename(url);
    match filename.rfind('.') {
        Some(dot) if dot > 0 => filename[..dot].to_string(),
        _ => filename,
    }
}

/// Replace (or add) the extension of the URL's last path segment.
pub fn set_url_extension(url: &Url, extension: &str) -> Url {
    let mut result = url.clone();
    let basename = url_basename(url);
    let filename = if extension.is_empty() {
        basename
    } else {
        format!("{basename}.{extension}")
    };
    if let Ok(mut segments) = result.path_segments_mut() {
        segments.pop().push(&filename);
    }
    result
}

/// Insert `_<version>` before the extension of a build-relative path.
///
/// ```
/// use jsenv_graph::url::inject_version_in_filename;
///
/// assert_eq!(inject_version_in_filename("js/main.js", "a1b2c3d4"), "js/main_a1b2c3d4.js");
/// assert_eq!(inject_version_in_filename("LICENSE", "a1b2c3d4"), "LICENSE_a1b2c3d4");
/// assert_eq!(inject_version_in_filename("a.b/c.css?x", "00000000"), "a.b/c_00000000.css?x");
/// ```
pub fn inject_version_in_filename(relative: &str, version: &str) -> String {
    let (path, query) = match relative.find('?') {
        Some(index) => relative.split_at(index),
        None => (relative, ""),
    };
    let (dir, filename) = match path.rfind('/') {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    };
    let versioned = match filename.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &filename[..dot], version, &filename[dot..]),
        _ => format!("{filename}_{version}"),
    };
    format!("{dir}{versioned}{query}")
}

/// Synthetic URL for content embedded in a parent (`<script>` body, `<style>`).
///
/// The URL encodes the parent URL and the 1-based line/column of the inline
/// content so it stays stable across rebuilds of an unchanged parent.
pub fn inline_url(parent: &Url, line: u32, column: u32, kind: &str, extension: &str) -> Url {
    let mut base = parent.clone();
    base.set_query(None);
    base.set_fragment(None);
    let raw = format!("{base}@L{line}C{column}-{kind}.{extension}");
    Url::parse(&raw).unwrap_or(base)
}

/// Compute the 1-based line and column of a byte offset.
pub fn line_column_at(content: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut line_start = 0usize;
    for (index, byte) in content.as_bytes()[..offset].iter().enumerate() {
        if *byte == b'\n' {
            line += 1;
            line_start = index + 1;
        }
    }
    let column = content[line_start..offset].chars().count() as u32 + 1;
    (line, column)
}
