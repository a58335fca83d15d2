//! Content type detection from file extensions.

use crate::url::{Url, url_extension};
use crate::url_info::UrlType;

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Map a file extension (without dot) to a MIME type.
pub fn from_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "js" | "mjs" | "cjs" | "jsx" => "text/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "importmap" => "application/importmap+json",
        "webmanifest" => "application/manifest+json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Content type of a URL based on its extension.
pub fn from_url(url: &Url) -> &'static str {
    url_extension(url)
        .map(|ext| from_extension(&ext))
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Strip parameters such as `; charset=utf-8`.
pub fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

/// Whether content of this type should be handled as UTF-8 text.
pub fn is_text(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence.starts_with("text/")
        || essence == "image/svg+xml"
        || essence == "application/xml"
        || essence == "application/javascript"
        || is_json(essence)
}

/// JSON or a `+json` structured syntax suffix.
pub fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

/// Internal node type implied by a content type.
///
/// JavaScript defaults to `js_module`; references that expect a classic
/// script override this through their expected type.
pub fn url_type_for(content_type: &str) -> UrlType {
    match essence(content_type) {
        "text/html" => UrlType::Html,
        "text/css" => UrlType::Css,
        "text/javascript" | "application/javascript" => UrlType::JsModule,
        "application/manifest+json" => UrlType::Webmanifest,
        "application/importmap+json" => UrlType::Json,
        other if is_json(other) => UrlType::Json,
        _ => UrlType::Asset,
    }
}

/// Canonical extension for a content type, used when a URL has none.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    Some(match essence(content_type) {
        "text/html" => "html",
        "text/css" => "css",
        "text/javascript" | "application/javascript" => "js",
        "application/json" => "json",
        "application/manifest+json" => "webmanifest",
        "image/svg+xml" => "svg",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "text/plain" => "txt",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(from_extension("html"), "text/html");
        assert_eq!(from_extension("MJS"), "text/javascript");
        assert_eq!(from_extension("css"), "text/css");
        assert_eq!(from_extension("unknown"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_is_text() {
        assert!(is_text("text/css; charset=utf-8"));
        assert!(is_text("application/manifest+json"));
        assert!(is_text("image/svg+xml"));
        assert!(!is_text("image/png"));
    }

    #[test]
    fn test_url_type_for() {
        assert_eq!(url_type_for("text/html"), UrlType::Html);
        assert_eq!(url_type_for("text/javascript"), UrlType::JsModule);
        assert_eq!(url_type_for("application/json"), UrlType::Json);
        assert_eq!(url_type_for("image/png"), UrlType::Asset);
    }

    #[test]
    fn test_from_url() {
        let url = Url::parse("file:///p/logo.svg?v=1").unwrap();
        assert_eq!(from_url(&url), "image/svg+xml");
    }
}
