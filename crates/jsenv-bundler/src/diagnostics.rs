//! Parse error reporting.
//!
//! A parse error is located in the content that failed to parse, which may
//! already be the output of earlier transforms. The location is remapped
//! through the node's accumulated sourcemap so users see the position in the
//! file they wrote.

use jsenv_graph::SourceMap;
use jsenv_graph::sourcemap::{self, OriginalPosition};
use jsenv_graph::url::line_column_at;
use miette::{Diagnostic, LabeledSpan, Severity, SourceCode};
use serde::Serialize;

/// Lines shown before and after the failing line in a code frame.
const FRAME_CONTEXT: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ParseError {
    pub url: String,
    /// 1-based line in the content that failed to parse.
    pub line: u32,
    /// 1-based column in the content that failed to parse.
    pub column: u32,
    pub message: String,
    /// Same location in the original source, when a sourcemap is available.
    pub original: Option<OriginalPosition>,
    #[serde(skip)]
    pub offset: usize,
    #[serde(skip)]
    pub source_text: Option<String>,
}

impl ParseError {
    pub fn new(
        url: impl Into<String>,
        content: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, column) = line_column_at(content, offset);
        Self {
            url: url.into(),
            line,
            column,
            message: message.into(),
            original: None,
            offset: offset.min(content.len()),
            source_text: Some(content.to_string()),
        }
    }

    /// Resolve the original location through `map`.
    pub fn remap(mut self, map: Option<&SourceMap>) -> Self {
        self.original = map.and_then(|map| sourcemap::original_position(map, self.line, self.column));
        self
    }

    /// `url:line:column`, preferring the original location.
    pub fn location(&self) -> String {
        match &self.original {
            Some(original) => format!("{}:{}:{}", original.source, original.line, original.column),
            None => format!("{}:{}:{}", self.url, self.line, self.column),
        }
    }

    /// A few lines of source around the failure with a caret under the column.
    pub fn code_frame(&self) -> Option<String> {
        let source = self.source_text.as_deref()?;
        let lines: Vec<&str> = source.split('\n').collect();
        let index = (self.line as usize).checked_sub(1)?;
        if index >= lines.len() {
            return None;
        }
        let first = index.saturating_sub(FRAME_CONTEXT);
        let last = (index + FRAME_CONTEXT).min(lines.len() - 1);
        let width = (last + 1).to_string().len();

        let mut frame = String::new();
        for (number, text) in lines.iter().enumerate().take(last + 1).skip(first) {
            let marker = if number == index { '>' } else { ' ' };
            frame.push_str(&format!("{marker} {:>width$} | {text}\n", number + 1));
            if number == index {
                let padding = " ".repeat(self.column.saturating_sub(1) as usize);
                frame.push_str(&format!("  {:>width$} | {padding}^\n", ""));
            }
        }
        Some(frame)
    }

    /// Body of a `500 parse error` response for clients accepting JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": "PARSE_ERROR",
            "message": self.message,
            "url": self.url,
            "line": self.line,
            "column": self.column,
            "original": self.original,
            "codeFrame": self.code_frame(),
        })
    }

    /// Body of a `500 parse error` response for browsers.
    pub fn to_html(&self) -> String {
        let frame = self.code_frame().unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Parse error</title></head>\n<body>\n<h1>Parse error</h1>\n<p>{}</p>\n<p><code>{}</code></p>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(&self.message),
            escape_html(&self.location()),
            escape_html(&frame),
        )
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.location())
    }
}

impl std::error::Error for ParseError {}

impl Diagnostic for ParseError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new("PARSE_ERROR"))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.source_text.as_ref().map(|text| text as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let source = self.source_text.as_deref()?;
        let length = token_length(source, self.offset);
        Some(Box::new(std::iter::once(LabeledSpan::new(
            Some("Parse error".to_string()),
            self.offset,
            length,
        ))))
    }
}

/// Length of the identifier starting at `offset`, at least 1.
fn token_length(source: &str, offset: usize) -> usize {
    if offset >= source.len() {
        return 0;
    }
    let remaining = &source[offset..];
    remaining
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric() && *c != '_')
        .map(|(position, _)| position)
        .unwrap_or(remaining.len())
        .max(1)
}

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_and_frame() {
        let content = "const a = 1;\nconst = ;\nexport { a };\n";
        let offset = content.find("= ;").unwrap();
        let error = ParseError::new("file:///p/a.js", content, offset, "Unexpected token");
        assert_eq!(error.line, 2);
        assert_eq!(error.column, 7);
        assert_eq!(error.location(), "file:///p/a.js:2:7");

        let frame = error.code_frame().unwrap();
        assert!(frame.contains("> 2 | const = ;"));
        assert!(frame.contains("|       ^"));
    }

    #[test]
    fn test_remap_prefers_original_location() {
        let original = "line1\nbroken(\n";
        let mut batch = jsenv_graph::EditBatch::new();
        batch.insert(0, "// banner\n");
        let (content, map) = batch.apply_with_map(original, "file:///p/src.js").unwrap();
        let offset = content.find("broken").unwrap();

        let error = ParseError::new("file:///p/src.js", &content, offset, "Unexpected end")
            .remap(Some(&map));
        assert_eq!(error.line, 3);
        let original = error.original.as_ref().unwrap();
        assert_eq!(original.line, 2);
        assert_eq!(error.location(), "file:///p/src.js:2:1");
    }

    #[test]
    fn test_json_and_html_bodies() {
        let error = ParseError::new("file:///p/a.js", "<oops", 0, "Unexpected <");
        let json = error.to_json();
        assert_eq!(json["code"], "PARSE_ERROR");
        assert_eq!(json["line"], 1);
        let html = error.to_html();
        assert!(html.contains("Unexpected &lt;"));
        assert!(!html.contains("<oops"));
    }
}
