//! JSON validation.

use async_trait::async_trait;
use jsenv_graph::{UrlInfo, UrlType};

use super::text_of;
use crate::diagnostics::ParseError;
use crate::plugins::{Plugin, TransformContext, TransformOutput};
use crate::Result;

const NAME: &str = "jsenv:json";

/// Byte offset of a 1-based line/column pair reported by serde_json.
fn offset_of(content: &str, line: usize, column: usize) -> usize {
    let line_start: usize = content
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(content.len())
}

/// Parse `content` as JSON, reporting the location of the first error.
pub fn validate_json(url: &str, content: &str) -> std::result::Result<(), ParseError> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(_) => Ok(()),
        Err(error) => {
            let offset = offset_of(content, error.line(), error.column());
            let mut message = error.to_string();
            // serde_json appends " at line X column Y"
            if let Some(index) = message.find(" at line ") {
                message.truncate(index);
            }
            let mut parse_error = ParseError::new(url, content, offset, message);
            let (line, column) = (error.line() as u32, error.column() as u32);
            if line > 0 {
                parse_error.line = line;
                parse_error.column = column.max(1);
            }
            Err(parse_error)
        }
    }
}

/// Rejects JSON and web manifest nodes that do not parse.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonValidationPlugin;

#[async_trait]
impl Plugin for JsonValidationPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn transform_types(&self) -> &[UrlType] {
        &[UrlType::Json, UrlType::Webmanifest]
    }

    async fn transform_url_content(
        &self,
        info: &UrlInfo,
        _ctx: &mut TransformContext,
    ) -> Result<Option<TransformOutput>> {
        let content = text_of(info, NAME)?;
        validate_json(&info.url, content).map_err(|error| error.remap(info.sourcemap.as_ref()))?;
        Ok(None)
    }
}
