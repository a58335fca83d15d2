//! Batched, offset-based content rewriting.
//!
//! References are discovered with byte offsets into the parent content and
//! may be resolved in any order. Rewrites are therefore collected first and
//! applied in one pass from the highest offset down, so applying one edit
//! never shifts the offsets of edits not yet applied.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};

/// Replace `start..end` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Errors raised when a batch cannot be applied to a given content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("edit {start}..{end} is out of bounds for content of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("edit {start}..{end} overlaps edit {other_start}..{other_end}")]
    Overlap {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },

    #[error("offset {0} is not on a UTF-8 character boundary")]
    NotCharBoundary(usize),
}

/// A set of non-overlapping edits against one content.
#[derive(Debug, Clone, Default)]
pub struct EditBatch {
    edits: Vec<Edit>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a replacement.
    pub fn replace(&mut self, start: usize, end: usize, replacement: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            replacement: replacement.into(),
        });
    }

    /// Queue an insertion. Insertions at the same offset keep queue order.
    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Edits sorted by start offset, validated against `content`.
    fn sorted(&self, content: &str) -> Result<Vec<&Edit>, EditError> {
        let mut sorted: Vec<&Edit> = self.edits.iter().collect();
        // Stable sort keeps queue order for insertions at the same offset.
        sorted.sort_by_key(|edit| edit.start);

        for edit in &sorted {
            if edit.start > edit.end || edit.end > content.len() {
                return Err(EditError::OutOfBounds {
                    start: edit.start,
                    end: edit.end,
                    len: content.len(),
                });
            }
            for offset in [edit.start, edit.end] {
                if !content.is_char_boundary(offset) {
                    return Err(EditError::NotCharBoundary(offset));
                }
            }
        }
        for pair in sorted.windows(2) {
            let (previous, next) = (pair[0], pair[1]);
            if next.start < previous.end {
                return Err(EditError::Overlap {
                    start: next.start,
                    end: next.end,
                    other_start: previous.start,
                    other_end: previous.end,
                });
            }
        }
        Ok(sorted)
    }

    /// Apply every edit in a single descending-offset pass.
    pub fn apply(&self, content: &str) -> Result<String, EditError> {
        let sorted = self.sorted(content)?;
        let mut output = content.to_string();
        for edit in sorted.into_iter().rev() {
            output.replace_range(edit.start..edit.end, &edit.replacement);
        }
        Ok(output)
    }

    /// Apply the batch and produce a sourcemap from the new content back to
    /// `content`, attributed to `source_url`.
    ///
    /// Unchanged text maps one to one (a token at every line start); each
    /// replacement maps to the start of the range it replaced.
    pub fn apply_with_map(
        &self,
        content: &str,
        source_url: &str,
    ) -> Result<(String, SourceMap), EditError> {
        let output = self.apply(content)?;
        let sorted = self.sorted(content)?;

        let mut builder = SourceMapBuilder::default();
        let source_id = builder.add_source_and_content(source_url, content);
        let mut cursor = MapCursor::default();
        let mut offset = 0;

        for edit in sorted {
            cursor.copy(&mut builder, source_id, &content[offset..edit.start]);
            cursor.replace(
                &mut builder,
                source_id,
                &content[edit.start..edit.end],
                &edit.replacement,
            );
            offset = edit.end;
        }
        cursor.copy(&mut builder, source_id, &content[offset..]);

        Ok((output, builder.into_sourcemap()))
    }
}

/// Walks generated and original positions in lockstep. Columns count UTF-16
/// code units, as sourcemap consumers expect.
#[derive(Debug, Default)]
struct MapCursor {
    generated_line: u32,
    generated_column: u32,
    original_line: u32,
    original_column: u32,
}

impl MapCursor {
    fn mark(&self, builder: &mut SourceMapBuilder, source_id: u32) {
        builder.add_token(
            self.generated_line,
            self.generated_column,
            self.original_line,
            self.original_column,
            Some(source_id),
            None,
        );
    }

    /// Unchanged text: both positions advance together.
    fn copy(&mut self, builder: &mut SourceMapBuilder, source_id: u32, text: &str) {
        if text.is_empty() {
            return;
        }
        self.mark(builder, source_id);
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\n' {
                self.generated_line += 1;
                self.generated_column = 0;
                self.original_line += 1;
                self.original_column = 0;
                if chars.peek().is_some() {
                    self.mark(builder, source_id);
                }
            } else {
                let width = ch.len_utf16() as u32;
                self.generated_column += width;
                self.original_column += width;
            }
        }
    }

    /// Replaced text: generated side walks the replacement, original side
    /// walks the removed range, every generated line points at the edit
    /// start.
    fn replace(
        &mut self,
        builder: &mut SourceMapBuilder,
        source_id: u32,
        removed: &str,
        replacement: &str,
    ) {
        let anchor_line = self.original_line;
        let anchor_column = self.original_column;
        if !replacement.is_empty() {
            self.mark(builder, source_id);
        }
        let mut chars = replacement.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\n' {
                self.generated_line += 1;
                self.generated_column = 0;
                if chars.peek().is_some() {
                    builder.add_token(
                        self.generated_line,
                        0,
                        anchor_line,
                        anchor_column,
                        Some(source_id),
                        None,
                    );
                }
            } else {
                self.generated_column += ch.len_utf16() as u32;
            }
        }
        for ch in removed.chars() {
            if ch == '\n' {
                self.original_line += 1;
                self.original_column = 0;
            } else {
                self.original_column += ch.len_utf16() as u32;
            }
        }
    }
}
