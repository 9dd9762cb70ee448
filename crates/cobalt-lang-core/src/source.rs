//! Normalized source text with a precomputed line index.
//!
//! Raw program text passes through [`SourceText::new`] before tokenization.
//! This guarantees that line endings are `\n` only and that byte offsets in
//! the [`LineIndex`] are accurate regardless of the original terminator
//! style. Code that accumulates offsets via `line.len() + 1` drifts by one
//! byte per `\r\n` line; building the index from actual byte positions in
//! the normalized text avoids that entirely.

use crate::span::{Location, Span};

/// Normalized source text plus its line-offset index.
///
/// The lexer tokenizes `text` and every later stage resolves spans back to
/// line/column pairs through the same instance, so positions stay
/// consistent across the whole pipeline.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// Source with all line endings converted to `\n`.
    pub text: String,
    /// Line offset index built from the normalized text.
    pub line_index: LineIndex,
}

impl SourceText {
    /// Normalize `raw` and build the line index.
    pub fn new(raw: &str) -> Self {
        let text = normalize_line_endings(raw);
        let line_index = LineIndex::new(&text);
        Self { text, line_index }
    }

    /// Line and column for a byte offset, both 1-indexed.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let (line, col) = self.line_index.offset_to_line_col_0(offset);
        (line + 1, col + 1)
    }

    /// Resolve the start of a span to a displayable [`Location`].
    pub fn location(&self, span: Span, file_name: &str) -> Location {
        let (line, column) = self.line_col(span.start);
        Location::new(file_name, line, column)
    }
}

/// Byte offset of the start of each line in a normalized source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    offsets: Vec<u32>,
}

impl LineIndex {
    /// Build a line index. The text must use `\n` as its only terminator.
    pub fn new(text: &str) -> Self {
        let mut offsets = vec![0];
        for (i, byte) in text.as_bytes().iter().enumerate() {
            if *byte == b'\n' {
                offsets.push((i + 1) as u32);
            }
        }
        Self { offsets }
    }

    /// Number of lines, counting the empty line after a trailing `\n`.
    pub fn line_count(&self) -> usize {
        self.offsets.len()
    }

    /// Byte offset where the given 0-indexed line starts.
    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.offsets.get(line).copied()
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    pub fn offset_to_line_col_0(&self, offset: u32) -> (u32, u32) {
        // Last line whose start is <= offset.
        let line = match self.offsets.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_point) => insert_point.saturating_sub(1),
        };
        let col = offset - self.offsets[line];
        (line as u32, col)
    }
}

/// Normalize line endings to `\n`, converting `\r\n` and bare `\r`.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.as_bytes().contains(&b'\r') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unix_unchanged() {
        assert_eq!(normalize_line_endings("a\nb\nc"), "a\nb\nc");
    }

    #[test]
    fn normalize_windows_and_bare_cr() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn line_index_offsets() {
        let idx = LineIndex::new("line1\nline2\nline3");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.line_start(0), Some(0));
        assert_eq!(idx.line_start(1), Some(6));
        assert_eq!(idx.line_start(2), Some(12));
        assert_eq!(idx.line_start(3), None);
    }

    #[test]
    fn line_index_trailing_newline() {
        let idx = LineIndex::new("a\nb\n");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.line_start(2), Some(4));
    }

    #[test]
    fn offset_to_line_col_boundaries() {
        let idx = LineIndex::new("abc\ndef\nghi");
        assert_eq!(idx.offset_to_line_col_0(0), (0, 0));
        assert_eq!(idx.offset_to_line_col_0(3), (0, 3));
        assert_eq!(idx.offset_to_line_col_0(4), (1, 0));
        assert_eq!(idx.offset_to_line_col_0(8), (2, 0));
    }

    #[test]
    fn source_text_crlf_offsets_stay_accurate() {
        let src = SourceText::new("000100 IDENTIFICATION DIVISION.\r\n000200 PROGRAM-ID. DEMO.\r\n");
        assert!(!src.text.contains('\r'));
        assert_eq!(src.line_col(0), (1, 1));
        let line1 = src.line_index.line_start(1).unwrap();
        assert_eq!(src.line_col(line1), (2, 1));
    }

    #[test]
    fn source_text_location() {
        let src = SourceText::new("abc\ndef");
        let loc = src.location(Span::main(5, 6), "demo.cbl");
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 2);
        assert_eq!(loc.file_name, "demo.cbl");
    }
}
