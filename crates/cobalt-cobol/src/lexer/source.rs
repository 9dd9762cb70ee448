//! Source file handling and COBOL reference-format column zones.
//!
//! Fixed-format source divides every line into zones: columns 1-6 hold a
//! sequence number, column 7 an indicator, columns 8-72 the code, and
//! columns 73-80 historical identification text. Only the code zone feeds
//! the scanner; the rest is preserved on [`SourceLine`] so nothing is lost.

use std::fs;
use std::path::{Path, PathBuf};

use cobalt_lang_core::{normalize_line_endings, FileId, Span};

use crate::error::{CobolError, Result};

/// Right margin of the code zone in fixed format (column 72, 0-indexed 72).
const FIXED_RIGHT_MARGIN: usize = 72;

/// COBOL source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// Reference format: sequence 1-6, indicator 7, code 8-72, 73-80 ignored.
    #[default]
    Fixed,
    /// Free format: no column zones, `*>` starts a comment.
    Free,
}

/// Column-7 indicator values in fixed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Normal code line (space or empty).
    Normal,
    /// Comment line (`*` or `/`).
    Comment,
    /// Continuation line (`-`).
    Continuation,
    /// Debug line (`D`).
    Debug,
}

impl Indicator {
    /// Classify an indicator character.
    pub fn from_char(ch: char) -> Self {
        match ch {
            '*' | '/' => Indicator::Comment,
            '-' => Indicator::Continuation,
            'D' | 'd' => Indicator::Debug,
            _ => Indicator::Normal,
        }
    }
}

/// One processed line of COBOL source.
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// Original line number, 1-indexed.
    pub line_number: u32,
    /// Sequence number zone (columns 1-6 in fixed format).
    pub sequence: String,
    /// Indicator for this line.
    pub indicator: Indicator,
    /// Code zone content.
    pub content: String,
    /// Byte offset of the start of the raw line.
    pub start_offset: u32,
    /// Byte offset where the code zone starts.
    pub content_offset: u32,
}

impl SourceLine {
    /// Whether this line is a comment line.
    pub fn is_comment(&self) -> bool {
        self.indicator == Indicator::Comment
    }

    /// Whether this line continues the previous one.
    pub fn is_continuation(&self) -> bool {
        self.indicator == Indicator::Continuation
    }

    /// Code zone content with trailing whitespace removed.
    pub fn trimmed_content(&self) -> &str {
        self.content.trim_end()
    }
}

/// A source file loaded into memory, split into zone-processed lines.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Identifier for this file within the run.
    pub id: FileId,
    /// Path on disk, if loaded from one.
    pub path: Option<PathBuf>,
    /// Normalized source text.
    pub text: String,
    /// The configured source format.
    pub format: SourceFormat,
    /// Zone-processed lines.
    pub lines: Vec<SourceLine>,
}

impl SourceFile {
    /// Create a source file from text.
    pub fn from_text(id: FileId, text: String, format: SourceFormat) -> Self {
        // Normalize before splitting so byte offsets never drift on \r\n.
        let text = normalize_line_endings(&text);
        let lines = split_lines(&text, format);
        Self {
            id,
            path: None,
            text,
            format,
            lines,
        }
    }

    /// Load a source file from disk.
    pub fn from_path(id: FileId, path: &Path, format: SourceFormat) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CobolError::Io {
            message: format!("{}: {}", path.display(), e),
        })?;
        let mut file = Self::from_text(id, text, format);
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// The source text covered by a span.
    pub fn span_text(&self, span: Span) -> &str {
        let start = span.start as usize;
        let end = (span.end as usize).min(self.text.len());
        if start < self.text.len() {
            &self.text[start..end]
        } else {
            ""
        }
    }

    /// File name for error messages.
    pub fn file_name(&self) -> &str {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("<source>")
    }

    /// Comment lines in source order, each with the text after the
    /// indicator and the span of the code zone.
    ///
    /// The parser attaches these to the tree so comments survive into the
    /// generated output.
    pub fn comment_lines(&self) -> Vec<(String, Span)> {
        self.lines
            .iter()
            .filter(|l| l.is_comment())
            .map(|l| {
                let text = l.trimmed_content().to_string();
                let span = Span::new(
                    self.id,
                    l.content_offset,
                    l.content_offset + l.content.len() as u32,
                );
                (text, span)
            })
            .collect()
    }
}

/// Split normalized text into zone-processed lines.
///
/// The input must already be normalized (no `\r` bytes); both
/// [`SourceFile`] constructors guarantee that. Offsets are derived by
/// pointer arithmetic against the source string rather than accumulated
/// line lengths.
fn split_lines(text: &str, format: SourceFormat) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let base = text.as_ptr() as usize;
    let mut line_number: u32 = 1;

    for line in text.lines() {
        let offset = (line.as_ptr() as usize - base) as u32;

        let (sequence, indicator, content, content_offset) = match format {
            SourceFormat::Fixed => split_fixed_line(line, offset),
            SourceFormat::Free => split_free_line(line, offset),
        };

        lines.push(SourceLine {
            line_number,
            sequence,
            indicator,
            content,
            start_offset: offset,
            content_offset,
        });

        line_number += 1;
    }

    lines
}

/// Split one fixed-format line into its zones.
///
/// Zone boundaries are character columns; each is located as a byte
/// offset so a multibyte character can never land inside a slice.
fn split_fixed_line(line: &str, start_offset: u32) -> (String, Indicator, String, u32) {
    let byte_at = |column: usize| {
        line.char_indices()
            .nth(column)
            .map(|(i, _)| i)
            .unwrap_or(line.len())
    };

    let indicator_start = byte_at(6);
    if indicator_start == line.len() {
        // Too short to carry an indicator; the whole line is sequence zone.
        return (
            line.to_string(),
            Indicator::Normal,
            String::new(),
            start_offset + line.len() as u32,
        );
    }

    let sequence = line[..indicator_start].to_string();
    let indicator_char = line[indicator_start..].chars().next().unwrap_or(' ');
    let indicator = Indicator::from_char(indicator_char);

    // Code zone runs from column 8 through column 72; columns 73-80 are
    // identification text and never reach the scanner.
    let content_start = byte_at(7);
    let code_end = byte_at(FIXED_RIGHT_MARGIN);
    let content = line[content_start..code_end].to_string();
    let content_offset = start_offset + content_start as u32;

    (sequence, indicator, content, content_offset)
}

/// Split one free-format line. No zones; `*>` starts a comment.
fn split_free_line(line: &str, start_offset: u32) -> (String, Indicator, String, u32) {
    let trimmed = line.trim_start();
    let leading = line.len() - trimmed.len();

    let (indicator, content) = if trimmed.starts_with("*>") {
        (Indicator::Comment, trimmed.to_string())
    } else {
        (Indicator::Normal, line.to_string())
    };

    (
        String::new(),
        indicator,
        content,
        start_offset + leading as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_format_zones() {
        let src = "000100 IDENTIFICATION DIVISION.                                        ID-TEXT";
        let lines = split_lines(src, SourceFormat::Fixed);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sequence, "000100");
        assert_eq!(lines[0].indicator, Indicator::Normal);
        assert!(lines[0].content.starts_with("IDENTIFICATION DIVISION."));
        // Columns 73-80 never reach the code zone.
        assert!(!lines[0].content.contains("ID-TEXT"));
    }

    #[test]
    fn comment_indicator() {
        let lines = split_lines("000200* A COMMENT", SourceFormat::Fixed);
        assert!(lines[0].is_comment());
        assert_eq!(lines[0].trimmed_content(), " A COMMENT");
    }

    #[test]
    fn slash_comment_indicator() {
        let lines = split_lines("000200/ PAGE EJECT", SourceFormat::Fixed);
        assert!(lines[0].is_comment());
    }

    #[test]
    fn continuation_indicator() {
        let lines = split_lines("000300-    \"REST OF LITERAL\"", SourceFormat::Fixed);
        assert!(lines[0].is_continuation());
    }

    #[test]
    fn short_line_is_sequence_only() {
        let lines = split_lines("0001", SourceFormat::Fixed);
        assert_eq!(lines[0].sequence, "0001");
        assert_eq!(lines[0].content, "");
        assert_eq!(lines[0].indicator, Indicator::Normal);
    }

    #[test]
    fn multibyte_in_indicator_column_does_not_split_a_character() {
        // An accented character sits exactly at the column-7 boundary.
        let lines = split_lines("000100é DISPLAY \"A\".", SourceFormat::Fixed);
        assert_eq!(lines[0].sequence, "000100");
        assert_eq!(lines[0].indicator, Indicator::Normal);
        assert!(lines[0].content.contains("DISPLAY"));
    }

    #[test]
    fn multibyte_straddling_the_right_margin() {
        // 7-char prefix plus 64 filler characters puts the accented
        // character across the byte position of column 72.
        let mut src = String::from("000100 ");
        src.push_str(&"X".repeat(64));
        src.push('é');
        src.push_str("ID-TEXT");
        let lines = split_lines(&src, SourceFormat::Fixed);
        assert!(lines[0].content.ends_with('é'), "{:?}", lines[0].content);
        assert!(!lines[0].content.contains("ID-TEXT"));
    }

    #[test]
    fn content_offset_is_column_eight() {
        let src = "000100 MOVE A TO B.\n000200 MOVE C TO D.";
        let lines = split_lines(src, SourceFormat::Fixed);
        assert_eq!(lines[0].content_offset, 7);
        assert_eq!(lines[1].content_offset, 20 + 7);
    }

    #[test]
    fn free_format_comment() {
        let lines = split_lines("*> free comment", SourceFormat::Free);
        assert!(lines[0].is_comment());
    }

    #[test]
    fn comment_lines_collects_text_and_span() {
        let src = SourceFile::from_text(
            FileId::MAIN,
            "000100* FIRST\n000200 MOVE A TO B.\n000300* SECOND".to_string(),
            SourceFormat::Fixed,
        );
        let comments = src.comment_lines();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].0, " FIRST");
        assert_eq!(comments[1].0, " SECOND");
        assert!(comments[0].1.start < comments[1].1.start);
    }
}
