//! Source location tracking.
//!
//! Every token and AST node carries a [`Span`] recording the byte range it
//! came from. Spans stay cheap (two offsets and a file id) and are resolved
//! to human-readable [`Location`]s only at reporting time, via
//! [`SourceText`](crate::SourceText).

use std::fmt;
use std::ops::Range;

/// Identifier for a source file within one transpilation run.
///
/// Distinguishes the main program source from copybook members pulled in
/// alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// The id of the primary source file.
    pub const MAIN: FileId = FileId(0);
}

/// A contiguous byte range in one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The file this span belongs to.
    pub file: FileId,
    /// Byte offset of the first byte (0-indexed).
    pub start: u32,
    /// Byte offset one past the last byte.
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span in the main source file.
    pub fn main(start: u32, end: u32) -> Self {
        Self::new(FileId::MAIN, start, end)
    }

    /// Create an empty span at a single position.
    pub fn point(file: FileId, pos: u32) -> Self {
        Self::new(file, pos, pos)
    }

    /// A zero span for synthesized nodes that have no source of their own.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// Both spans must belong to the same file.
    pub fn extend(self, other: Span) -> Self {
        debug_assert_eq!(self.file, other.file, "cannot extend span across files");
        Self {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Convert to a byte range usable for slicing source text.
    pub fn to_range(&self) -> Range<usize> {
        (self.start as usize)..(self.end as usize)
    }
}

/// A resolved source position for display in reports and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// The file name or path the position refers to.
    pub file_name: String,
    /// Line number, 1-indexed.
    pub line: u32,
    /// Column number, 1-indexed.
    pub column: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(file_name: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_name: file_name.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_name, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(FileId(1), 10, 20);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
        assert_eq!(span.to_range(), 10..20);
    }

    #[test]
    fn span_point_is_empty() {
        let span = Span::point(FileId::MAIN, 42);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn span_extend_covers_both() {
        let a = Span::main(10, 20);
        let b = Span::main(15, 30);
        assert_eq!(a.extend(b), Span::main(10, 30));
        assert_eq!(b.extend(a), Span::main(10, 30));
    }

    #[test]
    fn dummy_span_is_zero() {
        let span = Span::dummy();
        assert_eq!(span.file, FileId::MAIN);
        assert!(span.is_empty());
    }

    #[test]
    fn location_display() {
        let loc = Location::new("payroll.cbl", 42, 8);
        assert_eq!(loc.to_string(), "payroll.cbl:42:8");
    }
}
