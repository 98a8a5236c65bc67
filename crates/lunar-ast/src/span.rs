//! Source location tracking.
//!
//! ESTree producers attach either a `loc` object (line/column pairs), byte
//! offsets (`start`/`end` or `range`), or both. Diagnostics prefer `loc` and
//! fall back to the byte span.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start.
    pub start: u32,
    /// Byte offset of the end (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A line/column pair. Lines are 1-based, columns 0-based (ESTree convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The `loc` object of an ESTree node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SourceLocation {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            source: None,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        write!(f, "{}:{}", self.start.line, self.start.column + 1)
    }
}

/// Convert byte offsets to line/column positions.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offsets of the start of each line.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index from source code.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to an ESTree position (1-based line, 0-based column).
    pub fn position(&self, offset: u32) -> Position {
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i.saturating_sub(1));
        let column = offset - self.line_starts[line];
        Position::new(u32::try_from(line + 1).unwrap_or(u32::MAX), column)
    }

    /// Convert a span to a full source location.
    pub fn location(&self, span: Span) -> SourceLocation {
        SourceLocation::new(self.position(span.start), self.position(span.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_length() {
        let a = Span::new(5, 10);
        assert_eq!(a.len(), 5);
        assert!(!a.is_empty());
        assert!(Span::new(7, 7).is_empty());
    }

    #[test]
    fn test_line_index() {
        let source = "line1\nline2\nline3";
        let index = LineIndex::new(source);

        assert_eq!(index.position(0), Position::new(1, 0));
        assert_eq!(index.position(5), Position::new(1, 5));
        assert_eq!(index.position(6), Position::new(2, 0));
        assert_eq!(index.position(12), Position::new(3, 0));
    }

    #[test]
    fn test_location_display_is_one_based() {
        let mut loc = SourceLocation::new(Position::new(3, 4), Position::new(3, 9));
        assert_eq!(loc.to_string(), "3:5");
        loc.source = Some("main.js".to_string());
        assert_eq!(loc.to_string(), "main.js:3:5");
    }
}
