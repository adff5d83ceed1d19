use std::fmt;

use serde::{Deserialize, Serialize};
use text_size::{TextRange, TextSize};

/// Location of a character in the source text.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// The line number, counting from 1.
    pub lineno: u32,
    /// The column (in characters), counting from 1.
    pub column: u32,
    /// The byte offset, counting from 0.
    pub offset: u32,
}

impl Location {
    pub const START: Location = Location {
        lineno: 1,
        column: 1,
        offset: 0,
    };
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.lineno, self.column, self.offset)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lineno, self.column)
    }
}

/// A source span with resolved start and end locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Maps byte offsets to line/column locations.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset of the first character of each line.
    line_starts: Vec<u32>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (offset, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(u32::try_from(offset + 1).unwrap_or(u32::MAX));
            }
        }
        Self { text, line_starts }
    }

    /// Resolves a byte offset, clamping it to the end of the text.
    pub fn location(&self, offset: TextSize) -> Location {
        let offset = u32::from(offset).min(u32::try_from(self.text.len()).unwrap_or(u32::MAX));
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line] as usize;
        let column = self
            .text
            .get(line_start..offset as usize)
            .map_or(0, |s| s.chars().count());
        Location {
            lineno: u32::try_from(line + 1).unwrap_or(u32::MAX),
            column: u32::try_from(column + 1).unwrap_or(u32::MAX),
            offset,
        }
    }

    pub fn span(&self, range: TextRange) -> Span {
        Span {
            start: self.location(range.start()),
            end: self.location(range.end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_locations() {
        let index = LineIndex::new("ab\ncd\n\nx");
        assert_eq!(index.location(0.into()), Location::START);
        let loc = index.location(4.into());
        assert_eq!((loc.lineno, loc.column, loc.offset), (2, 2, 4));
        let loc = index.location(7.into());
        assert_eq!((loc.lineno, loc.column), (4, 1));
    }
}
