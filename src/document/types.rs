//! Position types shared by the editor and its consumers.
//!
//! - `SourceRange`: a byte span into a document's raw text
//! - `LineRange`: the same span as zero-based line/character pairs, which is
//!   what text editors scroll to

use std::ops::Range;

use ropey::Rope;
use serde::{Deserialize, Serialize};

/// A byte span into the raw text a [`super::ParsedDocument`] was parsed from.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRange {
    pub start_offset: usize,
    pub end_offset: usize,
}

impl SourceRange {
    pub fn new(start_offset: usize, end_offset: usize) -> Self {
        SourceRange {
            start_offset,
            end_offset,
        }
    }

    /// The text this range covers, or `None` if it does not fit `text`.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start_offset..self.end_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Converts byte offsets to line/character positions using rope-based
    /// character counting.
    pub fn to_line_range(&self, rope: &Rope) -> LineRange {
        LineRange {
            start: Position::from_byte(rope, self.start_offset),
            end: Position::from_byte(rope, self.end_offset),
        }
    }
}

impl From<Range<usize>> for SourceRange {
    fn from(range: Range<usize>) -> Self {
        SourceRange::new(range.start, range.end)
    }
}

impl From<SourceRange> for Range<usize> {
    fn from(range: SourceRange) -> Self {
        range.start_offset..range.end_offset
    }
}

/// Zero-based line and character (Unicode scalar) position.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    fn from_byte(rope: &Rope, byte: usize) -> Position {
        // convert from byte offset to char offset
        let char_idx = rope.byte_to_char(byte.min(rope.len_bytes()));
        let line = rope.char_to_line(char_idx);
        let character = char_idx - rope.line_to_char(line);

        Position {
            line: line as u32,
            character: character as u32,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: Position,
    pub end: Position,
}
