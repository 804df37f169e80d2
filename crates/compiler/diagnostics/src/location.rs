//! Zero-based source positions and ranges.

use std::fmt;

/// A `(line, column)` pair, both zero-based. Columns count bytes within the line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Sentinel used as the end of a top context.
    pub const INFINITE: Self = Self {
        line: u32::MAX,
        column: u32::MAX,
    };

    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Inclusive start, exclusive end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// `[0,0)–[∞,∞)`, the range covered by a whole file.
    pub const fn infinite() -> Self {
        Self {
            start: Position::new(0, 0),
            end: Position::INFINITE,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Like [`Range::contains`] but also accepts the end position, which is where
    /// a cursor sits right after the last character of a scope.
    pub fn contains_inclusive(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// An edit that replaced `removed_lines` lines starting at `line` with
/// `inserted_lines` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEdit {
    pub line: u32,
    pub removed_lines: u32,
    pub inserted_lines: u32,
}

/// A range together with the document revision it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeInRevision {
    pub range: Range,
    pub revision: u64,
}

impl RangeInRevision {
    pub const fn new(range: Range, revision: u64) -> Self {
        Self { range, revision }
    }

    /// Moves the range forward through `edits`, which must have been applied in
    /// order after `self.revision`. Returns `None` when an edit overlaps the range.
    pub fn translate(&self, edits: &[LineEdit], revision: u64) -> Option<Self> {
        let mut range = self.range;
        for edit in edits {
            let edit_end = edit.line.saturating_add(edit.removed_lines);
            let before = edit_end <= range.start.line && edit.line < range.start.line;
            let insertion_before = edit.removed_lines == 0 && edit.line <= range.start.line;
            if before || insertion_before {
                let delta = i64::from(edit.inserted_lines) - i64::from(edit.removed_lines);
                range.start.line = shift(range.start.line, delta)?;
                range.end.line = shift(range.end.line, delta)?;
            } else if edit.line > range.end.line {
                continue;
            } else {
                return None;
            }
        }
        Some(Self { range, revision })
    }
}

fn shift(line: u32, delta: i64) -> Option<u32> {
    if line == u32::MAX {
        return Some(line);
    }
    u32::try_from(i64::from(line) + delta).ok()
}
