use ziglens_compiler_diagnostics::{Position, Range};

/// Maps byte offsets to zero-based `(line, column)` positions. Columns are byte
/// offsets within the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                text.bytes()
                    .enumerate()
                    .filter(|&(_, b)| b == b'\n')
                    .map(|(i, _)| i as u32 + 1),
            )
            .collect();
        Self {
            line_starts,
            len: text.len() as u32,
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = (offset as u32).min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Position::new(line as u32, offset - self.line_starts[line])
    }

    pub fn range(&self, start: usize, end: usize) -> Range {
        Range::new(self.position(start), self.position(end))
    }

    /// Byte offset of `position`, clamped to the end of its line.
    pub fn offset(&self, position: Position) -> Option<usize> {
        let start = *self.line_starts.get(position.line as usize)?;
        let line_end = self
            .line_starts
            .get(position.line as usize + 1)
            .map_or(self.len, |&next| next - 1);
        Some(start.saturating_add(position.column).min(line_end) as usize)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
