//! Newline index over raw source bytes.
//!
//! Goals
//! - One memchr pass records every '\n' offset.
//! - 1-based line numbers on the public surface.
//! - Two slicing flavours: the bare line (no '\r'/'\n') for call-site
//!   text, and the line *with* its terminator for bug excerpts.
//!
//! Notes
//! - An empty buffer has 0 lines.
//! - A trailing '\n' does not open a new line: "a\n" has 1 line.

use std::ops::Range;

#[derive(Debug, Clone)]
pub struct NewlineIndex
{
    /// Offsets of every '\n' in the buffer.
    newlines: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex
{
    /// Scan `bytes` once and record newline offsets.
    pub fn build(bytes: &[u8]) -> Self
    {
        let newlines = memchr::memchr_iter(b'\n', bytes).collect();

        Self { newlines, len: bytes.len() }
    }

    /// Number of logical lines.
    pub fn line_count(&self) -> usize
    {
        if self.len == 0
        {
            return 0;
        }

        // A final '\n' terminates the last line instead of opening one
        match self.newlines.last()
        {
            Some(&last) if last + 1 == self.len => self.newlines.len(),
            _ => self.newlines.len() + 1,
        }
    }

    /// Start byte of a 1-based line.
    pub fn line_start(
        &self,
        line: usize,
    ) -> Option<usize>
    {
        if line == 0 || line > self.line_count()
        {
            return None;
        }
        if line == 1
        {
            return Some(0);
        }

        self.newlines
            .get(line - 2)
            .map(|&nl| nl + 1)
    }

    /// Byte range of a 1-based line without its terminator.
    /// A '\r' before the '\n' is excluded as well.
    pub fn line_span(
        &self,
        line: usize,
        bytes: &[u8],
    ) -> Option<Range<usize>>
    {
        let start = self.line_start(line)?;
        let mut end = self
            .newlines
            .get(line - 1)
            .copied()
            .unwrap_or(self.len);

        if end > start && bytes.get(end - 1) == Some(&b'\r')
        {
            end -= 1;
        }

        Some(start..end)
    }

    /// Byte range covering lines `first..=last`, terminators included.
    /// Returns None when the span is inverted or leaves the buffer.
    pub fn lines_with_terminators(
        &self,
        first: usize,
        last: usize,
    ) -> Option<Range<usize>>
    {
        if first > last || last > self.line_count()
        {
            return None;
        }

        let start = self.line_start(first)?;
        let end = self
            .newlines
            .get(last - 1)
            .map(|&nl| nl + 1)
            .unwrap_or(self.len);

        Some(start..end)
    }
}
