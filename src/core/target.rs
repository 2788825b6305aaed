//! Bug locations: 1-based line ranges and "<path>:<ranges>" parsing.
//!
//! Each comma-separated range is its own bug, so unlike extraction
//! targets the ranges are kept in the order given and never merged.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use miette::{Diagnostic, SourceSpan};
use serde::Serialize;

/// Inclusive, 1-based line range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineRange
{
    pub start: usize,
    pub end: usize,
}

impl LineRange
{
    /// Build a range; rejects line 0 and inverted spans.
    pub fn new(
        start: usize,
        end: usize,
    ) -> Option<Self>
    {
        (start >= 1 && start <= end).then_some(Self { start, end })
    }

    /// Single-line range.
    pub fn line(line: usize) -> Option<Self>
    {
        Self::new(line, line)
    }

    /// 0-based (start_row, end_row) for comparisons against tree positions.
    /// A hand-built line 0 clamps to row 0.
    pub fn rows(&self) -> (usize, usize)
    {
        (self.start.saturating_sub(1), self.end.saturating_sub(1))
    }

    /// True when `other` lies completely inside `self`.
    pub fn contains(
        &self,
        other: &LineRange,
    ) -> bool
    {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of lines covered; 0 for a hand-built inverted range.
    pub fn line_count(&self) -> usize
    {
        (self.end + 1).saturating_sub(self.start)
    }
}

impl fmt::Display for LineRange
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        if self.start == self.end
        {
            write!(f, "{}", self.start)
        }
        else
        {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One file and the bug ranges reported against it, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugTarget
{
    pub file: PathBuf,
    pub ranges: Vec<LineRange>,
}

/// Ordered unit of work handed to the assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugReport
{
    pub targets: Vec<BugTarget>,
}

impl BugReport
{
    pub fn new(targets: Vec<BugTarget>) -> Self
    {
        Self { targets }
    }

    /// Total number of bug locations across all files.
    pub fn bug_count(&self) -> usize
    {
        self.targets
            .iter()
            .map(|t| t.ranges.len())
            .sum()
    }

    /// Parse CLI-style targets, bare range lists going to `default_file`.
    pub fn parse_all<S: AsRef<str>>(
        inputs: &[S],
        default_file: Option<&Path>,
    ) -> Result<Self, TargetError>
    {
        let targets = inputs
            .iter()
            .map(|s| BugTarget::parse(s.as_ref(), default_file))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { targets })
    }
}

/// Diagnostic for a malformed bug target, pointing at the bad segment.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("invalid bug target `{src}`: {reason}")]
#[diagnostic(code(bugctx::target))]
pub struct TargetError
{
    #[source_code]
    pub src: String,

    pub reason: String,

    #[label("here")]
    pub span: SourceSpan,

    #[help]
    pub help: String,
}

impl TargetError
{
    fn at(
        input: &str,
        offset: usize,
        width: usize,
        reason: impl Into<String>,
    ) -> Self
    {
        Self {
            src: input.to_string(),
            reason: reason.into(),
            span: (offset, width.max(1)).into(),
            help: "expected FILE:RANGES such as `src/Foo.java:8-9,21`, or bare RANGES when a \
                   default source file is configured"
                .to_string(),
        }
    }
}

impl BugTarget
{
    /// Parse "Foo.java:8-9,21" (or "C:\\src\\Foo.java:3"). A bare range
    /// list such as "8-9" falls back to `default_file` when one is given.
    pub fn parse(
        input: &str,
        default_file: Option<&Path>,
    ) -> Result<Self, TargetError>
    {
        let s = input.trim();

        // Split from the right once so drive letters survive
        let (file, ranges_str, ranges_at) = match s.rsplit_once(':')
        {
            Some((path, ranges)) =>
            {
                if path.trim().is_empty()
                {
                    return Err(TargetError::at(s, 0, 1, "missing file path before ':'"));
                }
                (PathBuf::from(path.trim()), ranges, path.len() + 1)
            }
            None => match default_file
            {
                Some(def) if looks_like_ranges(s) => (def.to_path_buf(), s, 0),
                _ => return Err(TargetError::at(s, 0, s.len(), "missing ':<ranges>' suffix")),
            },
        };

        let mut ranges = Vec::new();
        let mut offset = ranges_at;

        for seg in ranges_str.split(',')
        {
            let width = seg.len();
            let trimmed = seg.trim();

            if !trimmed.is_empty()
            {
                let range = parse_segment(trimmed)
                    .map_err(|reason| TargetError::at(s, offset, width, reason))?;
                ranges.push(range);
            }

            offset += width + 1;
        }

        if ranges.is_empty()
        {
            return Err(TargetError::at(s, ranges_at, ranges_str.len(), "no line ranges given"));
        }

        Ok(Self { file, ranges })
    }
}

/// Parse "N" or "A-B" into a range.
fn parse_segment(seg: &str) -> Result<LineRange, String>
{
    let (a, b) = match seg.split_once('-')
    {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (seg, seg),
    };

    let start: usize = a
        .parse()
        .map_err(|_| format!("invalid line number `{a}`"))?;
    let end: usize = b
        .parse()
        .map_err(|_| format!("invalid line number `{b}`"))?;

    if start == 0 || end == 0
    {
        return Err("line numbers start at 1".to_string());
    }

    LineRange::new(start, end).ok_or_else(|| format!("start > end in `{seg}`"))
}

fn looks_like_ranges(s: &str) -> bool
{
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | ',' | ' '))
}
