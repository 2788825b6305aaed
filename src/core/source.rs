//! Source index: raw bytes + tree-sitter tree for one Java file.
//!
//! Files are read as bytes so node byte offsets slice the buffer exactly;
//! decoding to UTF-8 happens only for the spans that get extracted. Every
//! `parse` call is a fresh parse of the file as it is on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::core::target::LineRange;
use crate::infra::line_index::NewlineIndex;

/// Failures while loading or slicing a source file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError
{
    #[error("failed to read {}", path.display())]
    Io
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse
    {
        path: PathBuf,
        reason: String,
    },

    #[error("bytes {start}..{end} of {} are not valid UTF-8", path.display())]
    Decode
    {
        path: PathBuf,
        start: usize,
        end: usize,
        #[source]
        source: std::str::Utf8Error,
    },
}

/// Stateless Java parsing service. Cheap to clone and share; a new
/// `tree_sitter::Parser` is created per parse.
#[derive(Clone)]
pub struct SourceParser
{
    language: Language,
}

impl std::fmt::Debug for SourceParser
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        f.debug_struct("SourceParser")
            .field("language", &"java")
            .finish()
    }
}

impl Default for SourceParser
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl SourceParser
{
    pub fn new() -> Self
    {
        Self { language: tree_sitter_java::LANGUAGE.into() }
    }

    /// Grammar handle, shared with the query compilers.
    pub fn language(&self) -> &Language
    {
        &self.language
    }

    /// Read `path` and parse it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn parse(
        &self,
        path: &Path,
    ) -> Result<SourceFile, SourceError>
    {
        let bytes = std::fs::read(path)
            .map_err(|source| SourceError::Io { path: path.to_path_buf(), source })?;

        self.parse_bytes(path, bytes)
    }

    /// Parse an in-memory buffer attributed to `path`.
    pub fn parse_bytes(
        &self,
        path: &Path,
        bytes: Vec<u8>,
    ) -> Result<SourceFile, SourceError>
    {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| SourceError::Parse { path: path.to_path_buf(), reason: e.to_string() })?;

        let tree = parser
            .parse(&bytes, None)
            .ok_or_else(|| SourceError::Parse {
                path: path.to_path_buf(),
                reason: "parser produced no tree".to_string(),
            })?;

        // Buggy code is still worth indexing; error nodes are recovered around
        if tree
            .root_node()
            .has_error()
        {
            warn!(path = %path.display(), "syntax errors in source, continuing with recovered tree");
        }

        let lines = NewlineIndex::build(&bytes);
        debug!(bytes = bytes.len(), lines = lines.line_count(), "parsed source");

        Ok(SourceFile { path: path.to_path_buf(), bytes, tree, lines })
    }
}

/// One parsed file. Nodes borrowed from `tree()` stay valid while this lives.
pub struct SourceFile
{
    path: PathBuf,
    bytes: Vec<u8>,
    tree: Tree,
    lines: NewlineIndex,
}

impl std::fmt::Debug for SourceFile
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("bytes", &self.bytes.len())
            .field("lines", &self.lines.line_count())
            .finish()
    }
}

impl SourceFile
{
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    pub fn tree(&self) -> &Tree
    {
        &self.tree
    }

    pub fn line_count(&self) -> usize
    {
        self.lines.line_count()
    }

    /// Decode `[start, end)` of the original buffer.
    pub fn text_of(
        &self,
        start: usize,
        end: usize,
    ) -> Result<&str, SourceError>
    {
        let slice = self
            .bytes
            .get(start..end)
            .unwrap_or_default();

        std::str::from_utf8(slice).map_err(|source| SourceError::Decode {
            path: self.path.clone(),
            start,
            end,
            source,
        })
    }

    /// Exact source text a node covers.
    pub fn node_text(
        &self,
        node: Node<'_>,
    ) -> Result<&str, SourceError>
    {
        self.text_of(node.start_byte(), node.end_byte())
    }

    /// Lines of `range` concatenated, each with its own terminator.
    /// None when the range runs past the end of the file.
    pub fn lines_text(
        &self,
        range: LineRange,
    ) -> Result<Option<&str>, SourceError>
    {
        match self
            .lines
            .lines_with_terminators(range.start, range.end)
        {
            Some(span) => self
                .text_of(span.start, span.end)
                .map(Some),
            None => Ok(None),
        }
    }

    /// One line, trimmed of surrounding whitespace.
    pub fn line_text(
        &self,
        line: usize,
    ) -> Option<&str>
    {
        let span = self
            .lines
            .line_span(line, &self.bytes)?;

        self.text_of(span.start, span.end)
            .ok()
            .map(str::trim)
    }
}
