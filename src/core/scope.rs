//! Line range → enclosing declaration.
//!
//! Two tiers, searched in order:
//!   1. method and constructor declarations
//!   2. class declarations
//!
//! Within a tier the first declaration in document order whose span
//! contains the whole range wins. Nested candidates are not ranked, so an
//! inner method never beats an outer one that starts earlier. This is a
//! known coarseness and is kept as-is.
//!
//! A range that crosses a method boundary drops to the class tier; one
//! that crosses a class boundary resolves to nothing (imports, package
//! lines and the like).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

use crate::core::{
    source::{SourceError, SourceFile, SourceParser},
    target::LineRange,
};

/// Which declaration a scope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind
{
    Method,
    Constructor,
    Class,
}

impl ScopeKind
{
    fn from_node_kind(kind: &str) -> Option<Self>
    {
        match kind
        {
            "method_declaration" => Some(Self::Method),
            "constructor_declaration" => Some(Self::Constructor),
            "class_declaration" => Some(Self::Class),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScopeKind
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result
    {
        match self
        {
            ScopeKind::Method => write!(f, "method"),
            ScopeKind::Constructor => write!(f, "constructor"),
            ScopeKind::Class => write!(f, "class"),
        }
    }
}

/// A resolved declaration: its 1-based span and the exact text it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeNode
{
    pub kind: ScopeKind,
    /// Declared identifier, when the grammar gives one.
    pub name: Option<String>,
    pub span: LineRange,
    pub start_byte: usize,
    pub end_byte: usize,
    pub text: String,
}

impl ScopeNode
{
    /// Copy a declaration node out of the tree.
    pub fn from_node(
        file: &SourceFile,
        node: Node<'_>,
    ) -> Result<Option<Self>, SourceError>
    {
        let Some(kind) = ScopeKind::from_node_kind(node.kind())
        else
        {
            return Ok(None);
        };

        let name = match node.child_by_field_name("name")
        {
            Some(ident) => Some(
                file.node_text(ident)?
                    .to_string(),
            ),
            None => None,
        };

        let span = LineRange {
            start: node
                .start_position()
                .row
                + 1,
            end: node
                .end_position()
                .row
                + 1,
        };

        Ok(Some(Self {
            kind,
            name,
            span,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            text: file
                .node_text(node)?
                .to_string(),
        }))
    }
}

/// Scope resolution over a shared parsing service.
pub struct ScopeResolver
{
    parser: SourceParser,
    /// Tier 1: methods and constructors.
    members: Query,
    /// Tier 2: classes.
    classes: Query,
}

impl ScopeResolver
{
    /// Compile both tier queries once.
    pub fn new(parser: SourceParser) -> Result<Self>
    {
        let members = Query::new(
            parser.language(),
            r#"
            (method_declaration) @scope
            (constructor_declaration) @scope
            "#,
        )
        .context("create method/constructor query")?;

        let classes = Query::new(parser.language(), "(class_declaration) @scope")
            .context("create class query")?;

        Ok(Self { parser, members, classes })
    }

    /// Resolve `range` in the file at `path`. Read and parse failures are
    /// logged and reported as "no scope" so a batch can keep going.
    #[instrument(skip(self), fields(path = %path.display(), range = %range))]
    pub fn resolve_scope(
        &self,
        path: &Path,
        range: LineRange,
    ) -> Option<ScopeNode>
    {
        let file = match self
            .parser
            .parse(path)
        {
            Ok(file) => file,
            Err(e) =>
            {
                warn!(error = %e, "cannot resolve scope");
                return None;
            }
        };

        match self.resolve_in(&file, range)
        {
            Ok(scope) => scope,
            Err(e) =>
            {
                warn!(error = %e, "cannot extract scope text");
                None
            }
        }
    }

    /// Resolve `range` inside an already parsed file.
    pub fn resolve_in(
        &self,
        file: &SourceFile,
        range: LineRange,
    ) -> Result<Option<ScopeNode>, SourceError>
    {
        let rows = range.rows();

        let hit = first_containing(&self.members, file, rows)
            .or_else(|| first_containing(&self.classes, file, rows));

        match hit
        {
            Some(node) =>
            {
                let scope = ScopeNode::from_node(file, node)?;
                debug!(
                    kind = ?scope.as_ref().map(|s| s.kind),
                    span = ?scope.as_ref().map(|s| s.span),
                    "resolved scope"
                );
                Ok(scope)
            }
            None =>
            {
                debug!("range is outside every method and class");
                Ok(None)
            }
        }
    }
}

/// First captured node, in document order, whose rows contain `rows`.
fn first_containing<'t>(
    query: &Query,
    file: &'t SourceFile,
    (start_row, end_row): (usize, usize),
) -> Option<Node<'t>>
{
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(
        query,
        file.tree()
            .root_node(),
        file.bytes(),
    );

    while let Some(m) = matches.next()
    {
        for cap in m.captures
        {
            let node = cap.node;
            if node
                .start_position()
                .row
                <= start_row
                && end_row
                    <= node
                        .end_position()
                        .row
            {
                return Some(node);
            }
        }
    }

    None
}
