//! Documentation lookup for a resolved scope.
//!
//! A comment belongs to a scope when it ends on the line directly above
//! the declaration, or on the declaration's own first line ahead of it
//! (`/* hot path */ void f()`). One blank line of separation is enough to
//! disqualify a comment; callers must treat "no comment" as common.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

use crate::core::{
    scope::ScopeNode,
    source::{SourceError, SourceFile, SourceParser},
    target::LineRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind
{
    /// `// ...`
    Line,
    /// `/* ... */`
    Block,
    /// `/** ... */`
    Doc,
}

/// Comment text attached to exactly one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentBlock
{
    pub kind: CommentKind,
    pub span: LineRange,
    pub text: String,
}

pub struct CommentAssociator
{
    parser: SourceParser,
    comments: Query,
}

impl CommentAssociator
{
    pub fn new(parser: SourceParser) -> Result<Self>
    {
        let comments = Query::new(
            parser.language(),
            r#"
            (block_comment) @comment
            (line_comment) @comment
            "#,
        )
        .context("create comment query")?;

        Ok(Self { parser, comments })
    }

    /// Re-parse `path` and look for the comment preceding `scope`.
    #[instrument(skip(self, scope), fields(path = %path.display(), scope = %scope.span))]
    pub fn find_preceding_comment(
        &self,
        path: &Path,
        scope: &ScopeNode,
    ) -> Option<CommentBlock>
    {
        let found = self
            .parser
            .parse(path)
            .and_then(|file| self.find_in(&file, scope));

        found.unwrap_or_else(|e| {
            warn!(error = %e, "comment lookup failed");
            None
        })
    }

    /// First comment, in enumeration order, adjacent to `scope`.
    pub fn find_in(
        &self,
        file: &SourceFile,
        scope: &ScopeNode,
    ) -> Result<Option<CommentBlock>, SourceError>
    {
        let (scope_row, _) = scope
            .span
            .rows();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(
            &self.comments,
            file.tree()
                .root_node(),
            file.bytes(),
        );

        while let Some(m) = matches.next()
        {
            for cap in m.captures
            {
                let node = cap.node;
                let end_row = node
                    .end_position()
                    .row;

                let adjacent = end_row + 1 == scope_row || end_row == scope_row;

                // Same-line comments only count when they sit before the declaration
                if adjacent && node.end_byte() <= scope.start_byte
                {
                    let block = to_block(file, node)?;
                    debug!(span = %block.span, "found preceding comment");
                    return Ok(Some(block));
                }
            }
        }

        Ok(None)
    }
}

fn to_block(
    file: &SourceFile,
    node: Node<'_>,
) -> Result<CommentBlock, SourceError>
{
    let text = file.node_text(node)?;

    let kind = if node.kind() == "line_comment"
    {
        CommentKind::Line
    }
    else if text.starts_with("/**") && text != "/**/"
    {
        CommentKind::Doc
    }
    else
    {
        CommentKind::Block
    };

    Ok(CommentBlock {
        kind,
        span: LineRange {
            start: node
                .start_position()
                .row
                + 1,
            end: node
                .end_position()
                .row
                + 1,
        },
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::scope::ScopeResolver;

    fn scope_and_comment(
        src: &str,
        line: usize,
    ) -> Option<CommentBlock>
    {
        let parser = SourceParser::new();
        let file = parser
            .parse_bytes(Path::new("C.java"), src.as_bytes().to_vec())
            .unwrap();
        let scope = ScopeResolver::new(parser.clone())
            .unwrap()
            .resolve_in(&file, LineRange::line(line).unwrap())
            .unwrap()
            .expect("scope");

        CommentAssociator::new(parser)
            .unwrap()
            .find_in(&file, &scope)
            .unwrap()
    }

    #[test]
    fn javadoc_directly_above_is_found()
    {
        let src = "\
class C {
    /**
     * Adds one.
     */
    int inc(int x) {
        return x + 1;
    }
}
";
        let c = scope_and_comment(src, 6).unwrap();

        assert_eq!(c.kind, CommentKind::Doc);
        assert_eq!(c.span, LineRange::new(2, 4).unwrap());
        assert!(c.text.contains("Adds one."));
    }

    #[test]
    fn line_comment_directly_above_is_found()
    {
        let src = "\
class C {
    // overloaded version
    int inc(int x, int by) {
        return x + by;
    }
}
";
        let c = scope_and_comment(src, 4).unwrap();

        assert_eq!(c.kind, CommentKind::Line);
        assert_eq!(c.text, "// overloaded version");
    }

    #[test]
    fn blank_line_separation_disqualifies()
    {
        let src = "\
class C {
    // detached note

    int inc(int x) {
        return x + 1;
    }
}
";
        assert!(scope_and_comment(src, 5).is_none());
    }

    #[test]
    fn same_line_comment_before_declaration_counts()
    {
        let src = "\
class C {
    int a;
    /* hot */ int inc(int x) {
        return x + 1;
    }
}
";
        let c = scope_and_comment(src, 4).unwrap();

        assert_eq!(c.kind, CommentKind::Block);
        assert_eq!(c.text, "/* hot */");
    }

    #[test]
    fn comment_inside_body_is_not_documentation()
    {
        let src = "\
class C {
    int a;
    int inc(int x) { // bump
        return x + 1;
    }
}
";
        assert!(scope_and_comment(src, 4).is_none());
    }

    #[test]
    fn only_the_last_of_stacked_line_comments_is_adjacent()
    {
        let src = "\
class C {
    // first
    // second
    int inc(int x) {
        return x + 1;
    }
}
";
        let c = scope_and_comment(src, 5).unwrap();

        assert_eq!(c.text, "// second");
    }
}
