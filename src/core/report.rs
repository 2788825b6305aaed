//! Text and JSON renderings of assembled records.
//!
//! The text form is meant to be pasted into a repair prompt. Every section
//! is always present; missing context is spelled out so a reader can tell
//! "nothing there" from "could not look".

use std::fmt::Write;

use crate::{
    core::context::{CallGraphContext, ContextRecord},
    infra::config::ReportStyle,
};

pub const NOT_FOUND: &str = "Not found";
pub const NO_COMMENT: &str = "No comments found";

/// Render all records, one blank line after each.
pub fn render_report(
    records: &[ContextRecord],
    style: ReportStyle,
) -> String
{
    let mut out = String::new();
    for record in records
    {
        render_record(&mut out, record, style);
        out.push('\n');
    }
    out
}

pub fn render_json(records: &[ContextRecord]) -> serde_json::Result<String>
{
    let mut s = serde_json::to_string_pretty(records)?;
    s.push('\n');
    Ok(s)
}

fn render_record(
    out: &mut String,
    r: &ContextRecord,
    style: ReportStyle,
)
{
    // Writing into a String cannot fail
    let _ = writeln!(out, "Bug #{}:", r.index);
    let _ = writeln!(out, "File path: {}", r.file.display());
    let _ = writeln!(out, "Bug line number(s): {}", r.range);
    let _ = writeln!(out, "Bug lines: {}", chomp(r.bug_text.as_deref().unwrap_or(NOT_FOUND)));

    match &r.scope
    {
        Some(scope) =>
        {
            let _ = writeln!(out, "Buggy node line number(s): {}", scope.span);
            let _ = writeln!(out, "Buggy node: {}", scope.text);
        }
        None =>
        {
            let _ = writeln!(out, "Buggy node line number(s): {NOT_FOUND}");
            let _ = writeln!(out, "Buggy node: {NOT_FOUND}");
        }
    }

    let comment = r
        .comment
        .as_ref()
        .map_or(NO_COMMENT, |c| c.text.as_str());
    let _ = writeln!(out, "Comments before buggy node: {comment}");

    if style == ReportStyle::Full
    {
        render_call_graph(out, &r.call_graph);
    }
}

fn render_call_graph(
    out: &mut String,
    graph: &CallGraphContext,
)
{
    if let Some(reason) = graph.unavailable_reason()
    {
        let _ = writeln!(out, "Caller(s) of function: {NOT_FOUND} ({reason})");
        let _ = writeln!(out, "Callee(s) of function: {NOT_FOUND} ({reason})");
        return;
    }

    out.push_str("Caller(s) of function:\n");
    if graph
        .callers()
        .is_empty()
    {
        out.push_str("    (none)\n");
    }
    for c in graph.callers()
    {
        let _ = writeln!(out, "    - Line {}: {}", c.line, c.text);
    }

    out.push_str("Callee(s) of function:\n");
    if graph
        .callees()
        .is_empty()
    {
        out.push_str("    (none)\n");
    }
    for c in graph.callees()
    {
        let _ = writeln!(out, "    - \"{}\" method called at line {}: {}", c.callee, c.line, c.text);
    }
}

/// Drop the trailing terminator bug text carries so `writeln!` adds just one.
fn chomp(s: &str) -> &str
{
    s.strip_suffix('\n')
        .unwrap_or(s)
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use super::*;
    use crate::core::{
        callgraph::{CallSite, CallerSite},
        comment::{CommentBlock, CommentKind},
        scope::{ScopeKind, ScopeNode},
        target::LineRange,
    };

    fn record() -> ContextRecord
    {
        ContextRecord {
            index: 1,
            file: PathBuf::from("Shelf.java"),
            range: LineRange::new(4, 4).unwrap(),
            bug_text: Some("        size += n;\n".to_string()),
            scope: Some(ScopeNode {
                kind: ScopeKind::Method,
                name: Some("add".to_string()),
                span: LineRange::new(3, 5).unwrap(),
                start_byte: 40,
                end_byte: 90,
                text: "void add(int n) {\n        size += n;\n    }".to_string(),
            }),
            comment: Some(CommentBlock {
                kind: CommentKind::Line,
                span: LineRange::line(2).unwrap(),
                text: "// grow".to_string(),
            }),
            call_graph: CallGraphContext::Resolved {
                callers: vec![CallerSite { line: 9, text: "add(1);".to_string() }],
                callees: vec![CallSite { callee: "log".to_string(), line: 4, text: "log(n);".to_string() }],
            },
        }
    }

    #[test]
    fn full_report_lists_call_sites()
    {
        insta::assert_snapshot!(render_report(&[record()], ReportStyle::Full).trim_end(), @r#"
        Bug #1:
        File path: Shelf.java
        Bug line number(s): 4
        Bug lines:         size += n;
        Buggy node line number(s): 3-5
        Buggy node: void add(int n) {
                size += n;
            }
        Comments before buggy node: // grow
        Caller(s) of function:
            - Line 9: add(1);
        Callee(s) of function:
            - "log" method called at line 4: log(n);
        "#);
    }

    #[test]
    fn basic_report_stops_after_comment()
    {
        let text = render_report(&[record()], ReportStyle::Basic);

        assert!(text.ends_with("Comments before buggy node: // grow\n\n"));
        assert!(!text.contains("Caller(s)"));
    }

    #[test]
    fn missing_context_is_marked()
    {
        let r = ContextRecord {
            bug_text: None,
            scope: None,
            comment: None,
            call_graph: CallGraphContext::Unavailable { reason: "no enclosing scope".to_string() },
            ..record()
        };

        let text = render_report(&[r], ReportStyle::Full);

        assert!(text.contains("Bug lines: Not found\n"));
        assert!(text.contains("Buggy node: Not found\n"));
        assert!(text.contains("Comments before buggy node: No comments found\n"));
        assert!(text.contains("Caller(s) of function: Not found (no enclosing scope)\n"));
    }

    #[test]
    fn json_tags_call_graph_status()
    {
        let json = render_json(&[record()]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(v[0]["call_graph"]["status"], "resolved");
        assert_eq!(v[0]["scope"]["kind"], "method");
        assert_eq!(v[0]["range"]["start"], 4);
    }
}
