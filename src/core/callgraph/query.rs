//! Query texts sent to the engine.
//!
//! Each query ends in `.toJson` so its result is printed as one JSON string
//! literal on a `val resN: String = ...` line.

use std::{path::Path, sync::LazyLock};

use regex::Regex;

use crate::core::target::LineRange;

/// Callee names must look like a plain identifier. Operators and synthetic
/// calls such as `<operator>.assignment` are dropped.
pub const IDENT_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9]*$";

pub static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENT_PATTERN).expect("identifier pattern is valid"));

/// Quote `s` as a Scala string literal.
pub fn scala_string(s: &str) -> String
{
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars()
    {
        match c
        {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn import_cpg(cpg: &Path) -> String
{
    format!("importCpg({})", scala_string(&cpg.to_string_lossy()))
}

pub fn import_code(
    input: &Path,
    project: &str,
) -> String
{
    format!(
        "importCode(inputPath={}, projectName={})",
        scala_string(&input.to_string_lossy()),
        scala_string(project)
    )
}

/// Methods whose line span intersects `range`.
fn intersects(range: LineRange) -> String
{
    format!(
        "m => m.lineNumber.isDefined && m.lineNumberEnd.isDefined && m.lineNumber.get <= {} && \
         m.lineNumberEnd.get >= {}",
        range.end, range.start
    )
}

pub fn method_signature(range: LineRange) -> String
{
    format!("cpg.method.filter({}).map(m => m.fullName).toJson", intersects(range))
}

pub fn callers(signature: &str) -> String
{
    format!(
        "cpg.call.filter(c => c.methodFullName == {}).map(c => (c.methodFullName, c.lineNumber)).toJson",
        scala_string(signature)
    )
}

pub fn callees(range: LineRange) -> String
{
    format!(
        "cpg.method.filter({}).call.filter(c => c.name.matches({})).toJson",
        intersects(range),
        scala_string(IDENT_PATTERN)
    )
}

/// Join statements into one stdin script, newline terminated.
pub fn script<S: AsRef<str>>(statements: &[S]) -> String
{
    let mut out = String::new();
    for s in statements
    {
        out.push_str(s.as_ref());
        out.push('\n');
    }
    out
}
