//! Scraping JSON results out of a REPL transcript.
//!
//! The engine echoes a colored REPL session, not clean JSON. The result of
//! a `.toJson` query shows up on a line such as
//!
//! ```text
//! val res1: String = "[{\"name\":\"add\",\"lineNumber\":12}]"
//! ```
//!
//! Recovery steps, in order:
//! 1. strip ANSI color escapes from each line
//! 2. take the first line carrying both `val res` and `String = `
//! 3. keep what follows the marker, trimmed
//! 4. peel symmetric `"`/`'` pairs (repeatedly: `"""..."""` too)
//! 5. turn `\"` back into `"`
//! 6. decode JSON; a string result was double-encoded, decode once more
//!
//! Step 6 is tried on the peeled payload before step 5 runs, since raw
//! (triple-quoted or bare) JSON with escaped quotes in its strings is
//! already valid. If neither form decodes, the payload is retried as a
//! quoted string literal, which copes with escaped backslashes that the
//! naive unescape in step 5 breaks.
//!
//! Everything here is pure so recorded transcripts can be replayed in tests.

use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

/// Lines holding a query result start like `val res3: String = `.
const RESULT_PREFIX: &str = "val res";
const RESULT_MARKER: &str = "String = ";

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI escape pattern is valid"));

/// Why a transcript yielded no usable result.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError
{
    #[error("no `val res...: String = ` line in engine output")]
    MarkerNotFound,

    #[error("result payload is not valid JSON")]
    Json
    {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON list, found {found}")]
    Shape
    {
        found: &'static str,
    },
}

/// Remove terminal color sequences from one line.
pub fn strip_ansi(line: &str) -> Cow<'_, str>
{
    ANSI_ESCAPE.replace_all(line, "")
}

/// Steps 1–4: the result text after the marker, outer quotes peeled.
fn peeled_payload(raw: &str) -> Result<String, TranscriptError>
{
    for line in raw.lines()
    {
        let clean = strip_ansi(line);

        if !clean.contains(RESULT_PREFIX)
        {
            continue;
        }
        let Some(at) = clean.find(RESULT_MARKER)
        else
        {
            continue;
        };

        return Ok(peel_quotes(clean[at + RESULT_MARKER.len()..].trim()).to_string());
    }

    Err(TranscriptError::MarkerNotFound)
}

/// Steps 1–5: locate the result line and return the cleaned payload.
pub fn extract_payload(raw: &str) -> Result<String, TranscriptError>
{
    Ok(unescape_quotes(&peeled_payload(raw)?))
}

/// Steps 1–6: decode the query result as JSON.
pub fn parse_transcript(raw: &str) -> Result<Value, TranscriptError>
{
    let peeled = peeled_payload(raw)?;

    if let Ok(value) = decode(&peeled)
    {
        return Ok(value);
    }

    match decode(&unescape_quotes(&peeled))
    {
        Ok(value) => Ok(value),
        Err(first) => decode_literal(raw).ok_or(first),
    }
}

fn unescape_quotes(payload: &str) -> String
{
    payload.replace("\\\"", "\"")
}

/// Decode and insist on a top-level list.
pub fn parse_list(raw: &str) -> Result<Vec<Value>, TranscriptError>
{
    match parse_transcript(raw)?
    {
        Value::Array(items) => Ok(items),
        other => Err(TranscriptError::Shape { found: json_kind(&other) }),
    }
}

/// JSON decode, unwrapping one level of string double-encoding.
fn decode(payload: &str) -> Result<Value, TranscriptError>
{
    let json_err = |source| TranscriptError::Json { payload: payload.to_string(), source };

    let value: Value = serde_json::from_str(payload).map_err(json_err)?;

    match value
    {
        Value::String(inner) => serde_json::from_str(&inner).map_err(json_err),
        value => Ok(value),
    }
}

/// Fallback: read the text after the marker as one quoted string literal.
fn decode_literal(raw: &str) -> Option<Value>
{
    let line = raw
        .lines()
        .map(strip_ansi)
        .find(|l| l.contains(RESULT_PREFIX) && l.contains(RESULT_MARKER))?;

    let at = line.find(RESULT_MARKER)? + RESULT_MARKER.len();
    let literal: String = serde_json::from_str(line[at..].trim()).ok()?;

    decode(&literal).ok()
}

/// Strip matching outer quote pairs until none remain.
fn peel_quotes(mut s: &str) -> &str
{
    while s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s = &s[1..s.len() - 1];
    }
    s
}

fn json_kind(v: &Value) -> &'static str
{
    match v
    {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
