//! Shared test utilities for integration tests
//!
//! Fixture paths, a scripted in-process query engine, and (on Unix) a fake
//! engine executable for the real subprocess path.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use bugctx::core::callgraph::{EngineError, QueryEngine};
use serde_json::{Value, json};

pub const LIBRARY_SIGNATURE: &str = "Library.totalPages:int(int[])";

/// Absolute path of a checked-in fixture.
pub fn fixture(name: &str) -> PathBuf
{
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A `.toJson` result line the way the engine prints it.
pub fn transcript(value: &Value) -> String
{
    let literal = serde_json::to_string(&value.to_string()).expect("encode literal");
    format!("\x1b[33mjoern>\x1b[0m query\n\x1b[32mval\x1b[0m res1: String = {literal}\n")
}

/// Answers by query kind, so replies do not depend on call order.
pub struct ScriptedEngine
{
    pub signature: Value,
    pub callers: Value,
    pub callees: Value,
}

impl ScriptedEngine
{
    /// Answers matching `tests/fixtures/Library.java`.
    pub fn library() -> Self
    {
        Self {
            signature: json!([LIBRARY_SIGNATURE]),
            callers: json!([{"_1": LIBRARY_SIGNATURE, "_2": 24}]),
            callees: json!([
                {"name": "<operator>.assignmentPlus", "lineNumber": 9},
                {"name": "log", "lineNumber": 12},
            ]),
        }
    }
}

impl QueryEngine for ScriptedEngine
{
    fn run(
        &self,
        script: &str,
    ) -> Result<String, EngineError>
    {
        let value = if script.contains("map(m => m.fullName)")
        {
            &self.signature
        }
        else if script.contains("c.methodFullName ==")
        {
            &self.callers
        }
        else
        {
            &self.callees
        };

        Ok(transcript(value))
    }
}

/// Engine home with an (empty) artifact for `project`.
pub fn graph_home(project: &str) -> assert_fs::TempDir
{
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(format!("workspace/{project}/cpg.bin"))
        .write_binary(b"cpg")
        .expect("write cpg.bin");
    home
}

/// Executable shell script standing in for the engine.
#[cfg(unix)]
pub fn fake_engine(
    dir: &Path,
    body: &str,
) -> PathBuf
{
    use std::os::unix::fs::PermissionsExt;

    let exe = dir.join("fake-joern");
    std::fs::write(&exe, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    exe
}

/// Shell body answering the three query kinds for `Library.java`.
pub const LIBRARY_ENGINE_SCRIPT: &str = r#"input=$(cat)
case "$input" in
  *"m.fullName"*) printf '%s\n' 'val res1: String = "[\"Library.totalPages:int(int[])\"]"' ;;
  *"c.methodFullName =="*) printf '%s\n' 'val res1: String = "[{\"_1\":\"Library.totalPages:int(int[])\",\"_2\":24}]"' ;;
  *) printf '%s\n' 'val res1: String = "[{\"name\":\"log\",\"lineNumber\":12}]"' ;;
esac"#;
