//! Call-graph context from a prebuilt code-property graph.
//!
//! The client is unready until [`CallGraphClient::load`] finds the graph
//! artifact on disk. Querying an unready client is a caller bug and the only
//! error that leaves this module; every environmental failure (spawn, exit
//! status, timeout, unparsable transcript) degrades. The `lookup_*` methods
//! report a degraded query as `None`; `callers_of`/`callees_in` flatten it
//! to an empty list.

pub mod engine;
pub mod query;
pub mod transcript;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

pub use engine::{EngineError, JoernProcess, QueryEngine};
pub use transcript::{TranscriptError, parse_list, parse_transcript};

use crate::{
    core::{source::SourceFile, target::LineRange},
    infra::config::EngineConfig,
};

/// A place elsewhere in the project that invokes the resolved method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerSite
{
    pub line: usize,
    pub text: String,
}

/// A call expression inside the resolved method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite
{
    pub callee: String,
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallGraphError
{
    #[error("no graph loaded; call load() before querying")]
    NotLoaded,
}

/// Engine client bound to one graph home (`<home>/workspace/<project>/cpg.bin`).
#[derive(Debug)]
pub struct CallGraphClient<E = JoernProcess>
{
    engine: E,
    home: PathBuf,
    project: Option<String>,
}

impl CallGraphClient
{
    /// Unloaded client spawning the configured engine.
    pub fn from_config(cfg: &EngineConfig) -> Self
    {
        Self::new(JoernProcess::from_config(cfg), cfg.home())
    }
}

impl<E: QueryEngine> CallGraphClient<E>
{
    pub fn new(
        engine: E,
        home: impl Into<PathBuf>,
    ) -> Self
    {
        Self { engine, home: home.into(), project: None }
    }

    /// Where the artifact for `project` is expected.
    pub fn cpg_path(
        &self,
        project: &str,
    ) -> PathBuf
    {
        self.home
            .join("workspace")
            .join(project)
            .join("cpg.bin")
    }

    /// Attach to `project` if its artifact exists. A failed load leaves the
    /// client unready even if it was ready before.
    #[instrument(skip(self))]
    pub fn load(
        &mut self,
        project: &str,
    ) -> bool
    {
        let cpg = self.cpg_path(project);

        if cpg.is_file()
        {
            debug!(cpg = %cpg.display(), "graph loaded");
            self.project = Some(project.to_string());
            true
        }
        else
        {
            warn!(cpg = %cpg.display(), "graph artifact not found");
            self.project = None;
            false
        }
    }

    pub fn is_loaded(&self) -> bool
    {
        self.project
            .is_some()
    }

    pub fn project(&self) -> Option<&str>
    {
        self.project
            .as_deref()
    }

    /// Build and save the artifact for the sources under `input`.
    #[instrument(skip(self), fields(input = %input.display()))]
    pub fn create_graph(
        &self,
        input: &Path,
        project: &str,
    ) -> bool
    {
        if let Err(e) = std::fs::create_dir_all(&self.home)
        {
            warn!(home = %self.home.display(), error = %e, "cannot create engine home");
            return false;
        }

        let script = query::script(&[query::import_code(input, project), "save".to_string()]);

        match self
            .engine
            .run(&script)
        {
            Ok(raw) =>
            {
                debug!(transcript = %raw, "graph created");
                info!(cpg = %self.cpg_path(project).display(), "graph saved");
                true
            }
            Err(e) =>
            {
                warn!(error = %e, "graph creation failed");
                false
            }
        }
    }

    /// Full name of the first method whose span intersects `range`.
    #[instrument(skip(self), fields(range = %range))]
    pub fn method_signature(
        &self,
        range: LineRange,
    ) -> Result<Option<String>, CallGraphError>
    {
        Ok(self
            .query(&query::method_signature(range))?
            .and_then(first_signature))
    }

    /// Call sites across the project that target the method at `range`.
    /// Line text is read from `file`. Degraded queries give an empty list.
    pub fn callers_of(
        &self,
        file: &SourceFile,
        range: LineRange,
    ) -> Result<Vec<CallerSite>, CallGraphError>
    {
        Ok(self
            .lookup_callers(file, range)?
            .unwrap_or_default())
    }

    /// Like [`Self::callers_of`], but `None` when either query degraded.
    #[instrument(skip(self, file), fields(path = %file.path().display(), range = %range))]
    pub fn lookup_callers(
        &self,
        file: &SourceFile,
        range: LineRange,
    ) -> Result<Option<Vec<CallerSite>>, CallGraphError>
    {
        let Some(found) = self.query(&query::method_signature(range))?
        else
        {
            return Ok(None);
        };

        let Some(signature) = first_signature(found)
        else
        {
            debug!("no method intersects range, no callers");
            return Ok(Some(Vec::new()));
        };

        let Some(items) = self.query(&query::callers(&signature))?
        else
        {
            return Ok(None);
        };

        let sites = items
            .iter()
            .filter_map(first_line_number)
            .map(|line| CallerSite { line, text: line_text(file, line) })
            .collect::<Vec<_>>();

        debug!(signature = %signature, callers = sites.len(), "callers resolved");
        Ok(Some(sites))
    }

    /// Identifier-named calls inside methods intersecting `range`.
    /// Degraded queries give an empty list.
    pub fn callees_in(
        &self,
        file: &SourceFile,
        range: LineRange,
    ) -> Result<Vec<CallSite>, CallGraphError>
    {
        Ok(self
            .lookup_callees(file, range)?
            .unwrap_or_default())
    }

    /// Like [`Self::callees_in`], but `None` when the query degraded.
    #[instrument(skip(self, file), fields(path = %file.path().display(), range = %range))]
    pub fn lookup_callees(
        &self,
        file: &SourceFile,
        range: LineRange,
    ) -> Result<Option<Vec<CallSite>>, CallGraphError>
    {
        let Some(items) = self.query(&query::callees(range))?
        else
        {
            return Ok(None);
        };

        let sites = items
            .iter()
            .filter_map(|item| {
                let name = item
                    .get("name")?
                    .as_str()?;
                let line = as_line(item.get("lineNumber")?)?;

                query::IDENT
                    .is_match(name)
                    .then(|| CallSite { callee: name.to_string(), line, text: line_text(file, line) })
            })
            .collect::<Vec<_>>();

        debug!(callees = sites.len(), "callees resolved");
        Ok(Some(sites))
    }

    /// Run one query against the loaded graph. Only `NotLoaded` is an error;
    /// any other failure is logged and comes back as `None`.
    fn query(
        &self,
        text: &str,
    ) -> Result<Option<Vec<Value>>, CallGraphError>
    {
        let project = self
            .project
            .as_deref()
            .ok_or(CallGraphError::NotLoaded)?;

        let script = query::script(&[query::import_cpg(&self.cpg_path(project)), text.to_string()]);

        let raw = match self
            .engine
            .run(&script)
        {
            Ok(raw) => raw,
            Err(e) =>
            {
                warn!(error = %e, "engine query failed");
                return Ok(None);
            }
        };

        match transcript::parse_list(&raw)
        {
            Ok(items) => Ok(Some(items)),
            Err(e) =>
            {
                warn!(error = %e, "unusable engine response");
                debug!(transcript = %raw, query = text, "raw engine response");
                Ok(None)
            }
        }
    }
}

/// First non-empty full name in a signature query result.
fn first_signature(items: Vec<Value>) -> Option<String>
{
    items
        .into_iter()
        .next()
        .and_then(|v| match v
        {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
}

/// A positive integer line number.
fn as_line(v: &Value) -> Option<usize>
{
    v.as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| usize::try_from(n).ok())
}

/// Callers come back as bare numbers, `{"lineNumber": n}`, or tuple objects
/// like `{"_1": "A.f:void()", "_2": n}`; take the first line number found.
fn first_line_number(item: &Value) -> Option<usize>
{
    match item
    {
        Value::Object(map) => map
            .get("lineNumber")
            .and_then(as_line)
            .or_else(|| {
                map.values()
                    .find_map(as_line)
            }),
        Value::Array(parts) => parts
            .iter()
            .find_map(as_line),
        other => as_line(other),
    }
}

fn line_text(
    file: &SourceFile,
    line: usize,
) -> String
{
    file.line_text(line)
        .unwrap_or_default()
        .to_string()
}
