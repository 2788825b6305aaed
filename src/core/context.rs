//! Context assembly: one record per bug location, numbered across the batch.
//!
//! Each file is parsed once and every range in it is resolved against that
//! tree. A missing piece never drops a record; it stays `None` (or
//! `Unavailable` for the call graph) and the renderer prints a marker.
//!
//! With `jobs > 1` files are assembled on a bounded rayon pool. Bug numbers
//! are fixed up front from per-file range counts, so the output is the same
//! as the sequential path.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    cli::{AppContext, ContextArgs},
    core::{
        callgraph::{CallGraphClient, CallGraphError, CallSite, CallerSite, JoernProcess, QueryEngine},
        comment::{CommentAssociator, CommentBlock},
        report::{render_json, render_report},
        scope::{ScopeNode, ScopeResolver},
        source::{SourceFile, SourceParser},
        target::{BugReport, BugTarget, LineRange},
    },
    infra::config,
};

/// Call-graph part of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallGraphContext
{
    Resolved
    {
        callers: Vec<CallerSite>,
        callees: Vec<CallSite>,
    },
    Unavailable
    {
        reason: String,
    },
}

impl CallGraphContext
{
    fn unavailable(reason: impl Into<String>) -> Self
    {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn callers(&self) -> &[CallerSite]
    {
        match self
        {
            Self::Resolved { callers, .. } => callers,
            Self::Unavailable { .. } => &[],
        }
    }

    pub fn callees(&self) -> &[CallSite]
    {
        match self
        {
            Self::Resolved { callees, .. } => callees,
            Self::Unavailable { .. } => &[],
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str>
    {
        match self
        {
            Self::Resolved { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

/// Everything known about one bug location. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextRecord
{
    /// 1-based, contiguous across the whole report
    pub index: usize,
    pub file: PathBuf,
    pub range: LineRange,
    /// The bug lines, terminators included
    pub bug_text: Option<String>,
    pub scope: Option<ScopeNode>,
    pub comment: Option<CommentBlock>,
    pub call_graph: CallGraphContext,
}

enum GraphState<E>
{
    Disabled,
    Attached(CallGraphClient<E>),
}

pub struct ContextAssembler<E = JoernProcess>
{
    parser: SourceParser,
    scopes: ScopeResolver,
    comments: CommentAssociator,
    graph: GraphState<E>,
}

impl ContextAssembler
{
    /// Scope and comment context only; call-graph fields come out unavailable.
    pub fn new(parser: SourceParser) -> Result<Self>
    {
        Ok(Self {
            scopes: ScopeResolver::new(parser.clone())?,
            comments: CommentAssociator::new(parser.clone())?,
            parser,
            graph: GraphState::Disabled,
        })
    }
}

impl<E: QueryEngine> ContextAssembler<E>
{
    /// Attach a call-graph client. An unloaded client is fine: its records
    /// report the graph as unavailable.
    pub fn with_call_graph<F: QueryEngine>(
        self,
        client: CallGraphClient<F>,
    ) -> ContextAssembler<F>
    {
        ContextAssembler {
            parser: self.parser,
            scopes: self.scopes,
            comments: self.comments,
            graph: GraphState::Attached(client),
        }
    }

    /// Sequential assembly in report order.
    pub fn assemble(
        &self,
        report: &BugReport,
    ) -> Result<Vec<ContextRecord>, CallGraphError>
    {
        let mut records = Vec::with_capacity(report.bug_count());
        let mut next = 1;

        for target in &report.targets
        {
            records.extend(self.assemble_target(target, next)?);
            next += target
                .ranges
                .len();
        }

        Ok(records)
    }

    /// Assembly over at most `jobs` threads, ticking `progress` once per bug.
    #[instrument(skip(self, report, progress), fields(bugs = report.bug_count()))]
    pub fn assemble_with(
        &self,
        report: &BugReport,
        jobs: usize,
        progress: &ProgressBar,
    ) -> Result<Vec<ContextRecord>>
    {
        let starts = first_indices(report);

        let run = |target: &BugTarget, start: usize| {
            let records = self.assemble_target(target, start);
            progress.inc(
                target
                    .ranges
                    .len() as u64,
            );
            records
        };

        let per_file: Vec<Vec<ContextRecord>> = if jobs <= 1
        {
            report
                .targets
                .iter()
                .zip(starts)
                .map(|(t, s)| run(t, s))
                .collect::<Result<_, _>>()?
        }
        else
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .context("Failed to build worker pool")?;

            pool.install(|| {
                report
                    .targets
                    .par_iter()
                    .zip(starts)
                    .map(|(t, s)| run(t, s))
                    .collect::<Result<_, _>>()
            })?
        };

        Ok(per_file
            .into_iter()
            .flatten()
            .collect())
    }

    /// Records for one file, numbered from `first`.
    #[instrument(skip(self, target), fields(file = %target.file.display(), ranges = target.ranges.len()))]
    fn assemble_target(
        &self,
        target: &BugTarget,
        first: usize,
    ) -> Result<Vec<ContextRecord>, CallGraphError>
    {
        let file = match self
            .parser
            .parse(&target.file)
        {
            Ok(file) => Some(file),
            Err(e) =>
            {
                warn!(error = %e, "source unavailable, emitting empty records");
                None
            }
        };

        target
            .ranges
            .iter()
            .enumerate()
            .map(|(i, &range)| match &file
            {
                Some(file) => self.assemble_one(file, first + i, range),
                None => Ok(ContextRecord {
                    index: first + i,
                    file: target
                        .file
                        .clone(),
                    range,
                    bug_text: None,
                    scope: None,
                    comment: None,
                    call_graph: CallGraphContext::unavailable("source file unavailable"),
                }),
            })
            .collect()
    }

    fn assemble_one(
        &self,
        file: &SourceFile,
        index: usize,
        range: LineRange,
    ) -> Result<ContextRecord, CallGraphError>
    {
        let bug_text = file
            .lines_text(range)
            .unwrap_or_else(|e| {
                warn!(error = %e, range = %range, "bug lines unreadable");
                None
            })
            .map(str::to_string);

        let scope = self
            .scopes
            .resolve_in(file, range)
            .unwrap_or_else(|e| {
                warn!(error = %e, range = %range, "scope text unreadable");
                None
            });

        let comment = scope
            .as_ref()
            .and_then(|s| {
                self.comments
                    .find_in(file, s)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "comment text unreadable");
                        None
                    })
            });

        let call_graph = match (&scope, &self.graph)
        {
            (None, _) => CallGraphContext::unavailable("no enclosing scope"),
            (Some(_), GraphState::Disabled) => CallGraphContext::unavailable("call graph disabled"),
            (Some(_), GraphState::Attached(client)) if !client.is_loaded() =>
            {
                CallGraphContext::unavailable("call graph not loaded")
            }
            (Some(_), GraphState::Attached(client)) =>
            {
                match (client.lookup_callers(file, range)?, client.lookup_callees(file, range)?)
                {
                    (Some(callers), Some(callees)) => CallGraphContext::Resolved { callers, callees },
                    // An empty list here would read as "no callers"
                    _ => CallGraphContext::unavailable("call graph query failed"),
                }
            }
        };

        debug!(index, range = %range, scope = scope.is_some(), comment = comment.is_some(), "assembled");

        Ok(ContextRecord {
            index,
            file: file
                .path()
                .to_path_buf(),
            range,
            bug_text,
            scope,
            comment,
            call_graph,
        })
    }
}

/// Bug number of each target's first range (prefix sums of range counts).
fn first_indices(report: &BugReport) -> Vec<usize>
{
    report
        .targets
        .iter()
        .scan(1, |next, t| {
            let first = *next;
            *next += t
                .ranges
                .len();
            Some(first)
        })
        .collect()
}

/// `bugctx context`: assemble and print the report.
pub fn run(
    args: ContextArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = config::load_config()?;

    let report = parse_targets(&args.targets, &cfg.source.default_file())?;

    if ctx.dry_run
    {
        let mut index = 1;
        for target in &report.targets
        {
            for range in &target.ranges
            {
                println!("bug #{index}: {}:{range}", target.file.display());
                index += 1;
            }
        }
        return Ok(());
    }

    let assembler = ContextAssembler::new(SourceParser::new())?;

    let assembler = if args.no_graph
    {
        assembler
    }
    else
    {
        let mut client = CallGraphClient::from_config(&cfg.engine);
        let project = args
            .project
            .as_deref()
            .unwrap_or(&cfg.engine.project);
        if !client.load(project) && !ctx.quiet
        {
            eprintln!("(warn) no graph for project '{project}'; call-graph context unavailable");
        }
        assembler.with_call_graph(client)
    };

    let pb = progress_bar(report.bug_count(), ctx);
    let records = assembler.assemble_with(&report, args.jobs, &pb)?;
    pb.finish_and_clear();

    info!(records = records.len(), "report assembled");

    let out = if args.json
    {
        render_json(&records)?
    }
    else
    {
        render_report(&records, args.style.unwrap_or(cfg.report.style))
    };

    match &args.output
    {
        Some(path) =>
        {
            write_output(path, &out)?;
            if !ctx.quiet
            {
                eprintln!("Wrote {} bug context(s) to {}", records.len(), path.display());
            }
        }
        None => print!("{out}"),
    }

    Ok(())
}

/// Parse CLI targets, printing a labelled diagnostic for the bad one.
pub fn parse_targets(
    inputs: &[String],
    default_file: &Path,
) -> Result<BugReport>
{
    BugReport::parse_all(inputs, Some(default_file)).map_err(|e| {
        let summary = e.to_string();
        eprintln!("{:?}", miette::Report::new(e));
        anyhow::anyhow!(summary)
    })
}

fn progress_bar(
    len: usize,
    ctx: &AppContext,
) -> ProgressBar
{
    if ctx.quiet
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} bugs")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn write_output(
    path: &Path,
    content: &str,
) -> Result<()>
{
    if let Some(parent) = path.parent()
        && !parent
            .as_os_str()
            .is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn report(targets: &[(&str, &[(usize, usize)])]) -> BugReport
    {
        BugReport::new(
            targets
                .iter()
                .map(|(f, rs)| BugTarget {
                    file: PathBuf::from(f),
                    ranges: rs
                        .iter()
                        .map(|&(a, b)| LineRange::new(a, b).unwrap())
                        .collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn first_indices_are_prefix_sums()
    {
        let r = report(&[("A.java", &[(1, 1), (2, 2)]), ("B.java", &[(3, 3)]), ("C.java", &[(1, 2)])]);

        assert_eq!(first_indices(&r), vec![1, 3, 4]);
    }

    #[test]
    fn unreadable_file_still_yields_numbered_records()
    {
        let r = report(&[("/no/such/A.java", &[(1, 1), (4, 6)])]);
        let records = ContextAssembler::new(SourceParser::new())
            .unwrap()
            .assemble(&r)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].index, 2);
        assert_eq!(records[1].range, LineRange::new(4, 6).unwrap());
        assert!(records[1].bug_text.is_none());
        assert!(records[1].scope.is_none());
        assert_eq!(
            records[1]
                .call_graph
                .unavailable_reason(),
            Some("source file unavailable")
        );
    }

    #[test]
    fn range_past_end_of_file_has_no_bug_text()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, "class A {\n    int x;\n}\n").unwrap();

        let r = BugReport::new(vec![BugTarget { file: path, ranges: vec![LineRange::new(2, 9).unwrap()] }]);
        let records = ContextAssembler::new(SourceParser::new())
            .unwrap()
            .assemble(&r)
            .unwrap();

        assert!(records[0].bug_text.is_none());
        assert!(records[0].scope.is_none());
    }
}
