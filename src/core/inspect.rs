//! Single-purpose commands: `scope`, `callers`, `callees`, `graph`.

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use tracing::instrument;

use crate::{
    cli::{AppContext, CallArgs, GraphArgs, ScopeArgs},
    core::{
        callgraph::{CallGraphClient, JoernProcess},
        comment::CommentAssociator,
        context::parse_targets,
        report::{NO_COMMENT, NOT_FOUND},
        scope::ScopeResolver,
        source::SourceParser,
        target::{BugTarget, LineRange},
    },
    infra::config::{self, EngineConfig},
};

const QUERY_FAILED: &str = "(query failed; rerun with -v for engine output)";

/// Which call-graph direction a `CallArgs` command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction
{
    Callers,
    Callees,
}

fn header(
    target: &BugTarget,
    range: LineRange,
    ctx: &AppContext,
) -> String
{
    let label = format!("{}:{range}", target.file.display());
    if ctx.no_color { label } else { label.bold().to_string() }
}

/// Print the enclosing scope and its comment for each range.
#[instrument(skip_all, fields(target = %args.target))]
pub fn scope_run(
    args: ScopeArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = config::load_config()?;
    let report = parse_targets(std::slice::from_ref(&args.target), &cfg.source.default_file())?;

    let parser = SourceParser::new();
    let resolver = ScopeResolver::new(parser.clone())?;
    let comments = CommentAssociator::new(parser.clone())?;

    for target in &report.targets
    {
        let file = parser.parse(&target.file)?;

        for &range in &target.ranges
        {
            println!("{}", header(target, range, ctx));

            let Some(scope) = resolver.resolve_in(&file, range)?
            else
            {
                println!("  scope: {NOT_FOUND}");
                continue;
            };

            let name = scope
                .name
                .as_deref()
                .unwrap_or("?");
            let kind = if ctx.no_color { scope.kind.to_string() } else { scope.kind.cyan().to_string() };
            println!("  scope: {kind} {name} (lines {})", scope.span);

            match comments.find_in(&file, &scope)?
            {
                Some(c) => println!("  comment (lines {}):\n{}", c.span, indent(&c.text)),
                None => println!("  comment: {NO_COMMENT}"),
            }

            println!("{}", indent(&scope.text));
        }
    }

    Ok(())
}

/// Run one call-graph query per range and print the sites.
#[instrument(skip_all, fields(target = %args.target, ?direction))]
pub fn calls_run(
    args: CallArgs,
    direction: Direction,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = config::load_config()?;
    let report = parse_targets(std::slice::from_ref(&args.target), &cfg.source.default_file())?;

    let project = args
        .project
        .as_deref()
        .unwrap_or(&cfg.engine.project);
    let client = connect(&cfg.engine, project)?;

    let parser = SourceParser::new();

    for target in &report.targets
    {
        let file = parser.parse(&target.file)?;

        for &range in &target.ranges
        {
            println!("{}", header(target, range, ctx));

            match direction
            {
                Direction::Callers =>
                {
                    let Some(sites) = client.lookup_callers(&file, range)?
                    else
                    {
                        println!("  {QUERY_FAILED}");
                        continue;
                    };
                    if sites.is_empty()
                    {
                        println!("  (no callers)");
                    }
                    for c in sites
                    {
                        println!("  line {:>5}: {}", c.line, c.text);
                    }
                }
                Direction::Callees =>
                {
                    let Some(sites) = client.lookup_callees(&file, range)?
                    else
                    {
                        println!("  {QUERY_FAILED}");
                        continue;
                    };
                    if sites.is_empty()
                    {
                        println!("  (no callees)");
                    }
                    for c in sites
                    {
                        let callee = if ctx.no_color { c.callee } else { c.callee.green().to_string() };
                        println!("  line {:>5}: {callee}: {}", c.line, c.text);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Create and save the graph artifact for a source tree.
#[instrument(skip_all, fields(input = %args.input.display()))]
pub fn graph_run(
    args: GraphArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = config::load_config()?;
    let project = args
        .project
        .as_deref()
        .unwrap_or(&cfg.engine.project);

    let input = args
        .input
        .canonicalize()
        .with_context(|| format!("Source path not found: {}", args.input.display()))?;

    let client = CallGraphClient::from_config(&cfg.engine);

    if ctx.dry_run
    {
        println!(
            "would import {} as '{project}' into {}",
            input.display(),
            client
                .cpg_path(project)
                .display()
        );
        return Ok(());
    }

    if !client.create_graph(&input, project)
    {
        bail!("Graph creation failed for {} (see log output)", input.display());
    }

    if !ctx.quiet
    {
        let done = if ctx.no_color { "✓".to_string() } else { "✓".green().to_string() };
        println!(
            "{done} Saved graph for '{project}' at {}",
            client
                .cpg_path(project)
                .display()
        );
    }
    Ok(())
}

fn connect(
    cfg: &EngineConfig,
    project: &str,
) -> Result<CallGraphClient<JoernProcess>>
{
    let mut client = CallGraphClient::from_config(cfg);
    if !client.load(project)
    {
        bail!(
            "No graph for project '{project}' at {}. Run `bugctx graph <INPUT> --project {project}` first.",
            client
                .cpg_path(project)
                .display()
        );
    }
    Ok(client)
}

fn indent(text: &str) -> String
{
    text.lines()
        .map(|l| format!("    {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
