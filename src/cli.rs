use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::infra::config::ReportStyle;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "bugctx")]
#[command(
    about = "Turn bug line ranges into scope, comment and call-graph context for repair prompts"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the bug context report
    Context(ContextArgs),

    /// Show the enclosing scope and preceding comment of bug ranges
    Scope(ScopeArgs),

    /// List call sites of the method around a bug range
    Callers(CallArgs),

    /// List calls made inside the method around a bug range
    Callees(CallArgs),

    /// Build and save the code-property graph for a source tree
    Graph(GraphArgs),

    /// Initialize a bugctx.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ContextArgs {
    /// Bug targets: FILE:RANGES (e.g. Shelf.java:8-9,21) or bare RANGES for the default file
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Report sections (default from config)
    #[arg(long, value_enum)]
    pub style: Option<ReportStyle>,

    /// Skip call-graph queries entirely
    #[arg(long)]
    pub no_graph: bool,

    /// Graph project name (default from config)
    #[arg(long)]
    pub project: Option<String>,

    /// Assemble files on up to N threads
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Emit records as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ScopeArgs {
    /// Bug target: FILE:RANGES or bare RANGES
    pub target: String,
}

#[derive(Parser, Debug)]
pub struct CallArgs {
    /// Bug target: FILE:RANGES or bare RANGES
    pub target: String,

    /// Graph project name (default from config)
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Parser, Debug)]
pub struct GraphArgs {
    /// Source file or directory to import
    pub input: PathBuf,

    /// Graph project name (default from config)
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write `<dir>/<script>` instead of printing to stdout
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print to stdout even when --out-dir is given
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn context_flags_parse() {
        let cli = Cli::try_parse_from([
            "bugctx", "-vv", "context", "A.java:8-9", "3", "--style", "basic", "--jobs", "4",
            "--no-graph",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Context(args) => {
                assert_eq!(args.targets, vec!["A.java:8-9", "3"]);
                assert_eq!(args.style, Some(ReportStyle::Basic));
                assert_eq!(args.jobs, 4);
                assert!(args.no_graph);
            }
            _ => panic!("expected context"),
        }
    }
}
