use anyhow::Result;
use bugctx::cli::{AppContext, Cli, Commands};
use bugctx::core::inspect::Direction;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Context(args) => bugctx::context_run(args, &ctx),
        Commands::Scope(args) => bugctx::core::inspect::scope_run(args, &ctx),
        Commands::Callers(args) => bugctx::core::inspect::calls_run(args, Direction::Callers, &ctx),
        Commands::Callees(args) => bugctx::core::inspect::calls_run(args, Direction::Callees, &ctx),
        Commands::Graph(args) => bugctx::core::inspect::graph_run(args, &ctx),
        Commands::Init(args) => bugctx::infra::config::init(args, &ctx),
        Commands::Completions(args) => bugctx::completion::run(args, &ctx),
    }
}

/// Logs go to stderr so reports on stdout stay clean. RUST_LOG wins over -v.
fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
