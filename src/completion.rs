//! `bugctx completions <SHELL>`: completion scripts for the `bugctx` binary.
//!
//! Without `--out-dir` the script goes to stdout so it can be piped straight
//! into a shell's completion directory.

use std::{fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Generator, Shell as CompletionShell, generate};

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "bugctx";

impl From<Shell> for CompletionShell
{
    fn from(shell: Shell) -> Self
    {
        match shell
        {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Completion script for `shell`.
pub fn render(shell: Shell) -> Vec<u8>
{
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(CompletionShell::from(shell), &mut cmd, BIN_NAME, &mut buf);
    buf
}

/// File the script is written to under `dir` (`bugctx.bash`, `_bugctx`, ...).
pub fn script_path(
    shell: Shell,
    dir: &std::path::Path,
) -> PathBuf
{
    dir.join(CompletionShell::from(shell).file_name(BIN_NAME))
}

pub fn run(
    args: CompletionsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let dir = match args.out_dir
    {
        Some(dir) if !args.stdout => dir,
        _ =>
        {
            std::io::stdout()
                .write_all(&render(args.shell))
                .context("Failed to write completion script")?;
            return Ok(());
        }
    };

    let path = script_path(args.shell, &dir);

    if ctx.dry_run
    {
        println!("would write {}", path.display());
        return Ok(());
    }

    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fs::write(&path, render(args.shell)).with_context(|| format!("Failed to write {}", path.display()))?;

    if !ctx.quiet
    {
        eprintln!("Wrote {} completion to {}", CompletionShell::from(args.shell), path.display());
    }
    Ok(())
}
