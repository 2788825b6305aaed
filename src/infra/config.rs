use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Config files looked up in the working directory; the first one found wins.
pub const CONFIG_FILES: [&str; 4] = ["bugctx.toml", "bugctx.yaml", "bugctx.json", ".bugctx.toml"];

/// Older deployments configured the engine through these variables.
const LEGACY_ENV: [(&str, &str); 3] = [
    ("JOERN_EXECUTABLE", "engine.executable"),
    ("JOERN_DIRECTORY", "engine.home"),
    ("JAVA_FILE_PATH", "source.default_file"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// External graph-query engine
    pub engine: EngineConfig,

    /// Source defaults for bare range targets
    pub source: SourceConfig,

    /// Report rendering
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    pub executable: PathBuf,
    /// Directory holding `workspace/<project>/cpg.bin`
    pub home: PathBuf,
    pub project: String,
    /// Per-query limit in seconds; 0 waits forever
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig
{
    pub default_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig
{
    pub style: ReportStyle,
}

/// Which sections a text report carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle
{
    /// Scope and comment only
    Basic,
    /// Scope, comment, callers and callees
    #[default]
    Full,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            executable: PathBuf::from("/usr/local/bin/joern"),
            home: PathBuf::from("/usr/local/share/joern"),
            project: "test_program".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for SourceConfig
{
    fn default() -> Self
    {
        Self { default_file: PathBuf::from("test_programs/test_program.java") }
    }
}

impl EngineConfig
{
    pub fn executable(&self) -> PathBuf
    {
        expand(&self.executable)
    }

    pub fn home(&self) -> PathBuf
    {
        expand(&self.home)
    }

    pub fn timeout(&self) -> Option<Duration>
    {
        (self.timeout_secs > 0).then_some(Duration::from_secs(self.timeout_secs))
    }
}

impl SourceConfig
{
    pub fn default_file(&self) -> PathBuf
    {
        expand(&self.default_file)
    }
}

fn expand(path: &Path) -> PathBuf
{
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Load from the working directory and the process environment.
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."), std::env::vars().collect())
}

/// Defaults, then the first config file in `dir`, then `BUGCTX_*` variables
/// (`BUGCTX_ENGINE__HOME`), then the legacy engine variables.
pub fn load_config_from(
    dir: &Path,
    env: config::Map<String, String>,
) -> Result<Config>
{
    let defaults =
        config::Config::try_from(&Config::default()).context("Failed to encode default configuration")?;

    let mut builder = config::Config::builder().add_source(defaults);

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BUGCTX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(env.clone())),
    );

    for (var, key) in LEGACY_ENV
    {
        builder = builder
            .set_override_option(key, env.get(var).cloned())
            .with_context(|| format!("Failed to apply {var}"))?;
    }

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
