//! metaindex CLI
//!
//! Builds and queries a metadata-only index of a repository.

mod signals;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use metaindex_core::{fallback_message, resolve_against, BuildMode, IndexConfig};
use metaindex_indexer::{BuildOptions, CancelFlag, IndexBuilder};
use metaindex_query::{render_json, render_table, QueryEngine, QueryOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metaindex")]
#[command(about = "Bounded, incremental, metadata-only repository index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the index
    Build(BuildArgs),

    /// Query an existing index
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Repository root to index
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Index directory (absolute or relative to the repository root)
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Build mode: incremental or full
    #[arg(long)]
    mode: Option<BuildMode>,

    /// Maximum files examined this run
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_files_per_run: Option<u64>,

    /// Wall-clock budget in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_seconds: Option<u64>,

    /// Byte budget for content probes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_read_bytes: Option<u64>,

    /// Extra directory name to exclude (repeatable)
    #[arg(long = "exclude-dir")]
    exclude_dirs: Vec<String>,

    /// Write one record segment per top-level directory
    #[arg(long)]
    sharded: bool,

    /// Also write the run report here (relative to the repository root)
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Configuration file (default: <repo-root>/.metaindex.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Index directory (default from configuration)
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Case-insensitive path substring
    #[arg(long)]
    path_contains: Option<String>,

    /// Extension, e.g. `py` or `.py`
    #[arg(long)]
    ext: Option<String>,

    /// Language name
    #[arg(long)]
    lang: Option<String>,

    /// Minimum size in bytes
    #[arg(long)]
    min_size: Option<u64>,

    /// Maximum size in bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Only files modified at or after this epoch second
    #[arg(long)]
    changed_since_epoch: Option<i64>,

    /// `all` or a top-level directory name
    #[arg(long, default_value = "all")]
    scope: String,

    /// Maximum rows returned
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Configuration file (default: ./.metaindex.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Commands::Build(args) => {
            let config = load_config(args.config.as_deref(), &args.repo_root)?;
            runtime.block_on(cmd_build(args, config))
        }
        Commands::Query(args) => {
            let config = load_config(args.config.as_deref(), Path::new("."))?;
            cmd_query(args, &config)
        }
    }
}

/// Log to stderr so stdout carries only command output. `RUST_LOG` wins over
/// the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the configuration and install logging at its level. A broken default
/// config file falls back to defaults and is reported once logging is up.
fn load_config(explicit: Option<&Path>, repo_root: &Path) -> Result<IndexConfig> {
    let config = match explicit {
        Some(path) => IndexConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match IndexConfig::try_load(repo_root) {
            Ok(config) => config,
            Err(e) => {
                let config = IndexConfig::default();
                init_logging(&config.log_level);
                tracing::warn!("{}", fallback_message(&e));
                return Ok(config);
            }
        },
    };
    init_logging(&config.log_level);
    Ok(config)
}

impl BuildArgs {
    /// Layer command-line flags over the loaded configuration.
    fn apply(&self, config: &mut IndexConfig) {
        if let Some(index_dir) = &self.index_dir {
            config.index_dir = index_dir.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(n) = self.max_files_per_run {
            config.max_files_per_run = n;
        }
        if let Some(n) = self.max_seconds {
            config.max_seconds = n;
        }
        if let Some(n) = self.max_read_bytes {
            config.max_read_bytes = n;
        }
        config.exclude_dirs.extend(self.exclude_dirs.iter().cloned());
        if self.sharded {
            config.sharded = true;
        }
    }
}

impl QueryArgs {
    fn options(&self, config: &IndexConfig) -> QueryOptions {
        QueryOptions {
            path_contains: self.path_contains.clone(),
            ext: self.ext.clone(),
            lang: self.lang.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
            changed_since_epoch: self.changed_since_epoch,
            scope: self.scope.clone(),
            limit: self
                .limit
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                .unwrap_or(config.query_limit),
        }
    }
}

async fn cmd_build(args: BuildArgs, mut config: IndexConfig) -> Result<()> {
    args.apply(&mut config);

    let mut options = BuildOptions::from_config(&args.repo_root, &config);
    options.json_out = args.json_out.clone();

    let builder = IndexBuilder::new(options)
        .with_context(|| format!("Cannot build index for {}", args.repo_root.display()))?;

    let cancel = CancelFlag::new();
    let listener = signals::cancel_on_signal(cancel.clone());

    let result = builder.run(&cancel).await;
    listener.abort();

    let summary = result.context("Build failed")?;
    println!("{}", summary.report.summary_line());

    Ok(())
}

fn cmd_query(args: QueryArgs, config: &IndexConfig) -> Result<()> {
    let index_dir = match &args.index_dir {
        Some(dir) => resolve_against(Path::new("."), dir),
        None => config.resolve_index_dir(Path::new(".")),
    };

    let options = args.options(config);
    options.validate()?;

    let engine = QueryEngine::open(&index_dir)?;
    let result = engine.query(&options)?;

    match args.format {
        OutputFormat::Table => print!("{}", render_table(&result)),
        OutputFormat::Json => println!("{}", render_json(&result)?),
    }

    Ok(())
}
