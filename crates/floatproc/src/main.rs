use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use floatproc_core::{AppConfig, Pipeline, PipelineOutput, RunMode};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "floatproc.toml";

/// Decode, calibrate and process BGC float transmissions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Application configuration (defaults to $FLOATPROC_CONFIG, then ./floatproc.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one incoming transmission; any error aborts
    Rt(RealtimeArgs),
    /// Reprocess every stored transmission of one or more floats
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct RealtimeArgs {
    /// Navis `.msg` file, or the `.fix`/`.cast` file of a Provor profile
    path: PathBuf,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Float user ids such as `n0572`
    user_ids: Vec<String>,
    /// Process every float found under the raw data directory
    #[arg(long, conflicts_with = "user_ids")]
    all: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| env::var_os("FLOATPROC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let app = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Rt(args) => handle_realtime(app, args),
        Command::Batch(args) => handle_batch(app, args),
    }
}

fn handle_realtime(app: AppConfig, args: RealtimeArgs) -> Result<()> {
    let mut pipeline = Pipeline::from_config(app, RunMode::Realtime);
    let output = pipeline
        .run_realtime(&args.path)
        .with_context(|| format!("failed to process {}", args.path.display()))?;

    let level = match &output {
        PipelineOutput::Decoded(_) => "L0",
        PipelineOutput::Processed(_) => "L2",
    };
    println!(
        "Processed profile {} ({} samples, {level})",
        output.key(),
        output.level0().sample_count()
    );
    Ok(())
}

fn handle_batch(app: AppConfig, args: BatchArgs) -> Result<()> {
    let user_ids = if args.all {
        discover_floats(&app)?
    } else {
        args.user_ids
    };
    if user_ids.is_empty() {
        bail!("no floats to process; pass user ids or --all");
    }
    info!(floats = user_ids.len(), "starting batch");

    let mut pipeline = Pipeline::from_config(app, RunMode::Batch);
    let report = pipeline.run_batch(&user_ids);

    println!("Processed {} profiles.", report.processed.len());
    if report.is_success() {
        return Ok(());
    }

    println!("{} failures:", report.failed.len());
    for failure in &report.failed {
        let location = failure
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| failure.user_id.clone());
        println!("  {location}: {}", failure.error);
    }
    bail!("batch finished with {} failures", report.failed.len())
}

/// Sub-directories of the raw data directory, one per float.
fn discover_floats(app: &AppConfig) -> Result<Vec<String>> {
    let pattern = app.paths.raw.join("*");
    let pattern_str = pattern
        .to_str()
        .context("raw data path is not valid UTF-8")?;

    let mut user_ids = Vec::new();
    for entry in glob::glob(pattern_str)? {
        let path = entry?;
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            user_ids.push(name.to_string());
        }
    }
    user_ids.sort();
    Ok(user_ids)
}
