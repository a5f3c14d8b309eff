use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use edu_video_ranker::observability::Telemetry;
use edu_video_ranker::{ComparisonEngine, EngineConfig, VideoInput};

/// Compare 2 to 10 educational videos and recommend one.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding an array of video inputs
    #[arg(long, env = "RANKER_INPUT")]
    input: PathBuf,

    /// YAML engine configuration (defaults and RANKER_* variables otherwise)
    #[arg(long, env = "RANKER_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,

    /// Print Prometheus metrics to stderr after the run
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = Telemetry::new().context("failed to initialize telemetry")?;

    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::from_env().context("failed to load config from environment")?,
    };
    let engine = ComparisonEngine::new(config)
        .context("invalid engine configuration")?
        .with_metrics(telemetry.metrics());

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let inputs: Vec<VideoInput> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse video inputs in {}", cli.input.display()))?;
    info!(videos = inputs.len(), input = %cli.input.display(), "loaded comparison batch");

    let result = engine.compare(&inputs).context("comparison failed")?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("failed to serialize comparison result")?;
    println!("{rendered}");

    if cli.metrics {
        eprint!("{}", telemetry.render_prometheus());
    }
    Ok(())
}
