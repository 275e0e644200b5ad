//! benches/imagenet/throughput.rs
//!
//! Times steps of `sharded_batches` over a directory of ImageNet shards.
//!
//! To run this script:
//! cargo run --release --bin imagenet_throughput -- /path/to/imagenet \
//!     --output benches/{benchmark_result_name}.json

use anyhow::{Context, Result};
use clap::Parser;
use imagenet_input::{ImagenetConfig, ImagenetDataSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Times training or evaluation steps over a directory of ImageNet TFRecord shards
#[derive(Parser, Debug)]
#[command(name = "imagenet_throughput")]
#[command(about = "Measure ImageNet input pipeline throughput")]
struct Args {
    /// Directory holding train-*/validation-* shards
    data_dir: PathBuf,

    /// Global batch size
    #[arg(short, long, default_value = "256")]
    batch_size: usize,

    /// Number of devices the batch is split across
    #[arg(short, long, default_value = "1")]
    num_shards: usize,

    /// Number of steps to time (pipeline start-up is reported separately)
    #[arg(short, long, default_value = "20")]
    steps: usize,

    /// Passes over the data; the run fails if they end before `steps`
    #[arg(long)]
    num_epochs: Option<usize>,

    /// Read the validation split with evaluation preprocessing
    #[arg(long)]
    eval: bool,

    /// Random seed
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Optional TOML pipeline configuration (seed flag still applies)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the JSON report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ============================================================================
// Benchmark Result Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ThroughputReport {
    data_dir: String,
    split: String,
    batch_size: usize,
    num_shards: usize,
    steps: usize,
    seed: u64,
    startup_ms: f64,
    images_per_sec: f64,
    avg_step_ms: f64,
    p50_step_ms: f64,
    p95_step_ms: f64,
    p99_step_ms: f64,
    std_step_ms: f64,
}

// ============================================================================
// Utility Functions
// ============================================================================

fn percentile(data: &mut [f64], p: f64) -> f64 {
    data.sort_by(|a, b| a.total_cmp(b));
    let idx = ((p / 100.0) * (data.len() - 1) as f64).round() as usize;
    data[idx]
}

fn mean_and_std(data: &[f64]) -> (f64, f64) {
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    (mean, variance.sqrt())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    anyhow::ensure!(args.steps > 0, "--steps must be greater than 0");

    let mut config = match &args.config {
        Some(path) => ImagenetConfig::from_file(path)?,
        None => ImagenetConfig::default(),
    };
    config.seed = Some(args.seed);
    let dataset = ImagenetDataSet::with_config(&args.data_dir, config)?;
    let is_training = !args.eval;

    info!(
        data_dir = %args.data_dir.display(),
        batch_size = args.batch_size,
        num_shards = args.num_shards,
        steps = args.steps,
        is_training,
        "Starting throughput run"
    );

    let start = Instant::now();
    let mut steps = dataset.sharded_batches(
        args.batch_size,
        is_training,
        args.num_shards,
        args.num_epochs,
    )?;
    let startup_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(startup_ms, "Pipeline built");

    let mut step_ms = Vec::with_capacity(args.steps);
    for step in 0..args.steps {
        let start = Instant::now();
        let batch = steps
            .next()
            .with_context(|| format!("Data ran out after {} steps", step))?
            .with_context(|| format!("Step {} failed", step))?;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        step_ms.push(elapsed);
        info!(step, shards = batch.num_shards(), elapsed_ms = elapsed, "Step done");
    }

    let (avg, std) = mean_and_std(&step_ms);
    let images_per_step = (args.batch_size / args.num_shards * args.num_shards) as f64;
    let report = ThroughputReport {
        data_dir: args.data_dir.display().to_string(),
        split: if is_training { "train" } else { "validation" }.to_string(),
        batch_size: args.batch_size,
        num_shards: args.num_shards,
        steps: args.steps,
        seed: args.seed,
        startup_ms,
        images_per_sec: images_per_step / (avg / 1000.0),
        avg_step_ms: avg,
        p50_step_ms: percentile(&mut step_ms, 50.0),
        p95_step_ms: percentile(&mut step_ms, 95.0),
        p99_step_ms: percentile(&mut step_ms, 99.0),
        std_step_ms: std,
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
