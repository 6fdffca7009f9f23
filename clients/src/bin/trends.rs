//! `wpt-trends` writes whole-run pass scores over time.
//!
//! **Usage:**
//! ```text
//! wpt-trends --results <dir> --runs <runs.json> [--scoring binary|interop|interop-strict]
//!            [--from <date>] [--to <date>] [--experimental] [--output <csv>]
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::info;
use wpt_metrics::{
    init_tracing, load_runs, trends_series, Channel, MetricsConfig, MetricsPaths, Window,
};
use wpt_results::TrendMethod;

/// Compute pass-rate trends over aligned runs.
#[derive(Parser)]
#[command(name = "wpt-trends", about = "Write the pass-rate trends CSV series")]
struct Args {
    /// Metrics configuration file.
    #[arg(long, default_value = "config/metrics.toml")]
    config: PathBuf,

    /// Directory holding one results directory per run id.
    #[arg(long, default_value = "results")]
    results: PathBuf,

    /// Run manifest (JSON array of run records).
    #[arg(long, default_value = "runs.json")]
    runs: PathBuf,

    /// How tests with subtests are scored.
    #[arg(long, default_value = "binary")]
    scoring: TrendMethod,

    /// First date to score (inclusive).
    #[arg(long, default_value = "2018-07-01")]
    from: NaiveDate,

    /// Last date to score (exclusive, default: today).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Score experimental runs instead of stable ones.
    #[arg(long)]
    experimental: bool,

    /// Output file (default: <channel>-trends-<scoring>.csv).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log cache and loading details.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    if let Err(err) = run(args) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = MetricsConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let channel = Channel::from_experimental(args.experimental);
    let window = Window {
        from: args.from,
        to: args.to.unwrap_or_else(|| Utc::now().date_naive()),
        channel,
    };
    let paths = MetricsPaths {
        results: args.results,
        runs: args.runs,
    };

    let loaded = load_runs(&config, &paths, window).context("loading runs")?;
    let report = trends_series(&config, &loaded, args.scoring);

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{channel}-trends-{}.csv", args.scoring)));
    report.write_to(&output)?;
    info!(output = %output.display(), rows = report.row_count(), "wrote series");
    Ok(())
}
