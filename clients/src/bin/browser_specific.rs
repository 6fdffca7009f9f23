//! `wpt-browser-specific` writes the browser-specific failure series.
//!
//! For every aligned date in the window, each product is credited with the
//! tests (and normalized subtests) that fail only in that product.
//!
//! **Usage:**
//! ```text
//! wpt-browser-specific --results <dir> --runs <runs.json> [--from <date>] [--to <date>]
//!                      [--experimental] [--baseline <date>] [--output <csv>]
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
    browser_specific_series, init_tracing, load_runs, Channel, MetricsConfig, MetricsPaths, Window,
};

/// Compute browser-specific failure counts over aligned runs.
#[derive(Parser)]
#[command(
    name = "wpt-browser-specific",
    about = "Write the browser-specific failures CSV series"
)]
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

    /// First date to score (inclusive).
    #[arg(long, default_value = "2018-07-01")]
    from: NaiveDate,

    /// Last date to score (exclusive, default: today).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Score experimental runs instead of stable ones.
    #[arg(long)]
    experimental: bool,

    /// Only score tests present on this date.
    #[arg(long)]
    baseline: Option<NaiveDate>,

    /// Output file (default: <channel>-browser-specific-failures.csv).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log cache and scoring details.
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
    let report = browser_specific_series(&config, &loaded, args.baseline)
        .context("scoring browser-specific failures")?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{channel}-browser-specific-failures.csv")));
    report.write_to(&output)?;
    info!(output = %output.display(), rows = report.row_count(), "wrote series");
    Ok(())
}
