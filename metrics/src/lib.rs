//! Batch metrics over aligned WPT runs.
//!
//! Given a run manifest, a directory of per-run results and a configuration
//! file, this crate produces the dated CSV series published as WPT metrics:
//!
//! | Series | Function | Scoring |
//! |--------|----------|---------|
//! | Browser-specific failures | [`browser_specific_series`] | [`wpt_results::ScoreEngine`] |
//! | Interop categories | [`interop_series`] | [`wpt_results::CategoryScorer`] |
//! | Pass-rate trends | [`trends_series`] | [`wpt_results::score_tree`] |
//!
//! # Entry Point
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use wpt_metrics::{browser_specific_series, load_runs, Channel, MetricsConfig, MetricsPaths, Window};
//!
//! let config = MetricsConfig::load(Path::new("config/metrics.toml"))?;
//! let paths = MetricsPaths {
//!     results: PathBuf::from("results"),
//!     runs: PathBuf::from("runs.json"),
//! };
//! let window = Window {
//!     from: "2023-01-01".parse()?,
//!     to: "2023-02-01".parse()?,
//!     channel: Channel::Stable,
//! };
//! let loaded = load_runs(&config, &paths, window)?;
//! browser_specific_series(&config, &loaded, None)?
//!     .write_to(Path::new("stable-browser-specific-failures.csv"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod report;

pub use config::{BadRanges, CategoryConfig, DateRange, InteropConfig, MetricsConfig};
pub use error::{MetricsError, Result};
pub use logging::init_tracing;
pub use manifest::{load_manifest, AlignedRuns, Channel, RunRecord};
pub use pipeline::{
    browser_specific_series, interop_series, load_runs, trends_series, DateRuns, LoadedRuns,
    MetricsPaths, Window,
};
pub use report::CsvReport;
