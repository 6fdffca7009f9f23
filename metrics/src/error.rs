//! Errors raised by the batch driver.

use std::path::PathBuf;

use chrono::NaiveDate;
use wpt_results::RunId;

/// Errors raised while configuring, loading or scoring a batch.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::MetricsConfig`].
    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigSyntax {
        /// The configuration file.
        path: PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The configuration parsed but breaks a rule.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The run manifest is not a JSON array of run records.
    #[error("failed to parse run manifest {}: {source}", .path.display())]
    Manifest {
        /// The manifest file.
        path: PathBuf,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// `from` is not before `to`.
    #[error("empty date range: {from} is not before {to}")]
    EmptyDateRange {
        /// Inclusive start.
        from: NaiveDate,
        /// Exclusive end.
        to: NaiveDate,
    },

    /// A date has runs, but not exactly one per product.
    #[error("{date}: found {found} runs, expected {expected}")]
    RunCountMismatch {
        /// The offending date.
        date: NaiveDate,
        /// Runs found for the date.
        found: usize,
        /// Number of configured products.
        expected: usize,
    },

    /// A date has more than one run of the same product.
    #[error("{date}: multiple runs of {product} (runs: {})", join_ids(.run_ids))]
    DuplicateProduct {
        /// The offending date.
        date: NaiveDate,
        /// The repeated product.
        product: String,
        /// Every run of the date.
        run_ids: Vec<RunId>,
    },

    /// Runs listed in the manifest have no results directory.
    #[error("missing results for {} run(s): {}", .run_ids.len(), join_ids(.run_ids))]
    MissingRuns {
        /// Ids of the missing runs.
        run_ids: Vec<RunId>,
    },

    /// The requested baseline date has no run-set.
    #[error("baseline date {date} not present in test data")]
    BaselineNotFound {
        /// The baseline date.
        date: NaiveDate,
    },

    /// Interop scoring was requested without any category.
    #[error("no categories configured")]
    NoCategories,

    /// Loading or scoring failed in the results engine.
    #[error(transparent)]
    Results(#[from] wpt_results::Error),
}

impl MetricsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| MetricsError::Io { path, source }
    }
}

fn join_ids(ids: &[RunId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, MetricsError>;
