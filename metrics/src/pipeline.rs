//! Batch pipeline: align runs by date, load every tree, then score each date
//! into a CSV series.
//!
//! All trees are loaded before scoring starts, and dates are scored one after
//! another with a single engine so unchanged subtrees are scored once per
//! series.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, error, info};
use wpt_results::{
    score_tree, test_paths, CategoryScorer, CategoryScores, MemoryStore, ObjectStore, Run, ScoreEngine,
    TreeLoader, TrendMethod,
};

use crate::config::MetricsConfig;
use crate::error::{MetricsError, Result};
use crate::manifest::{load_manifest, AlignedRuns, Channel, RunRecord};
use crate::report::CsvReport;

/// Paths the pipeline reads from.
#[derive(Debug, Clone)]
pub struct MetricsPaths {
    /// Directory holding one results directory per run id.
    pub results: PathBuf,
    /// Run manifest (JSON array of run records).
    pub runs: PathBuf,
}

/// Dates and channel to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First date (inclusive).
    pub from: NaiveDate,
    /// Last date (exclusive).
    pub to: NaiveDate,
    /// Release channel, selecting the bad ranges to skip.
    pub channel: Channel,
}

/// The loaded run-set of one date, in sorted product order.
#[derive(Debug, Clone)]
pub struct DateRuns {
    /// The date.
    pub date: NaiveDate,
    /// Run metadata.
    pub records: Vec<RunRecord>,
    /// Runs with their result trees.
    pub runs: Vec<Run>,
}

impl DateRuns {
    /// WPT revision of the run-set (the first run's; aligned runs share it).
    #[must_use]
    pub fn sha(&self) -> &str {
        self.records
            .first()
            .map_or("", |r| r.full_revision_hash.as_str())
    }

    /// Browser version of `product` in this run-set.
    #[must_use]
    pub fn version(&self, product: &str) -> &str {
        self.records
            .iter()
            .find(|r| r.browser_name == product)
            .map_or("", |r| r.browser_version.as_str())
    }
}

/// Every date's loaded run-set, in date order.
#[derive(Debug, Clone, Default)]
pub struct LoadedRuns {
    /// Run-sets by ascending date.
    pub dates: Vec<DateRuns>,
}

impl LoadedRuns {
    /// The run-set of `date`.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&DateRuns> {
        self.dates.iter().find(|d| d.date == date)
    }
}

/// Reads the manifest, aligns runs, imports every run directory and loads
/// every tree.
///
/// # Errors
///
/// Returns manifest and alignment errors, [`MetricsError::MissingRuns`] if
/// any run has no results directory (all of them are logged first), and
/// loader errors annotated with the run id.
pub fn load_runs(config: &MetricsConfig, paths: &MetricsPaths, window: Window) -> Result<LoadedRuns> {
    let records = load_manifest(&paths.runs)?;
    let products = config.sorted_products();
    let aligned = AlignedRuns::align(
        records,
        &products,
        window.from,
        window.to,
        window.channel,
        &config.bad_ranges,
    )?;

    let mut store = MemoryStore::new();
    let mut missing = Vec::new();
    for (date, records) in aligned.iter() {
        for record in records {
            let dir = paths.results.join(record.id.to_string());
            if !dir.is_dir() {
                error!(run_id = record.id, %date, dir = %dir.display(), "run missing from results");
                missing.push(record.id);
                continue;
            }
            store.import_run_dir(record.id, &dir)?;
        }
    }
    if !missing.is_empty() {
        return Err(MetricsError::MissingRuns { run_ids: missing });
    }
    info!(
        runs = store.run_ids().len(),
        objects = store.object_count(),
        "imported results"
    );

    let mut loader = TreeLoader::new(&store);
    let mut dates = Vec::with_capacity(aligned.len());
    for (date, records) in aligned.iter() {
        let runs = records
            .iter()
            .map(|r| -> Result<Run> {
                Ok(Run::new(r.id, r.browser_name.clone(), loader.get_tree(r.id)?))
            })
            .collect::<Result<Vec<_>>>()?;
        dates.push(DateRuns {
            date,
            records: records.to_vec(),
            runs,
        });
    }
    let stats = loader.stats();
    info!(
        dates = dates.len(),
        trees = stats.trees,
        tests = stats.tests,
        tree_hits = stats.tree_hits,
        test_hits = stats.test_hits,
        "loaded run trees"
    );
    Ok(LoadedRuns { dates })
}

/// Browser-specific failure counts per date.
///
/// With a `baseline` date, only tests that exist in that date's runs are
/// scored. Row: `sha, date, [<product>-version, <product>]...`.
///
/// # Errors
///
/// Returns [`MetricsError::BaselineNotFound`] for an unknown baseline date,
/// and scoring errors annotated with the offending run ids.
pub fn browser_specific_series(
    config: &MetricsConfig,
    loaded: &LoadedRuns,
    baseline: Option<NaiveDate>,
) -> Result<CsvReport> {
    let products = config.sorted_products();
    let expected = config.product_set();

    let mut engine = match baseline {
        Some(date) => {
            let base = loaded
                .get(date)
                .ok_or(MetricsError::BaselineNotFound { date })?;
            let known: HashSet<String> = base.runs.iter().flat_map(|r| test_paths(&r.tree)).collect();
            info!(%date, tests = known.len(), "pinned tests to baseline");
            ScoreEngine::with_test_filter(move |path| known.contains(path))
        }
        None => ScoreEngine::new(),
    };

    let mut header = vec!["sha".to_string(), "date".to_string()];
    for product in &products {
        header.push(format!("{product}-version"));
        header.push(product.clone());
    }
    let mut report = CsvReport::new(header);

    for day in &loaded.dates {
        let scores = engine.score(&day.runs, &expected)?;
        debug!(date = %day.date, ?scores, "scored browser-specific failures");
        let mut row = vec![day.sha().to_string(), day.date.to_string()];
        for product in &products {
            row.push(day.version(product).to_string());
            row.push(scores.get(product).copied().unwrap_or_default().to_string());
        }
        report.push(row);
    }

    let stats = engine.stats();
    info!(
        dates = report.row_count(),
        trees_walked = stats.trees_walked,
        tests_scored = stats.tests_scored,
        tree_cache_hits = stats.tree_cache_hits,
        identical_subtrees = stats.identical_subtrees,
        "browser-specific series done"
    );
    Ok(report)
}

/// Interop category scores per date, one column per product and category,
/// followed by the aggregate interop score of each category.
///
/// # Errors
///
/// Returns [`MetricsError::NoCategories`] without categories, and scoring
/// errors (browser-set violations, unaccepted harness errors, empty
/// allow-lists) annotated with the offending run ids.
pub fn interop_series(config: &MetricsConfig, loaded: &LoadedRuns) -> Result<CsvReport> {
    if config.categories.is_empty() {
        return Err(MetricsError::NoCategories);
    }
    let products = config.sorted_products();
    let expected = config.product_set();
    let scorer = CategoryScorer::new(config.interop.known_non_ok.iter().cloned());
    let allow_lists: Vec<_> = config.categories.iter().map(|c| c.allow_list()).collect();

    let mut header = vec!["date".to_string()];
    for product in &products {
        header.push(format!("{product}-version"));
        header.extend(config.categories.iter().map(|c| format!("{product}-{}", c.name)));
    }
    header.push("interop-version".to_string());
    header.extend(config.categories.iter().map(|c| format!("interop-{}", c.name)));
    let mut report = CsvReport::new(header);

    for day in &loaded.dates {
        let per_category = allow_lists
            .iter()
            .map(|allow| scorer.score_runs(&day.runs, &expected, allow))
            .collect::<wpt_results::Result<Vec<CategoryScores>>>()?;

        let mut row = vec![day.date.to_string()];
        for product in &products {
            row.push(day.version(product).to_string());
            row.extend(
                per_category
                    .iter()
                    .map(|s| s.scores.get(product).copied().unwrap_or_default().to_string()),
            );
        }
        row.push("-".to_string());
        row.extend(
            per_category
                .iter()
                .map(|s| s.interop.unwrap_or_default().to_string()),
        );
        debug!(date = %day.date, "scored interop categories");
        report.push(row);
    }

    info!(
        dates = report.row_count(),
        categories = config.categories.len(),
        "interop series done"
    );
    Ok(report)
}

/// Whole-run pass scores per date.
///
/// Row: `date, sha (10 digits), tests, <product>...`, where `tests` is the
/// largest test count among the date's runs.
#[must_use]
pub fn trends_series(config: &MetricsConfig, loaded: &LoadedRuns, method: TrendMethod) -> CsvReport {
    let products = config.sorted_products();
    let mut header = vec!["date".to_string(), "sha".to_string(), "tests".to_string()];
    header.extend(products.iter().cloned());
    let mut report = CsvReport::new(header);

    for day in &loaded.dates {
        let scores: Vec<_> = day
            .runs
            .iter()
            .map(|run| (run.browser_name.as_str(), score_tree(&run.tree, method)))
            .collect();
        let tests = scores.iter().map(|(_, s)| s.total).max().unwrap_or(0);
        let sha = day.sha();

        let mut row = vec![
            day.date.to_string(),
            sha.get(..10).unwrap_or(sha).to_string(),
            tests.to_string(),
        ];
        for product in &products {
            let score = scores
                .iter()
                .find(|(name, _)| *name == product.as_str())
                .map_or(0.0, |(_, s)| s.score);
            row.push(score.to_string());
        }
        report.push(row);
    }

    info!(dates = report.row_count(), %method, "trend series done");
    report
}
