//! Browser-specific failure scoring.
//!
//! Given one result tree per browser from the same test-suite revision, count
//! how often exactly one browser fails while all others pass. Tests without
//! subtests contribute 0 or 1. Tests with subtests are scored per subtest and
//! normalized by the number of aligned subtests, so every test weighs at most
//! 1 no matter how many subtests it has.
//!
//! Results are memoized by the ordered tuple of input ids. The same ids in a
//! different browser order are a different key, since the score vector would
//! be permuted.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::align::AlignedMerge;
use crate::error::{Error, Result};
use crate::model::{ObjectId, ResultTree, Run, TestResult};

/// Accumulated score per browser name.
pub type BrowserScores = BTreeMap<String, f64>;

/// Predicate over full test paths (`/dir/test.html`). Return `true` to score
/// the test.
pub type TestFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Options for [`score_browser_specific_failures`].
#[derive(Default)]
pub struct ScoreOptions {
    /// Optional test-path filter.
    pub test_filter: Option<TestFilter>,
}

impl fmt::Debug for ScoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreOptions")
            .field("test_filter", &self.test_filter.is_some())
            .finish()
    }
}

/// Work counters of a [`ScoreEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Tree tuples whose contents were walked.
    pub trees_walked: u64,
    /// Test tuples that were actually scored.
    pub tests_scored: u64,
    /// Tree tuples answered from the cache.
    pub tree_cache_hits: u64,
    /// Test tuples answered from the cache.
    pub test_cache_hits: u64,
    /// Subtree tuples skipped because every browser had the same id.
    pub identical_subtrees: u64,
    /// Test tuples skipped because every browser had the same id.
    pub identical_tests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TreeKey {
    // Only set when a filter is active: the filter is path-based, so the same
    // subtree ids at two paths may score differently.
    path: Option<String>,
    ids: Vec<ObjectId>,
}

/// Recursive scorer with per-instance memoization.
///
/// One engine is meant to be reused across every run-set of a batch so that
/// unchanged trees and tests are scored once. The test filter is fixed for
/// the lifetime of the engine, which keeps the caches sound.
#[derive(Default)]
pub struct ScoreEngine {
    filter: Option<TestFilter>,
    tree_cache: HashMap<TreeKey, Vec<f64>>,
    test_cache: HashMap<Vec<ObjectId>, Vec<f64>>,
    stats: EngineStats,
}

impl fmt::Debug for ScoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreEngine")
            .field("filtered", &self.filter.is_some())
            .field("cached_trees", &self.tree_cache.len())
            .field("cached_tests", &self.test_cache.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ScoreEngine {
    /// Creates an engine that scores every test.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine that only scores tests accepted by `filter`.
    pub fn with_test_filter<F>(filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::from_options(ScoreOptions {
            test_filter: Some(Box::new(filter)),
        })
    }

    /// Creates an engine from [`ScoreOptions`].
    #[must_use]
    pub fn from_options(options: ScoreOptions) -> Self {
        Self {
            filter: options.test_filter,
            ..Self::default()
        }
    }

    /// Work counters so far.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Scores one run-set.
    ///
    /// # Errors
    ///
    /// Returns an error, annotated with the run ids, if the browsers in `runs`
    /// are not exactly `expected_browsers` (unexpected, duplicated or missing
    /// browser). Nothing is scored in that case.
    pub fn score(
        &mut self,
        runs: &[Run],
        expected_browsers: &BTreeSet<String>,
    ) -> Result<BrowserScores> {
        check_browsers(runs, expected_browsers)
            .map_err(|e| e.in_run_set(runs.iter().map(|r| r.id).collect()))?;

        let trees: Vec<&ResultTree> = runs.iter().map(|r| r.tree.as_ref()).collect();
        let scores = self.walk_trees(&trees, "");
        debug!(
            runs = runs.len(),
            trees_walked = self.stats.trees_walked,
            tests_scored = self.stats.tests_scored,
            "scored run-set"
        );
        Ok(runs
            .iter()
            .zip(scores)
            .map(|(run, score)| (run.browser_name.clone(), score))
            .collect())
    }

    fn walk_trees(&mut self, trees: &[&ResultTree], path: &str) -> Vec<f64> {
        let key = TreeKey {
            path: self.filter.as_ref().map(|_| path.to_string()),
            ids: trees.iter().map(|t| t.id()).collect(),
        };
        if let Some(cached) = self.tree_cache.get(&key) {
            self.stats.tree_cache_hits += 1;
            return cached.clone();
        }
        self.stats.trees_walked += 1;

        let mut scores = vec![0.0; trees.len()];

        // Tests missing from some browser cannot be browser-specific.
        for step in AlignedMerge::over_maps(trees.iter().copied().map(ResultTree::tests)) {
            let Some(tests) = step.all_present() else {
                continue;
            };
            if all_same_id(tests.iter().map(|t| t.id())) {
                self.stats.identical_tests += 1;
                continue;
            }
            let test_path = format!("{path}/{}", step.key);
            let test_scores = self.score_test(&tests, &test_path);
            add_into(&mut scores, &test_scores);
        }

        for step in AlignedMerge::over_maps(trees.iter().copied().map(ResultTree::subtrees)) {
            let Some(subtrees) = step.all_present() else {
                continue;
            };
            if all_same_id(subtrees.iter().map(|t| t.id())) {
                self.stats.identical_subtrees += 1;
                continue;
            }
            let children: Vec<&ResultTree> = subtrees.iter().map(|t| t.as_ref()).collect();
            let child_path = format!("{path}/{}", step.key);
            let child_scores = self.walk_trees(&children, &child_path);
            add_into(&mut scores, &child_scores);
        }

        self.tree_cache.insert(key, scores.clone());
        scores
    }

    fn score_test(&mut self, tests: &[&Arc<TestResult>], path: &str) -> Vec<f64> {
        if let Some(filter) = &self.filter {
            if !filter(path) {
                return vec![0.0; tests.len()];
            }
        }

        let key: Vec<ObjectId> = tests.iter().map(|t| t.id()).collect();
        if let Some(cached) = self.test_cache.get(&key) {
            self.stats.test_cache_hits += 1;
            return cached.clone();
        }
        self.stats.tests_scored += 1;

        let scores = if tests.iter().all(|t| !t.has_subtests()) {
            score_harness_statuses(tests)
        } else if tests.iter().all(|t| t.has_subtests()) {
            score_subtests(tests)
        } else {
            // A harness-level result cannot be compared to a subtest breakdown.
            vec![0.0; tests.len()]
        };

        self.test_cache.insert(key, scores.clone());
        scores
    }
}

/// Checks that `runs` covers exactly `expected_browsers`, once each.
///
/// # Errors
///
/// [`Error::UnexpectedBrowser`], [`Error::DuplicateBrowser`] or
/// [`Error::MissingBrowsers`].
pub fn check_browsers(runs: &[Run], expected_browsers: &BTreeSet<String>) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for run in runs {
        let browser = run.browser_name.as_str();
        if !expected_browsers.contains(browser) {
            return Err(Error::UnexpectedBrowser {
                browser: browser.to_string(),
            });
        }
        if !seen.insert(browser) {
            return Err(Error::DuplicateBrowser {
                browser: browser.to_string(),
            });
        }
    }
    // Only expected browsers were inserted above, so a size mismatch means
    // some are missing.
    if seen.len() != expected_browsers.len() {
        let browsers = expected_browsers
            .iter()
            .filter(|b| !seen.contains(b.as_str()))
            .cloned()
            .collect();
        return Err(Error::MissingBrowsers { browsers });
    }
    Ok(())
}

/// Scores one run-set with a fresh engine.
///
/// Convenient for one-off calls; batch callers should keep a [`ScoreEngine`]
/// alive across run-sets to benefit from its caches.
///
/// # Errors
///
/// See [`ScoreEngine::score`].
pub fn score_browser_specific_failures(
    runs: &[Run],
    expected_browsers: &BTreeSet<String>,
    options: ScoreOptions,
) -> Result<BrowserScores> {
    ScoreEngine::from_options(options).score(runs, expected_browsers)
}

fn all_same_id(mut ids: impl Iterator<Item = ObjectId>) -> bool {
    match ids.next() {
        Some(first) => ids.all(|id| id == first),
        None => true,
    }
}

fn add_into(total: &mut [f64], other: &[f64]) {
    for (t, o) in total.iter_mut().zip(other) {
        *t += o;
    }
}

fn score_harness_statuses(tests: &[&Arc<TestResult>]) -> Vec<f64> {
    let mut scores = vec![0.0; tests.len()];
    let mut failed = Vec::new();
    for (i, test) in tests.iter().enumerate() {
        let status = test.status();
        if status.is_neutral() {
            return scores;
        }
        if status.is_fail() {
            failed.push(i);
        }
    }
    if let [only] = failed.as_slice() {
        scores[*only] = 1.0;
    }
    scores
}

fn score_subtests(tests: &[&Arc<TestResult>]) -> Vec<f64> {
    let n = tests.len();
    // Count whole credits first and divide once at the end.
    let mut counts = vec![0u64; n];
    let mut denominator = 0u64;

    for step in AlignedMerge::over_subtests(tests.iter().map(|t| t.subtests())) {
        denominator += 1;

        if let Some(subtests) = step.all_present() {
            if subtests.iter().any(|s| s.status.is_neutral()) {
                continue;
            }
            let mut failing = subtests
                .iter()
                .enumerate()
                .filter(|(_, s)| s.status.is_fail())
                .map(|(i, _)| i);
            if let (Some(only), None) = (failing.next(), failing.next()) {
                counts[only] += 1;
            }
        } else if let Some(missing) = step.sole_missing() {
            // Missing counts as a failure when everyone else passes.
            if step.entries.iter().flatten().all(|s| s.status.is_pass()) {
                counts[missing] += 1;
            }
        }
    }

    if denominator == 0 {
        return vec![0.0; n];
    }
    counts
        .into_iter()
        .map(|c| c as f64 / denominator as f64)
        .collect()
}
