//! Interop-style category scoring.
//!
//! A category is an allow-list of absolute test paths. Each allow-listed test
//! found in a run scores `floor(1000 * passing / total)` (tests without
//! subtests score 0 or 1000), and a run's category score is the sum of its
//! test scores floor-divided by the allow-list size.
//!
//! Normalizing by the fixed allow-list size, not by the tests found, means a
//! test added to the suite later counts as 0 for older runs. Rounding down
//! twice biases scores slightly downwards; both are accepted properties of the
//! published metric.
//!
//! The aggregate interop score of a run-set ([`interop_score`]) instead
//! averages over the allow-listed tests seen in at least one run.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::browser_specific::check_browsers;
use crate::error::{Error, Result};
use crate::model::{Run, TestKind, TestResult, TestStatus};
use crate::walk::walk_tests;

/// Passing and total subtest counts for one test in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubtestTally {
    /// Subtests with status `PASS` (or 1 for a passing simple test).
    pub passing: u32,
    /// Subtests reported (1 for simple tests).
    pub total: u32,
}

impl SubtestTally {
    /// The 0-1000 test score, rounded down so 1000 means fully passing.
    #[must_use]
    pub fn score(self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        1000 * u64::from(self.passing) / u64::from(self.total)
    }
}

/// Category scores for one or more browsers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryScores {
    /// 0-1000 score per browser.
    pub scores: BTreeMap<String, u32>,
    /// Per test path, the tally of each browser that reported the test.
    pub test_results: BTreeMap<String, BTreeMap<String, SubtestTally>>,
    /// Aggregate interop score, when computed over a run-set.
    pub interop: Option<u32>,
}

impl CategoryScores {
    /// Folds another browser's scores into this one.
    pub fn merge(&mut self, other: CategoryScores) {
        self.scores.extend(other.scores);
        for (test, per_browser) in other.test_results {
            self.test_results.entry(test).or_default().extend(per_browser);
        }
        if other.interop.is_some() {
            self.interop = other.interop;
        }
    }
}

/// Scores runs against category allow-lists.
#[derive(Debug, Clone, Default)]
pub struct CategoryScorer {
    known_non_ok: HashSet<String>,
}

impl CategoryScorer {
    /// Creates a scorer.
    ///
    /// `known_non_ok` lists test paths whose non-OK harness status has been
    /// investigated and accepted. Any other subtest test with a non-OK harness
    /// status is an error.
    pub fn new<I>(known_non_ok: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            known_non_ok: known_non_ok.into_iter().collect(),
        }
    }

    /// Tallies one test, validating its harness status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedHarnessStatus`] for a non-OK harness status
    /// on a test that is not in the accepted list.
    pub fn tally(&self, path: &str, result: &TestResult) -> Result<SubtestTally> {
        match result.kind() {
            TestKind::Simple { status } => Ok(SubtestTally {
                passing: u32::from(*status == TestStatus::Pass),
                total: 1,
            }),
            TestKind::WithSubtests { status, subtests } => {
                if *status != TestStatus::Ok && !self.known_non_ok.contains(path) {
                    return Err(Error::UnexpectedHarnessStatus {
                        test: path.to_string(),
                        status: status.to_string(),
                    });
                }
                let passing = subtests.iter().filter(|s| s.status.is_pass()).count();
                Ok(SubtestTally {
                    passing: saturate(passing),
                    total: saturate(subtests.len()),
                })
            }
        }
    }

    /// Scores a single browser's run against `allow_list`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAllowList`] for an empty allow-list and
    /// [`Error::UnexpectedHarnessStatus`] for unaccepted harness errors.
    pub fn score_category(
        &self,
        run: &Run,
        allow_list: &BTreeSet<String>,
    ) -> Result<CategoryScores> {
        if allow_list.is_empty() {
            return Err(Error::EmptyAllowList);
        }

        let mut sum = 0u64;
        let mut test_results = BTreeMap::new();
        let mut failure = None;
        walk_tests(&run.tree, |dir, name, result| {
            if failure.is_some() {
                return;
            }
            let path = format!("{dir}/{name}");
            if !allow_list.contains(&path) {
                return;
            }
            match self.tally(&path, result) {
                Ok(tally) => {
                    sum += tally.score();
                    let mut per_browser = BTreeMap::new();
                    per_browser.insert(run.browser_name.clone(), tally);
                    test_results.insert(path, per_browser);
                }
                Err(e) => failure = Some(e),
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let score = sum / allow_list.len() as u64;
        debug!(
            browser = %run.browser_name,
            run_id = run.id,
            found = test_results.len(),
            allowed = allow_list.len(),
            score,
            "scored category"
        );

        let mut scores = BTreeMap::new();
        scores.insert(run.browser_name.clone(), u32::try_from(score).unwrap_or(u32::MAX));
        Ok(CategoryScores {
            scores,
            test_results,
            interop: None,
        })
    }

    /// Scores every run of a run-set and the aggregate interop score.
    ///
    /// `runs` must cover `expected_browsers` exactly once each.
    ///
    /// # Errors
    ///
    /// The browser-set errors of [`check_browsers`] and the errors of
    /// [`CategoryScorer::score_category`], annotated with the run ids.
    pub fn score_runs(
        &self,
        runs: &[Run],
        expected_browsers: &BTreeSet<String>,
        allow_list: &BTreeSet<String>,
    ) -> Result<CategoryScores> {
        let annotate = |e: Error| e.in_run_set(runs.iter().map(|r| r.id).collect());
        check_browsers(runs, expected_browsers).map_err(annotate)?;
        let mut merged = CategoryScores::default();
        for run in runs {
            merged.merge(self.score_category(run, allow_list).map_err(annotate)?);
        }
        merged.interop = Some(interop_score(runs, allow_list).map_err(annotate)?);
        Ok(merged)
    }
}

// Outcome key within a test: a subtest name, or `None` for the whole-test
// outcome of a test without subtests.
type OutcomeKey = Option<String>;

/// Aggregate interop score of a run-set.
///
/// For each allow-listed test seen in any run, an outcome (subtest, or the
/// whole test when it has no subtests) counts when every run reported it and
/// every run passed it. Only the first subtest of a given name is
/// considered. The test contributes `floor(1000 * counted / outcomes seen)`,
/// and the sum is floor-divided by the number of allow-listed tests seen.
/// The score is 0 when no allow-listed test was seen.
///
/// # Errors
///
/// Returns [`Error::EmptyAllowList`] for an empty allow-list.
pub fn interop_score(runs: &[Run], allow_list: &BTreeSet<String>) -> Result<u32> {
    if allow_list.is_empty() {
        return Err(Error::EmptyAllowList);
    }

    let mut outcomes: BTreeMap<String, BTreeMap<OutcomeKey, Vec<bool>>> = BTreeMap::new();
    for run in runs {
        walk_tests(&run.tree, |dir, name, result| {
            let path = format!("{dir}/{name}");
            if !allow_list.contains(&path) {
                return;
            }
            let per_test = outcomes.entry(path).or_default();
            match result.kind() {
                TestKind::Simple { status } => per_test
                    .entry(None)
                    .or_default()
                    .push(*status == TestStatus::Pass),
                TestKind::WithSubtests { subtests, .. } => {
                    // A repeated subtest name only counts once per run.
                    let mut seen = HashSet::new();
                    for subtest in subtests.iter().filter(|s| seen.insert(s.name.as_str())) {
                        per_test
                            .entry(Some(subtest.name.clone()))
                            .or_default()
                            .push(subtest.status.is_pass());
                    }
                }
            }
        });
    }

    let mut sum = 0u64;
    for per_test in outcomes.values() {
        let unanimous = per_test
            .values()
            .filter(|passes| passes.len() == runs.len() && passes.iter().all(|p| *p))
            .count();
        sum += SubtestTally {
            passing: saturate(unanimous),
            total: saturate(per_test.len()),
        }
        .score();
    }
    if outcomes.is_empty() {
        return Ok(0);
    }
    let score = sum / outcomes.len() as u64;
    Ok(u32::try_from(score).unwrap_or(u32::MAX))
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
