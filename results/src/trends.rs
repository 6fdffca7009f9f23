//! Whole-run pass-rate scoring for long-term trend series.

use std::fmt;
use std::str::FromStr;

use crate::model::{ResultTree, SubtestResult, TestKind, TestStatus};
use crate::walk::walk_tests;

/// How a test with subtests is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMethod {
    /// 1 only with an `OK` harness status and every subtest passing, else 0.
    Binary,
    /// Fraction of passing subtests; the harness status is ignored.
    Interop,
    /// As [`TrendMethod::Interop`], but 0 unless the harness status is `OK`.
    InteropStrict,
}

impl TrendMethod {
    /// Command-line spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendMethod::Binary => "binary",
            TrendMethod::Interop => "interop",
            TrendMethod::InteropStrict => "interop-strict",
        }
    }

    fn score_subtests(self, status: TestStatus, subtests: &[SubtestResult]) -> f64 {
        let passing = subtests.iter().filter(|s| s.status.is_pass()).count();
        match self {
            TrendMethod::Binary => {
                if status == TestStatus::Ok && passing == subtests.len() {
                    1.0
                } else {
                    0.0
                }
            }
            TrendMethod::Interop => passing as f64 / subtests.len() as f64,
            TrendMethod::InteropStrict => {
                if status == TestStatus::Ok {
                    passing as f64 / subtests.len() as f64
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for TrendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown scoring method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scoring method: {0} (expected binary, interop or interop-strict)")]
pub struct UnknownTrendMethod(pub String);

impl FromStr for TrendMethod {
    type Err = UnknownTrendMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(TrendMethod::Binary),
            "interop" => Ok(TrendMethod::Interop),
            "interop-strict" => Ok(TrendMethod::InteropStrict),
            other => Err(UnknownTrendMethod(other.to_string())),
        }
    }
}

/// Score of one run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendScore {
    /// Sum of per-test scores, each in `[0, 1]`.
    pub score: f64,
    /// Number of tests seen.
    pub total: u64,
}

/// Scores every test in `tree`. Tests without subtests count 1 when `PASS`.
#[must_use]
pub fn score_tree(tree: &ResultTree, method: TrendMethod) -> TrendScore {
    let mut out = TrendScore::default();
    walk_tests(tree, |_, _, result| {
        out.score += match result.kind() {
            TestKind::Simple { status } => f64::from(u8::from(*status == TestStatus::Pass)),
            TestKind::WithSubtests { status, subtests } => method.score_subtests(*status, subtests),
        };
        out.total += 1;
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::model::SubtestStatus;

    fn sample() -> std::sync::Arc<ResultTree> {
        TreeBuilder::new()
            .test("ref.html", TestStatus::Pass)
            .subtest("a.html", "1", SubtestStatus::Pass)
            .subtest("a.html", "2", SubtestStatus::Fail)
            .test("b.html", TestStatus::Timeout)
            .subtest("b.html", "1", SubtestStatus::Pass)
            .subtest("c.html", "1", SubtestStatus::Pass)
            .build()
    }

    #[test]
    fn methods_differ_on_partial_and_harness_errors() {
        let tree = sample();
        let binary = score_tree(&tree, TrendMethod::Binary);
        assert_eq!(binary.total, 4);
        assert!((binary.score - 2.0).abs() < 1e-9);

        let interop = score_tree(&tree, TrendMethod::Interop);
        assert!((interop.score - 3.5).abs() < 1e-9);

        let strict = score_tree(&tree, TrendMethod::InteropStrict);
        assert!((strict.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn parses_method_names() {
        assert_eq!(
            "interop-strict".parse::<TrendMethod>(),
            Ok(TrendMethod::InteropStrict)
        );
        assert!("median".parse::<TrendMethod>().is_err());
        assert_eq!(TrendMethod::Binary.to_string(), "binary");
    }
}
