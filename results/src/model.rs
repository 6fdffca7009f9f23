//! Result-tree data model.
//!
//! One [`ResultTree`] node represents a directory of one run's results. Nodes
//! and [`TestResult`]s carry an [`ObjectId`] derived from their content; the
//! scoring engines compare ids, never structure, to decide whether two inputs
//! are the same.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a run in the results store.
pub type RunId = u64;

/// Content-derived identity of a tree or test result.
///
/// Two objects with identical content have equal ids. The engine relies on
/// this for its O(1) short-circuit and as the memoization key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Wraps a raw 32-byte digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Builds a synthetic id from a counter.
    ///
    /// Used by [`TreeBuilder`](crate::builder::TreeBuilder) for hand-built
    /// trees, where every node gets a distinct identity.
    #[must_use]
    pub fn synthetic(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_be_bytes());
        bytes[31] = 0xff;
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &hex::encode(self.0)[..12])
    }
}

/// Harness-level status of a test file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    /// Harness completed.
    Ok,
    /// Single-outcome test passed.
    Pass,
    /// Single-outcome test failed.
    Fail,
    /// Harness error.
    Error,
    /// Harness timed out.
    Timeout,
    /// Browser crashed.
    Crash,
    /// Test was skipped.
    Skip,
    /// A precondition of the test was not met.
    PreconditionFailed,
    /// Empty string, seen in some legacy runs.
    Empty,
}

impl TestStatus {
    /// Parses the wire spelling. Returns `None` for unknown statuses.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "OK" => Self::Ok,
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "ERROR" => Self::Error,
            "TIMEOUT" => Self::Timeout,
            "CRASH" => Self::Crash,
            "SKIP" => Self::Skip,
            "PRECONDITION_FAILED" => Self::PreconditionFailed,
            "" => Self::Empty,
            _ => return None,
        })
    }

    /// Returns the wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Crash => "CRASH",
            Self::Skip => "SKIP",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::Empty => "",
        }
    }

    /// `PASS` or `OK`.
    #[must_use]
    pub fn is_pass(self) -> bool {
        matches!(self, Self::Pass | Self::Ok)
    }

    /// `FAIL`, `ERROR`, `TIMEOUT` or `CRASH`.
    #[must_use]
    pub fn is_fail(self) -> bool {
        matches!(self, Self::Fail | Self::Error | Self::Timeout | Self::Crash)
    }

    /// `SKIP`, `PRECONDITION_FAILED` or empty: blocks comparison.
    #[must_use]
    pub fn is_neutral(self) -> bool {
        matches!(self, Self::Skip | Self::PreconditionFailed | Self::Empty)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single subtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtestStatus {
    /// Subtest passed.
    Pass,
    /// Subtest failed.
    Fail,
    /// Subtest raised an error.
    Error,
    /// Subtest timed out.
    Timeout,
    /// Subtest never ran.
    NotRun,
    /// A precondition of the subtest was not met.
    PreconditionFailed,
    /// Subtest was skipped.
    Skip,
}

impl SubtestStatus {
    /// Parses the wire spelling. Returns `None` for unknown statuses.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "ERROR" => Self::Error,
            "TIMEOUT" => Self::Timeout,
            "NOTRUN" => Self::NotRun,
            "PRECONDITION_FAILED" => Self::PreconditionFailed,
            "SKIP" => Self::Skip,
            _ => return None,
        })
    }

    /// Returns the wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NotRun => "NOTRUN",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::Skip => "SKIP",
        }
    }

    /// Exactly `PASS`.
    #[must_use]
    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    /// `FAIL`, `ERROR`, `TIMEOUT` or `NOTRUN`.
    #[must_use]
    pub fn is_fail(self) -> bool {
        matches!(self, Self::Fail | Self::Error | Self::Timeout | Self::NotRun)
    }

    /// `PRECONDITION_FAILED` or `SKIP`.
    #[must_use]
    pub fn is_neutral(self) -> bool {
        matches!(self, Self::PreconditionFailed | Self::Skip)
    }
}

impl fmt::Display for SubtestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subtest outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtestResult {
    /// Subtest name. Not guaranteed unique within a test.
    pub name: String,
    /// Outcome.
    pub status: SubtestStatus,
}

impl SubtestResult {
    /// Creates a subtest result.
    pub fn new(name: impl Into<String>, status: SubtestStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Shape of a test's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestKind {
    /// Single-outcome test (reftest, single page test), scored from `status`.
    Simple {
        /// The test status.
        status: TestStatus,
    },
    /// Harness test with a non-empty subtest sequence.
    WithSubtests {
        /// The harness status.
        status: TestStatus,
        /// Subtests in reported order.
        subtests: Vec<SubtestResult>,
    },
}

/// Outcome of one test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    id: ObjectId,
    kind: TestKind,
}

impl TestResult {
    /// Creates a single-outcome result.
    #[must_use]
    pub fn simple(id: ObjectId, status: TestStatus) -> Self {
        Self {
            id,
            kind: TestKind::Simple { status },
        }
    }

    /// Creates a result with subtests. An empty list yields a simple result.
    #[must_use]
    pub fn with_subtests(id: ObjectId, status: TestStatus, subtests: Vec<SubtestResult>) -> Self {
        let kind = if subtests.is_empty() {
            TestKind::Simple { status }
        } else {
            TestKind::WithSubtests { status, subtests }
        };
        Self { id, kind }
    }

    /// Content identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The outcome shape.
    #[must_use]
    pub fn kind(&self) -> &TestKind {
        &self.kind
    }

    /// Test-level status, for either shape.
    #[must_use]
    pub fn status(&self) -> TestStatus {
        match self.kind {
            TestKind::Simple { status } | TestKind::WithSubtests { status, .. } => status,
        }
    }

    /// Subtests in reported order; empty for simple tests.
    #[must_use]
    pub fn subtests(&self) -> &[SubtestResult] {
        match &self.kind {
            TestKind::Simple { .. } => &[],
            TestKind::WithSubtests { subtests, .. } => subtests,
        }
    }

    /// True when the test reported at least one subtest.
    #[must_use]
    pub fn has_subtests(&self) -> bool {
        matches!(self.kind, TestKind::WithSubtests { .. })
    }
}

/// One directory level of a run's results.
///
/// Constructed once by the loader and shared through [`Arc`] afterwards; never
/// mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTree {
    id: ObjectId,
    subtrees: BTreeMap<String, Arc<ResultTree>>,
    tests: BTreeMap<String, Arc<TestResult>>,
}

impl ResultTree {
    /// Creates a node.
    #[must_use]
    pub fn new(
        id: ObjectId,
        subtrees: BTreeMap<String, Arc<ResultTree>>,
        tests: BTreeMap<String, Arc<TestResult>>,
    ) -> Self {
        Self {
            id,
            subtrees,
            tests,
        }
    }

    /// Content identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Child directories, sorted by name.
    #[must_use]
    pub fn subtrees(&self) -> &BTreeMap<String, Arc<ResultTree>> {
        &self.subtrees
    }

    /// Tests in this directory, sorted by name.
    #[must_use]
    pub fn tests(&self) -> &BTreeMap<String, Arc<TestResult>> {
        &self.tests
    }

    /// Number of tests in this subtree, recursively.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len() + self.subtrees.values().map(|t| t.test_count()).sum::<usize>()
    }
}

/// One browser's run.
#[derive(Debug, Clone)]
pub struct Run {
    /// Run id, used to annotate errors.
    pub id: RunId,
    /// Browser (product) name, e.g. `"chrome"`.
    pub browser_name: String,
    /// Root of the run's result tree.
    pub tree: Arc<ResultTree>,
}

impl Run {
    /// Creates a run.
    pub fn new(id: RunId, browser_name: impl Into<String>, tree: Arc<ResultTree>) -> Self {
        Self {
            id,
            browser_name: browser_name.into(),
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_wire_spelling() {
        for s in [
            "OK",
            "PASS",
            "FAIL",
            "ERROR",
            "TIMEOUT",
            "CRASH",
            "SKIP",
            "PRECONDITION_FAILED",
            "",
        ] {
            let status = TestStatus::parse(s);
            assert_eq!(status.map(TestStatus::as_str), Some(s));
        }
        assert_eq!(TestStatus::parse("FOO"), None);
        assert_eq!(TestStatus::parse("NOTRUN"), None);
    }

    #[test]
    fn status_classes_are_disjoint() {
        for s in [
            TestStatus::Ok,
            TestStatus::Pass,
            TestStatus::Fail,
            TestStatus::Error,
            TestStatus::Timeout,
            TestStatus::Crash,
            TestStatus::Skip,
            TestStatus::PreconditionFailed,
            TestStatus::Empty,
        ] {
            let classes = [s.is_pass(), s.is_fail(), s.is_neutral()];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{s:?}");
        }
        assert!(SubtestStatus::NotRun.is_fail());
        assert!(SubtestStatus::Skip.is_neutral());
        assert_eq!(SubtestStatus::parse("CRASH"), None);
    }

    #[test]
    fn empty_subtests_collapse_to_simple() {
        let t = TestResult::with_subtests(ObjectId::synthetic(1), TestStatus::Ok, Vec::new());
        assert!(!t.has_subtests());
        assert!(t.subtests().is_empty());
        assert_eq!(t.status(), TestStatus::Ok);
    }

    #[test]
    fn object_id_renders_as_hex() {
        let id = ObjectId::synthetic(42);
        let hex = id.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("000000000000002a"));
        assert!(hex.ends_with("ff"));
    }
}
