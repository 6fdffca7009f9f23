//! Error type shared by the loader and the scoring engines.

use crate::model::{ObjectId, RunId};

/// Errors raised while loading or scoring result trees.
///
/// Schema violations (unknown statuses, malformed leaves, unexpected store
/// entries) indicate upstream data corruption. Precondition violations are
/// raised per run-set before any scoring starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A run reported a browser that is not in the expected set.
    #[error("unexpected browser found in runs: {browser}")]
    UnexpectedBrowser {
        /// The offending browser name.
        browser: String,
    },

    /// A browser appears more than once in a run-set.
    #[error("{browser} has multiple entries in runs")]
    DuplicateBrowser {
        /// The duplicated browser name.
        browser: String,
    },

    /// Expected browsers have no run in the run-set.
    #[error("missing runs for browsers: {}", .browsers.join(","))]
    MissingBrowsers {
        /// Expected browsers that were not seen, sorted.
        browsers: Vec<String>,
    },

    /// A test-level status outside the known enumeration.
    #[error("unknown test status for '{test}': '{status}'")]
    UnknownTestStatus {
        /// Name of the test file.
        test: String,
        /// The raw status string.
        status: String,
    },

    /// A subtest status outside the known enumeration.
    #[error("unknown subtest status for '{test}' / '{subtest}': '{status}'")]
    UnknownSubtestStatus {
        /// Name of the test file.
        test: String,
        /// Name of the subtest.
        subtest: String,
        /// The raw status string.
        status: String,
    },

    /// A leaf blob that does not decode as a result document.
    #[error("malformed result document for '{test}': {source}")]
    MalformedResult {
        /// Name of the test file.
        test: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A tree entry that is neither a tree nor a blob.
    #[error("entry '{name}' is neither tree nor blob (found {kind})")]
    UnexpectedEntryKind {
        /// Entry name within its parent tree.
        name: String,
        /// The kind reported by the store.
        kind: String,
    },

    /// The store returned a blob where a tree was expected, or vice versa.
    #[error("object {id} is not a {expected}")]
    ObjectKindMismatch {
        /// The object id.
        id: ObjectId,
        /// `"tree"` or `"blob"`.
        expected: &'static str,
    },

    /// The store has no object with this id.
    #[error("object {id} not found in store")]
    ObjectNotFound {
        /// The missing object id.
        id: ObjectId,
    },

    /// The store has no root tree for this run.
    #[error("run {run_id} not found in store")]
    UnknownRun {
        /// The missing run id.
        run_id: RunId,
    },

    /// A blob file name without the `.json` suffix.
    #[error("result file '{name}' does not end in .json")]
    UnexpectedFileName {
        /// The raw file name.
        name: String,
    },

    /// A percent-escape in a file name that does not decode.
    #[error("invalid percent-escape in file name '{name}'")]
    InvalidEscape {
        /// The raw file name.
        name: String,
    },

    /// Two result files in one directory decode to the same test name.
    #[error("result file '{file_name}' duplicates test '{name}'")]
    DuplicateTestName {
        /// The decoded test name.
        name: String,
        /// The raw file name of the later entry.
        file_name: String,
    },

    /// A subtest test with a non-OK harness status that has not been accepted.
    #[error("unexpected non-OK status for test: {test} ({status})")]
    UnexpectedHarnessStatus {
        /// Full test path.
        test: String,
        /// The harness status.
        status: String,
    },

    /// Category scoring against an empty allow-list.
    #[error("category allow-list is empty")]
    EmptyAllowList,

    /// An error raised while processing a specific run-set.
    #[error("{source}\n\tRuns: {}", join_ids(.run_ids))]
    RunSet {
        /// Ids of the runs in the failing run-set.
        run_ids: Vec<RunId>,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Filesystem error while importing results.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being read.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps this error with the ids of the run-set being processed.
    #[must_use]
    pub fn in_run_set(self, run_ids: Vec<RunId>) -> Self {
        Error::RunSet {
            run_ids,
            source: Box::new(self),
        }
    }

    /// The error beneath any run-set annotations.
    #[must_use]
    pub fn innermost(&self) -> &Error {
        match self {
            Error::RunSet { source, .. } => source.innermost(),
            other => other,
        }
    }
}

fn join_ids(ids: &[RunId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
