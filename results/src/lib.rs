//! WPT result-tree scoring engine.
//!
//! A WPT run is stored as a content-addressed tree: directories map to
//! subtrees, and each test file maps to a JSON blob holding the harness
//! status and subtest results. Equal content has equal [`ObjectId`]s, so
//! consecutive runs of the same browser share most of their objects.
//!
//! The crate provides
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Object store abstraction and an in-memory, directory-importing store |
//! | [`loader`] | Memoized decoding of run trees into shared [`ResultTree`]s |
//! | [`align`] | Lockstep merge of N sorted child sequences |
//! | [`browser_specific`] | Browser-specific failure scoring with identity short-circuits |
//! | [`category`] | Allow-list (interop) category scoring |
//! | [`trends`] | Whole-run pass-rate scoring |
//! | [`builder`] | Hand-built trees for tests and tools |
//!
//! # Entry Point
//!
//! ```
//! use std::collections::BTreeSet;
//! use wpt_results::{Run, ScoreEngine, TestStatus, TreeBuilder};
//!
//! let chrome = TreeBuilder::new().test("a.html", TestStatus::Fail).build();
//! let firefox = TreeBuilder::new().test("a.html", TestStatus::Pass).build();
//! let runs = [Run::new(1, "chrome", chrome), Run::new(2, "firefox", firefox)];
//! let expected: BTreeSet<String> = ["chrome", "firefox"].map(String::from).into();
//!
//! let scores = ScoreEngine::new().score(&runs, &expected)?;
//! assert_eq!(scores["chrome"], 1.0);
//! assert_eq!(scores["firefox"], 0.0);
//! # Ok::<(), wpt_results::Error>(())
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod align;
pub mod browser_specific;
pub mod builder;
pub mod category;
pub mod error;
pub mod loader;
pub mod model;
pub mod store;
pub mod trends;
pub mod walk;

pub use browser_specific::{
    check_browsers, score_browser_specific_failures, BrowserScores, EngineStats, ScoreEngine,
    ScoreOptions, TestFilter,
};
pub use builder::TreeBuilder;
pub use category::{interop_score, CategoryScorer, CategoryScores, SubtestTally};
pub use error::{Error, Result};
pub use loader::{LoaderCache, LoaderStats, TreeLoader};
pub use model::{
    ObjectId, ResultTree, Run, RunId, SubtestResult, SubtestStatus, TestKind, TestResult,
    TestStatus,
};
pub use store::{MemoryStore, Object, ObjectStore};
pub use trends::{score_tree, TrendMethod, TrendScore, UnknownTrendMethod};
pub use walk::{test_paths, walk_tests};
