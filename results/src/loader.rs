//! Materializes stored run trees as [`ResultTree`]s.
//!
//! The loader keeps two identity caches (tree id and test id). Loading two
//! runs that share a directory yields the *same* `Arc` for that directory,
//! which is what lets the scoring engine skip unchanged subtrees in O(1).
//!
//! The caches only grow. That is fine for a bounded batch job, but memory use
//! scales with the number of distinct trees and tests across every run loaded
//! through one cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    ObjectId, ResultTree, RunId, SubtestResult, SubtestStatus, TestResult, TestStatus,
};
use crate::store::{EntryKind, Object, ObjectStore};

/// Identity caches for loaded trees and tests.
#[derive(Debug, Default)]
pub struct LoaderCache {
    trees: HashMap<ObjectId, Arc<ResultTree>>,
    tests: HashMap<ObjectId, Arc<TestResult>>,
    tree_hits: u64,
    test_hits: u64,
}

/// Size and hit counters of a [`LoaderCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderStats {
    /// Distinct trees cached.
    pub trees: usize,
    /// Distinct tests cached.
    pub tests: usize,
    /// Tree lookups answered from the cache.
    pub tree_hits: u64,
    /// Test lookups answered from the cache.
    pub test_hits: u64,
}

impl LoaderCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            trees: self.trees.len(),
            tests: self.tests.len(),
            tree_hits: self.tree_hits,
            test_hits: self.test_hits,
        }
    }
}

/// Loads run trees from an [`ObjectStore`], deduplicating by content id.
pub struct TreeLoader<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    cache: LoaderCache,
}

impl<'s, S: ObjectStore + ?Sized> TreeLoader<'s, S> {
    /// Creates a loader with a fresh cache.
    pub fn new(store: &'s S) -> Self {
        Self::with_cache(store, LoaderCache::new())
    }

    /// Creates a loader reusing an existing cache.
    pub fn with_cache(store: &'s S, cache: LoaderCache) -> Self {
        Self { store, cache }
    }

    /// Gives the cache back, e.g. to hand it to another loader.
    pub fn into_cache(self) -> LoaderCache {
        self.cache
    }

    /// Current cache counters.
    pub fn stats(&self) -> LoaderStats {
        self.cache.stats()
    }

    /// Loads the full result tree of a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown, an object is missing, an entry
    /// is neither tree nor blob, or a leaf is not a valid result document.
    /// Errors are annotated with the run id.
    pub fn get_tree(&mut self, run_id: RunId) -> Result<Arc<ResultTree>> {
        let root = self.store.run_root(run_id)?;
        let tree = self
            .read_tree(root)
            .map_err(|e| e.in_run_set(vec![run_id]))?;
        let stats = self.cache.stats();
        info!(
            run_id,
            root = %root,
            cached_trees = stats.trees,
            cached_tests = stats.tests,
            "loaded run tree"
        );
        Ok(tree)
    }

    /// Loads the tree with the given id.
    ///
    /// # Errors
    ///
    /// See [`TreeLoader::get_tree`].
    pub fn read_tree(&mut self, id: ObjectId) -> Result<Arc<ResultTree>> {
        if let Some(tree) = self.cache.trees.get(&id) {
            self.cache.tree_hits += 1;
            return Ok(Arc::clone(tree));
        }

        let entries = match self.store.read(&id)?.into_owned() {
            Object::Tree(entries) => entries,
            Object::Blob(_) => {
                return Err(Error::ObjectKindMismatch {
                    id,
                    expected: "tree",
                })
            }
        };

        let mut subtrees = BTreeMap::new();
        let mut tests = BTreeMap::new();
        for entry in entries {
            match entry.kind {
                EntryKind::Tree => {
                    let subtree = self.read_tree(entry.id)?;
                    subtrees.insert(entry.name, subtree);
                }
                EntryKind::Blob => {
                    let name = decode_test_name(&entry.name)?;
                    let test = self.read_test(entry.id, &name)?;
                    if tests.insert(name.clone(), test).is_some() {
                        return Err(Error::DuplicateTestName {
                            name,
                            file_name: entry.name,
                        });
                    }
                }
                EntryKind::Other(kind) => {
                    return Err(Error::UnexpectedEntryKind {
                        name: entry.name,
                        kind,
                    })
                }
            }
        }

        let tree = Arc::new(ResultTree::new(id, subtrees, tests));
        self.cache.trees.insert(id, Arc::clone(&tree));
        Ok(tree)
    }

    fn read_test(&mut self, id: ObjectId, name: &str) -> Result<Arc<TestResult>> {
        if let Some(test) = self.cache.tests.get(&id) {
            self.cache.test_hits += 1;
            return Ok(Arc::clone(test));
        }

        let test = match self.store.read(&id)?.as_ref() {
            Object::Blob(content) => Arc::new(parse_result(id, name, content)?),
            Object::Tree(_) => {
                return Err(Error::ObjectKindMismatch {
                    id,
                    expected: "blob",
                })
            }
        };
        debug!(test = name, id = %id, "decoded result document");
        self.cache.tests.insert(id, Arc::clone(&test));
        Ok(test)
    }
}

#[derive(Deserialize)]
struct RawResult {
    status: String,
    #[serde(default)]
    subtests: Option<Vec<RawSubtest>>,
}

#[derive(Deserialize)]
struct RawSubtest {
    name: String,
    status: String,
}

/// Decodes one result document.
///
/// The legacy harness writes `"status": ""`; a document without a `status`
/// field at all is malformed.
///
/// # Errors
///
/// Returns [`Error::MalformedResult`] if the content is not a result document
/// (including a missing `status`),
/// or an unknown-status error if a status is outside the known enumeration.
pub fn parse_result(id: ObjectId, test: &str, content: &[u8]) -> Result<TestResult> {
    let raw: RawResult =
        serde_json::from_slice(content).map_err(|source| Error::MalformedResult {
            test: test.to_string(),
            source,
        })?;

    let status = TestStatus::parse(&raw.status).ok_or_else(|| Error::UnknownTestStatus {
        test: test.to_string(),
        status: raw.status.clone(),
    })?;

    let subtests = raw
        .subtests
        .unwrap_or_default()
        .into_iter()
        .map(|s| {
            let status =
                SubtestStatus::parse(&s.status).ok_or_else(|| Error::UnknownSubtestStatus {
                    test: test.to_string(),
                    subtest: s.name.clone(),
                    status: s.status.clone(),
                })?;
            Ok(SubtestResult::new(s.name, status))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TestResult::with_subtests(id, status, subtests))
}

/// Turns a stored file name (`<escaped test name>.json`) back into a test name.
///
/// # Errors
///
/// Returns [`Error::UnexpectedFileName`] if the `.json` suffix is missing and
/// [`Error::InvalidEscape`] if a percent-escape is malformed or decodes to
/// invalid UTF-8.
pub fn decode_test_name(file_name: &str) -> Result<String> {
    let stem = file_name
        .strip_suffix(".json")
        .ok_or_else(|| Error::UnexpectedFileName {
            name: file_name.to_string(),
        })?;
    let invalid = || Error::InvalidEscape {
        name: file_name.to_string(),
    };

    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3).ok_or_else(invalid)?;
            let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| invalid())
}
