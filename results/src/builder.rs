//! Hand-built result trees.
//!
//! Every node and test built here gets a fresh synthetic id, unique across all
//! builders in the process, so two builders never accidentally produce
//! identity-equal content. Share an existing [`ResultTree`] or [`TestResult`]
//! explicitly when identity equality is wanted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::{ObjectId, ResultTree, SubtestResult, SubtestStatus, TestResult, TestStatus};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn fresh_id() -> ObjectId {
    ObjectId::synthetic(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

enum TestEntry {
    Owned {
        status: TestStatus,
        subtests: Vec<SubtestResult>,
    },
    Shared(Arc<TestResult>),
}

#[derive(Default)]
struct Node {
    // Set for a directory placed with `shared_subtree`; wins over any content.
    shared: Option<Arc<ResultTree>>,
    dirs: BTreeMap<String, Node>,
    tests: BTreeMap<String, TestEntry>,
}

impl Node {
    /// Walks to the directory holding `path`'s last segment, creating
    /// directories on the way. Walking into a shared directory drops it in
    /// favour of a fresh, owned one.
    fn parent_of<'p>(&mut self, path: &'p str) -> (&mut Node, &'p str) {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let leaf = parts.pop().unwrap_or("");
        let mut node = self;
        for part in parts {
            node = node.dirs.entry(part.to_string()).or_default();
            node.shared = None;
        }
        (node, leaf)
    }

    fn freeze(self) -> Arc<ResultTree> {
        if let Some(tree) = self.shared {
            return tree;
        }
        let subtrees = self
            .dirs
            .into_iter()
            .map(|(name, node)| (name, node.freeze()))
            .collect();
        let tests = self
            .tests
            .into_iter()
            .map(|(name, entry)| {
                let test = match entry {
                    TestEntry::Owned { status, subtests } => {
                        Arc::new(TestResult::with_subtests(fresh_id(), status, subtests))
                    }
                    TestEntry::Shared(test) => test,
                };
                (name, test)
            })
            .collect();
        Arc::new(ResultTree::new(fresh_id(), subtrees, tests))
    }
}

/// Builder for in-memory result trees addressed by slash-separated paths.
#[derive(Default)]
pub struct TreeBuilder {
    root: Node,
}

impl TreeBuilder {
    /// Starts an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a test with the given harness status. Intermediate
    /// directories are created as needed.
    #[must_use]
    pub fn test(mut self, path: &str, status: TestStatus) -> Self {
        let (dir, name) = self.root.parent_of(path);
        dir.tests.insert(
            name.to_string(),
            TestEntry::Owned {
                status,
                subtests: Vec::new(),
            },
        );
        self
    }

    /// Appends a subtest to a test. A missing test is created with status
    /// `OK`; a shared test is replaced by an owned copy of itself first.
    #[must_use]
    pub fn subtest(mut self, test_path: &str, name: &str, status: SubtestStatus) -> Self {
        let (dir, test_name) = self.root.parent_of(test_path);
        let entry = dir
            .tests
            .entry(test_name.to_string())
            .or_insert(TestEntry::Owned {
                status: TestStatus::Ok,
                subtests: Vec::new(),
            });
        if let TestEntry::Shared(shared) = entry {
            *entry = TestEntry::Owned {
                status: shared.status(),
                subtests: shared.subtests().to_vec(),
            };
        }
        if let TestEntry::Owned { subtests, .. } = entry {
            subtests.push(SubtestResult::new(name, status));
        }
        self
    }

    /// Places an existing test result (and its identity) at `path`.
    #[must_use]
    pub fn shared_test(mut self, path: &str, test: Arc<TestResult>) -> Self {
        let (dir, name) = self.root.parent_of(path);
        dir.tests.insert(name.to_string(), TestEntry::Shared(test));
        self
    }

    /// Places an existing subtree (and its identity) at directory `path`.
    #[must_use]
    pub fn shared_subtree(mut self, path: &str, tree: Arc<ResultTree>) -> Self {
        let (dir, name) = self.root.parent_of(path);
        dir.dirs.insert(
            name.to_string(),
            Node {
                shared: Some(tree),
                ..Node::default()
            },
        );
        self
    }

    /// Freezes the tree, assigning fresh ids to every owned node and test.
    #[must_use]
    pub fn build(self) -> Arc<ResultTree> {
        self.root.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_directories() {
        let tree = TreeBuilder::new()
            .test("a/b/c.html", TestStatus::Pass)
            .subtest("a/d.html", "first", SubtestStatus::Fail)
            .build();
        let a = &tree.subtrees()["a"];
        assert!(a.subtrees()["b"].tests().contains_key("c.html"));
        assert_eq!(a.tests()["d.html"].subtests().len(), 1);
        assert_eq!(a.tests()["d.html"].status(), TestStatus::Ok);
    }

    #[test]
    fn ids_are_unique_across_builders() {
        let t1 = TreeBuilder::new().test("x.html", TestStatus::Pass).build();
        let t2 = TreeBuilder::new().test("x.html", TestStatus::Pass).build();
        assert_ne!(t1.id(), t2.id());
        assert_ne!(t1.tests()["x.html"].id(), t2.tests()["x.html"].id());
    }

    #[test]
    fn shared_subtree_keeps_identity() {
        let shared = TreeBuilder::new().test("x.html", TestStatus::Fail).build();
        let t = TreeBuilder::new()
            .shared_subtree("dir", Arc::clone(&shared))
            .build();
        assert!(Arc::ptr_eq(&t.subtrees()["dir"], &shared));
    }
}
