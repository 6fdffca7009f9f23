//! Depth-first traversal of a single result tree.

use std::collections::BTreeSet;

use crate::model::{ResultTree, TestResult};

/// Calls `visitor(dir_path, test_name, result)` for every test in `tree`.
///
/// Subdirectories are visited before the tests of a directory, both in
/// sorted order. `dir_path` is `""` for the root and `/a/b` below it, so the
/// full test path is always `format!("{dir_path}/{test_name}")`.
pub fn walk_tests<F>(tree: &ResultTree, mut visitor: F)
where
    F: FnMut(&str, &str, &TestResult),
{
    walk_inner(tree, "", &mut visitor);
}

fn walk_inner<F>(tree: &ResultTree, path: &str, visitor: &mut F)
where
    F: FnMut(&str, &str, &TestResult),
{
    for (dir, subtree) in tree.subtrees() {
        walk_inner(subtree, &format!("{path}/{dir}"), visitor);
    }
    for (name, result) in tree.tests() {
        visitor(path, name, result);
    }
}

/// Full paths of every test in `tree`.
#[must_use]
pub fn test_paths(tree: &ResultTree) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    walk_tests(tree, |dir, name, _| {
        paths.insert(format!("{dir}/{name}"));
    });
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::model::TestStatus;

    #[test]
    fn visits_subtrees_before_tests_in_sorted_order() {
        let tree = TreeBuilder::new()
            .test("z.html", TestStatus::Pass)
            .test("css/b.html", TestStatus::Fail)
            .test("css/a.html", TestStatus::Pass)
            .test("css/grid/c.html", TestStatus::Pass)
            .build();
        let mut seen = Vec::new();
        walk_tests(&tree, |dir, name, _| seen.push(format!("{dir}/{name}")));
        assert_eq!(
            seen,
            ["/css/grid/c.html", "/css/a.html", "/css/b.html", "/z.html"]
        );
        assert_eq!(test_paths(&tree).len(), 4);
    }
}
