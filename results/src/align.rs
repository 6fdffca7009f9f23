//! Sorted cursors and the N-way merge-join used to line up tests and subtests
//! across browsers.
//!
//! A [`Cursor`] is a sorted, read-only view over one browser's collection. It
//! never reorders the caller's data: subtest sequences are copied into a
//! sorted index instead. [`AlignedMerge`] walks N cursors in lock-step and
//! yields, for every key in the union, which browsers have it.

use std::collections::BTreeMap;

use crate::model::SubtestResult;

/// Sorted cursor over `(key, value)` pairs with unique keys.
#[derive(Debug, Clone)]
pub struct Cursor<'a, T> {
    items: Vec<(&'a str, &'a T)>,
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    /// Cursor over a name-keyed map. `BTreeMap` keys are already sorted and
    /// unique.
    #[must_use]
    pub fn from_map(map: &'a BTreeMap<String, T>) -> Self {
        Self {
            items: map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            pos: 0,
        }
    }

    /// True while the cursor points at an item.
    #[must_use]
    pub fn has_current(&self) -> bool {
        self.pos < self.items.len()
    }

    /// Key of the current item.
    #[must_use]
    pub fn key(&self) -> Option<&'a str> {
        self.items.get(self.pos).map(|(k, _)| *k)
    }

    /// Value of the current item.
    #[must_use]
    pub fn value(&self) -> Option<&'a T> {
        self.items.get(self.pos).map(|(_, v)| *v)
    }

    /// Moves to the next item. Returns false once past the end.
    pub fn advance(&mut self) -> bool {
        if self.pos >= self.items.len() {
            return false;
        }
        self.pos += 1;
        true
    }

    /// Number of items remaining, including the current one.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.len() - self.pos.min(self.items.len())
    }
}

impl<'a> Cursor<'a, SubtestResult> {
    /// Cursor over a subtest sequence, sorted by name.
    ///
    /// When a name repeats, only its first occurrence in reported order is
    /// kept; later ones are ignored.
    #[must_use]
    pub fn from_subtests(subtests: &'a [SubtestResult]) -> Self {
        let mut items: Vec<(&'a str, &'a SubtestResult)> =
            subtests.iter().map(|s| (s.name.as_str(), s)).collect();
        // Stable: the first occurrence of a duplicated name stays first.
        items.sort_by(|a, b| a.0.cmp(b.0));
        items.dedup_by(|later, earlier| later.0 == earlier.0);
        Self { items, pos: 0 }
    }
}

/// One step of an [`AlignedMerge`]: a key and, per browser, its value if that
/// browser has the key.
#[derive(Debug, Clone)]
pub struct Aligned<'a, T> {
    /// The key shared by every present entry.
    pub key: &'a str,
    /// Per-browser values, in cursor order.
    pub entries: Vec<Option<&'a T>>,
}

impl<'a, T> Aligned<'a, T> {
    /// Number of browsers that have this key.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// All values if every browser has this key.
    #[must_use]
    pub fn all_present(&self) -> Option<Vec<&'a T>> {
        self.entries.iter().copied().collect()
    }

    /// Index of the browser missing this key, if exactly one is missing.
    #[must_use]
    pub fn sole_missing(&self) -> Option<usize> {
        if self.present_count() + 1 != self.entries.len() {
            return None;
        }
        self.entries.iter().position(Option::is_none)
    }
}

/// N-way merge-join over sorted cursors.
///
/// Each step finds the smallest current key among cursors with data, reports
/// which cursors sit on it, and advances exactly those cursors. Iteration
/// ends when every cursor is exhausted, so the keys produced are the union
/// of all cursors' keys, in ascending order, each exactly once.
#[derive(Debug, Clone)]
pub struct AlignedMerge<'a, T> {
    cursors: Vec<Cursor<'a, T>>,
}

impl<'a, T> AlignedMerge<'a, T> {
    /// Creates a merge over the given cursors, one per browser.
    #[must_use]
    pub fn new(cursors: Vec<Cursor<'a, T>>) -> Self {
        Self { cursors }
    }

    /// Merge over the `tests` or `subtrees` maps of N nodes.
    pub fn over_maps<I>(maps: I) -> Self
    where
        I: IntoIterator<Item = &'a BTreeMap<String, T>>,
        T: 'a,
    {
        Self::new(maps.into_iter().map(Cursor::from_map).collect())
    }

    fn smallest_key(&self) -> Option<&'a str> {
        self.cursors.iter().filter_map(Cursor::key).min()
    }
}

impl<'a> AlignedMerge<'a, SubtestResult> {
    /// Merge over N subtest sequences.
    pub fn over_subtests<I>(sequences: I) -> Self
    where
        I: IntoIterator<Item = &'a [SubtestResult]>,
    {
        Self::new(sequences.into_iter().map(Cursor::from_subtests).collect())
    }
}

impl<'a, T> Iterator for AlignedMerge<'a, T> {
    type Item = Aligned<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.smallest_key()?;
        let entries = self
            .cursors
            .iter_mut()
            .map(|cursor| {
                if cursor.key() == Some(key) {
                    let value = cursor.value();
                    cursor.advance();
                    value
                } else {
                    None
                }
            })
            .collect();
        Some(Aligned { key, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubtestStatus;

    fn subtests(names: &[(&str, SubtestStatus)]) -> Vec<SubtestResult> {
        names
            .iter()
            .map(|(n, s)| SubtestResult::new(*n, *s))
            .collect()
    }

    #[test]
    fn cursor_sorts_without_touching_input() {
        let input = subtests(&[
            ("c", SubtestStatus::Pass),
            ("a", SubtestStatus::Fail),
            ("b", SubtestStatus::Pass),
        ]);
        let mut cursor = Cursor::from_subtests(&input);
        let mut keys = Vec::new();
        while let Some(k) = cursor.key() {
            keys.push(k);
            cursor.advance();
        }
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(input[0].name, "c");
        assert!(!cursor.advance());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let input = subtests(&[
            ("test 1", SubtestStatus::Pass),
            ("test 2", SubtestStatus::Pass),
            ("test 1", SubtestStatus::Fail),
        ]);
        let cursor = Cursor::from_subtests(&input);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.value().map(|s| s.status), Some(SubtestStatus::Pass));
    }

    #[test]
    fn merge_reports_union_with_gaps() {
        let a = subtests(&[("x", SubtestStatus::Pass), ("y", SubtestStatus::Pass)]);
        let b = subtests(&[("y", SubtestStatus::Fail), ("z", SubtestStatus::Pass)]);
        let steps: Vec<_> = AlignedMerge::over_subtests([a.as_slice(), b.as_slice()])
            .map(|s| (s.key, s.present_count(), s.sole_missing()))
            .collect();
        assert_eq!(
            steps,
            vec![("x", 1, Some(1)), ("y", 2, None), ("z", 1, Some(0))]
        );
    }

    #[test]
    fn merge_of_empty_cursors_is_empty() {
        let empty: BTreeMap<String, u32> = BTreeMap::new();
        assert_eq!(AlignedMerge::over_maps([&empty, &empty]).count(), 0);
        let none: Vec<&BTreeMap<String, u32>> = Vec::new();
        assert_eq!(AlignedMerge::over_maps(none).count(), 0);
    }

    #[test]
    fn all_present_only_when_every_browser_has_key() {
        let mut m1 = BTreeMap::new();
        m1.insert("a".to_string(), 1);
        m1.insert("b".to_string(), 2);
        let mut m2 = BTreeMap::new();
        m2.insert("b".to_string(), 3);
        let shared: Vec<_> = AlignedMerge::over_maps([&m1, &m2])
            .filter_map(|s| s.all_present().map(|v| (s.key, v)))
            .collect();
        assert_eq!(shared, vec![("b", vec![&2, &3])]);
    }
}
