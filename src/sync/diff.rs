//! Set algebra over keyed collections.
//!
//! The synchronizer computes created/deleted/updated sets for whole
//! repository listings and for per-manifest selector lists with the same two
//! primitives. Output order is unspecified; callers must not depend on it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Elements of `a` whose key is absent from `b`.
pub fn subtract<T, K, F>(a: &[T], b: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let present: HashSet<K> = b.iter().map(&key).collect();
    a.iter()
        .filter(|item| !present.contains(&key(item)))
        .cloned()
        .collect()
}

/// Elements present in both `a` and `b` (by key) for which `changed`
/// holds. The returned element is the one from `a`.
pub fn intersect<T, K, F, C>(a: &[T], b: &[T], key: F, changed: C) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
    C: Fn(&T, &T) -> bool,
{
    let indexed: HashMap<K, &T> = b.iter().map(|item| (key(item), item)).collect();
    a.iter()
        .filter(|item| {
            indexed
                .get(&key(item))
                .is_some_and(|other| changed(item, other))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        id: &'static str,
        hash: &'static str,
    }

    fn entry(id: &'static str, hash: &'static str) -> Entry {
        Entry { id, hash }
    }

    #[test]
    fn test_subtract_finds_missing_keys() {
        let fresh = vec![entry("a", "1"), entry("b", "1"), entry("c", "1")];
        let stored = vec![entry("b", "1")];

        let created = subtract(&fresh, &stored, |e| e.id);
        assert_eq!(created, vec![entry("a", "1"), entry("c", "1")]);

        let deleted = subtract(&stored, &fresh, |e| e.id);
        assert!(deleted.is_empty());
    }

    #[test]
    fn test_subtract_of_equal_sets_is_empty() {
        let items = vec![entry("a", "1"), entry("b", "2")];
        assert!(subtract(&items, &items, |e| e.id).is_empty());
    }

    #[test]
    fn test_subtract_against_empty() {
        let items = vec![entry("a", "1")];
        assert_eq!(subtract(&items, &[], |e| e.id), items);
        assert!(subtract(&[], &items, |e| e.id).is_empty());
    }

    #[test]
    fn test_intersect_applies_changed_predicate() {
        let fresh = vec![entry("a", "2"), entry("b", "1"), entry("c", "9")];
        let stored = vec![entry("a", "1"), entry("b", "1")];

        let updated = intersect(&fresh, &stored, |e| e.id, |x, y| x.hash != y.hash);
        // "c" is not in both; "b" is unchanged.
        assert_eq!(updated, vec![entry("a", "2")]);
    }

    #[test]
    fn test_intersect_returns_fresh_side() {
        let fresh = vec![entry("a", "new")];
        let stored = vec![entry("a", "old")];
        let updated = intersect(&fresh, &stored, |e| e.id, |x, y| x.hash != y.hash);
        assert_eq!(updated[0].hash, "new");
    }

    #[test]
    fn test_created_deleted_updated_are_disjoint() {
        let fresh = vec![entry("a", "1"), entry("b", "2"), entry("d", "1")];
        let stored = vec![entry("b", "1"), entry("c", "1")];

        let created = subtract(&fresh, &stored, |e| e.id);
        let deleted = subtract(&stored, &fresh, |e| e.id);
        let updated = intersect(&fresh, &stored, |e| e.id, |x, y| x.hash != y.hash);

        let created_ids: Vec<_> = created.iter().map(|e| e.id).collect();
        let deleted_ids: Vec<_> = deleted.iter().map(|e| e.id).collect();
        let updated_ids: Vec<_> = updated.iter().map(|e| e.id).collect();

        assert_eq!(created_ids, vec!["a", "d"]);
        assert_eq!(deleted_ids, vec!["c"]);
        assert_eq!(updated_ids, vec!["b"]);
        for id in &created_ids {
            assert!(!deleted_ids.contains(id) && !updated_ids.contains(id));
        }
        for id in &updated_ids {
            assert!(!deleted_ids.contains(id));
        }
    }

    #[test]
    fn test_works_over_plain_strings() {
        let new = vec!["ns-a".to_string(), "ns-b".to_string()];
        let old = vec!["ns-b".to_string(), "ns-c".to_string()];

        let added = subtract(&new, &old, |s| s.clone());
        let removed = subtract(&old, &new, |s| s.clone());
        assert_eq!(added, vec!["ns-a"]);
        assert_eq!(removed, vec!["ns-c"]);
    }
}
