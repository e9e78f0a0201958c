//! Property-based tests pinning the index invariants against a BTreeMap
//! model: round-trip, overwrite, erase, ordering, merge equivalence,
//! prefix handling past the inline cap, and grow/shrink symmetry.

use std::collections::BTreeMap;
use std::collections::HashSet;

use hybart::{HybridArt, KeyTable, U64Art};
use proptest::prelude::*;

fn u63() -> impl Strategy<Value = u64> {
    any::<u64>().prop_map(|v| v >> 1)
}

/// Distinct 63-bit keys.
fn unique_keys(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::hash_set(u63(), 0..max_len).prop_map(|s| s.into_iter().collect())
}

/// Distinct 31-byte keys drawn from a narrow alphabet so shared prefixes
/// and splits past the 9-byte inline cap actually happen.
fn long_keys(max_len: usize) -> impl Strategy<Value = Vec<[u8; 31]>> {
    prop::collection::vec(
        (
            prop::collection::vec(prop::sample::select(vec![b'a', b'b']), 31),
            0usize..31,
            any::<u8>(),
        ),
        0..max_len,
    )
    .prop_map(|specs| {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (bytes, pos, byte) in specs {
            let mut key = [0u8; 31];
            key.copy_from_slice(&bytes);
            key[pos] = byte;
            if seen.insert(key) {
                keys.push(key);
            }
        }
        keys
    })
}

proptest! {
    /// Every inserted (key, value) pair is found again; value is the key.
    #[test]
    fn round_trip(keys in unique_keys(500)) {
        let mut tree = U64Art::new();
        for k in &keys {
            prop_assert!(tree.insert(&k.to_be_bytes(), *k).unwrap());
        }
        for k in &keys {
            prop_assert_eq!(tree.get(&k.to_be_bytes()), Some(*k));
        }
    }

    /// Values independent of keys round-trip through a key table, and
    /// upsert replaces them in place.
    #[test]
    fn round_trip_and_overwrite_with_table(keys in long_keys(200)) {
        let mut tree: HybridArt<31, KeyTable<31>> = HybridArt::with_loader(KeyTable::new());

        let mut values = Vec::new();
        for k in &keys {
            let v = tree.loader_mut().intern(k);
            tree.insert(k, v).unwrap();
            values.push(v);
        }
        for (k, v) in keys.iter().zip(&values) {
            prop_assert_eq!(tree.get(k), Some(*v));
        }

        // Overwrite each key with a fresh value.
        let mut new_values = Vec::new();
        for k in &keys {
            let v = tree.loader_mut().intern(k);
            tree.upsert(k, v).unwrap();
            new_values.push(v);
        }
        for (k, v) in keys.iter().zip(&new_values) {
            prop_assert_eq!(tree.get(k), Some(*v));
        }
    }

    /// Erased keys disappear; everything else stays.
    #[test]
    fn erase_removes_only_the_key(keys in unique_keys(400), split in 0..400usize) {
        let mut tree = U64Art::new();
        for k in &keys {
            tree.insert(&k.to_be_bytes(), *k).unwrap();
        }

        let split = split.min(keys.len());
        for k in keys.iter().take(split) {
            tree.erase(&k.to_be_bytes());
        }

        for k in keys.iter().take(split) {
            prop_assert!(tree.get(&k.to_be_bytes()).is_none());
        }
        for k in keys.iter().skip(split) {
            prop_assert_eq!(tree.get(&k.to_be_bytes()), Some(*k));
        }
    }

    /// Walking from the smallest key yields every value exactly once, in
    /// byte-lex (here: numeric) order.
    #[test]
    fn ordering(keys in unique_keys(500)) {
        let mut tree = U64Art::new();
        let mut model = BTreeMap::new();
        for k in &keys {
            tree.insert(&k.to_be_bytes(), *k).unwrap();
            model.insert(*k, *k);
        }

        let walked: Vec<u64> = tree.lower_bound(&0u64.to_be_bytes()).collect();
        let expected: Vec<u64> = model.values().copied().collect();
        prop_assert_eq!(walked, expected);
    }

    /// Lookups are unchanged by merge, for present and absent keys alike.
    #[test]
    fn merge_equivalence(keys in unique_keys(400), probes in prop::collection::vec(u63(), 100)) {
        let mut tree = U64Art::new();
        for k in &keys {
            tree.insert(&k.to_be_bytes(), *k).unwrap();
        }

        let before: Vec<Option<u64>> = probes.iter().map(|p| tree.get(&p.to_be_bytes())).collect();
        tree.merge().unwrap();
        let after: Vec<Option<u64>> = probes.iter().map(|p| tree.get(&p.to_be_bytes())).collect();
        prop_assert_eq!(before, after);

        for k in &keys {
            prop_assert_eq!(tree.get(&k.to_be_bytes()), Some(*k));
        }
    }

    /// Scans agree with the model before the merge, after it, and after a
    /// fresh dynamic generation grows on top of the merged tree.
    #[test]
    fn scan_equivalence(
        keys in unique_keys(300),
        extra in unique_keys(100),
        start in u63(),
        range in 1..64usize,
    ) {
        let mut tree = U64Art::new();
        let mut model = BTreeMap::new();
        for k in &keys {
            tree.insert(&k.to_be_bytes(), *k).unwrap();
            model.insert(*k, *k);
        }

        let expected: u64 = model.range(start..).take(range).map(|(_, v)| *v).sum();
        prop_assert_eq!(tree.scan(&start.to_be_bytes(), range), expected);

        tree.merge().unwrap();
        prop_assert_eq!(tree.scan(&start.to_be_bytes(), range), expected);

        for k in &extra {
            let _ = tree.insert(&k.to_be_bytes(), *k);
            model.insert(*k, *k);
        }
        let expected: u64 = model.range(start..).take(range).map(|(_, v)| *v).sum();
        prop_assert_eq!(tree.scan(&start.to_be_bytes(), range), expected);
    }

    /// Keys distinguished only past the inline prefix cap stay distinct,
    /// and near-miss probes stay absent.
    #[test]
    fn prefix_beyond_inline_cap(keys in long_keys(150), probes in long_keys(50)) {
        let mut tree: HybridArt<31, KeyTable<31>> = HybridArt::with_loader(KeyTable::new());

        let stored: HashSet<[u8; 31]> = keys.iter().copied().collect();
        let mut values = Vec::new();
        for k in &keys {
            let v = tree.loader_mut().intern(k);
            tree.insert(k, v).unwrap();
            values.push(v);
        }

        for (k, v) in keys.iter().zip(&values) {
            prop_assert_eq!(tree.get(k), Some(*v));
        }
        for p in &probes {
            if !stored.contains(p) {
                prop_assert!(tree.get(p).is_none());
            }
        }
    }

    /// Inserting then erasing in reverse restores a fresh-constructed tree.
    #[test]
    fn grow_shrink_symmetry(keys in unique_keys(300)) {
        let mut tree = U64Art::new();
        for k in &keys {
            tree.insert(&k.to_be_bytes(), *k).unwrap();
        }
        for k in keys.iter().rev() {
            tree.erase(&k.to_be_bytes());
        }

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.memory_bytes(), 0);
        prop_assert_eq!(tree.stats().class_counts(), (0, 0, 0, 0));
    }
}
