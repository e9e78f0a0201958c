use std::collections::BTreeMap;

use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{HybridArt, KeyTable, U64Art};

fn be(k: u64) -> [u8; 8] {
    k.to_be_bytes()
}

#[test]
fn small_scan() {
    let mut tree = U64Art::new();
    let key_cnt = 1000u64;

    for i in 0..key_cnt {
        tree.insert(&be(i), i).unwrap();
    }

    let low_v = 200u64;
    let sum = tree.scan(&be(low_v), 10);
    let expected: u64 = (low_v..low_v + 10).sum();
    assert_eq!(sum, expected);
}

#[test]
fn scan_from_absent_key() {
    let mut tree = U64Art::new();
    for i in (0..1000u64).step_by(2) {
        tree.insert(&be(i), i).unwrap();
    }

    // Lower bound of an odd key starts at the next even one.
    let values: Vec<u64> = tree.lower_bound(&be(101)).take(3).collect();
    assert_eq!(values, vec![102, 104, 106]);

    // Past the last key the cursor is immediately exhausted.
    assert_eq!(tree.lower_bound(&be(999)).next(), None);
    assert_eq!(tree.scan(&be(999), 10), 0);
}

#[test]
fn full_iteration_is_sorted() {
    let key_cnt = 10_000u64;
    let mut key_space: Vec<u64> = (0..key_cnt).map(|i| i * 7 + (i % 13)).collect();
    key_space.sort_unstable();
    key_space.dedup();
    let sorted = key_space.clone();

    let mut r = StdRng::seed_from_u64(42);
    key_space.shuffle(&mut r);

    let mut tree = U64Art::new();
    for v in key_space.iter() {
        tree.insert(&be(*v), *v).unwrap();
    }

    let walked: Vec<u64> = tree.lower_bound(&be(0)).collect();
    assert_eq!(walked, sorted);
}

#[test]
fn large_scan() {
    let key_cnt = 200_000usize;
    let mut key_space: Vec<u64> = (0..key_cnt as u64).collect();

    let mut r = StdRng::seed_from_u64(42);
    key_space.shuffle(&mut r);

    let mut tree = U64Art::new();
    for v in key_space.iter() {
        tree.insert(&be(*v), *v).unwrap();
    }

    let scan_counts = [3u64, 13, 65];

    // positive scan
    for _ in 0..10 {
        let scan_cnt = *scan_counts.choose(&mut r).unwrap();
        let low_v = r.gen_range(0..(key_cnt as u64 - scan_cnt));

        let sum = tree.scan(&be(low_v), scan_cnt as usize);
        let expected: u64 = (low_v..low_v + scan_cnt).sum();
        assert_eq!(sum, expected);
    }

    // negative scan
    for _ in 0..10 {
        let scan_cnt = *scan_counts.choose(&mut r).unwrap();
        let low_v = r.gen_range(key_cnt as u64..2 * key_cnt as u64);
        assert_eq!(tree.scan(&be(low_v), scan_cnt as usize), 0);
    }
}

#[test]
fn cursor_crosses_node_classes() {
    // Sparse high bytes force a mix of N4/N16/N48 on the path; the cursor
    // must track per-layout frames while climbing between subtrees.
    let mut tree = U64Art::new();
    let mut expected = Vec::new();
    for hi in [0u64, 3, 200] {
        for lo in 0..30u64 {
            let k = (hi << 32) | lo;
            tree.insert(&be(k), k).unwrap();
            expected.push(k);
        }
    }
    expected.sort_unstable();

    let walked: Vec<u64> = tree.lower_bound(&be(0)).collect();
    assert_eq!(walked, expected);

    // Start inside the middle subtree.
    let from = 3u64 << 32;
    let tail: Vec<u64> = tree.lower_bound(&be(from + 10)).take(25).collect();
    let want: Vec<u64> = expected
        .iter()
        .copied()
        .filter(|k| *k >= from + 10)
        .take(25)
        .collect();
    assert_eq!(tail, want);
}

#[test]
fn lower_bound_with_long_prefixes() {
    let mut tree: HybridArt<31, KeyTable<31>> = HybridArt::with_loader(KeyTable::new());

    let mut keys = Vec::new();
    for b in [b'c', b'f', b'k'] {
        let mut k = [b'a'; 31];
        k[20] = b;
        keys.push(k);
    }
    for k in &keys {
        let v = tree.loader_mut().intern(k);
        tree.insert(k, v).unwrap();
    }

    // Probe diverging inside the skipped prefix region, below the stored
    // keys: the whole tree is the answer.
    let mut low = [b'a'; 31];
    low[15] = b'Z'; // 'Z' < 'a'
    let walked: Vec<u64> = tree.lower_bound(&low).collect();
    assert_eq!(walked, vec![0, 1, 2]);

    // Probe above every stored key.
    let mut high = [b'a'; 31];
    high[15] = b'z';
    assert_eq!(tree.lower_bound(&high).next(), None);

    // Probe between the divergence bytes.
    let mut mid = [b'a'; 31];
    mid[20] = b'g';
    let walked: Vec<u64> = tree.lower_bound(&mid).collect();
    assert_eq!(walked, vec![2]);
}

#[test]
fn scan_unions_generations_after_merge() {
    // Inserts after a merge grow a fresh dynamic tree; scans must keep
    // seeing the merged keys alongside the new ones.
    let mut tree = U64Art::new();
    for k in (0..1000u64).step_by(2) {
        tree.insert(&be(k), k).unwrap();
    }
    tree.merge().unwrap();
    for k in (1..1000u64).step_by(2) {
        tree.insert(&be(k), k).unwrap();
    }
    assert!(tree.memory_bytes() > 0);
    assert!(tree.static_memory_bytes() > 0);

    // The two generations interleave into one ordered walk.
    let walked: Vec<u64> = tree.lower_bound(&be(0)).collect();
    let expected: Vec<u64> = (0..1000).collect();
    assert_eq!(walked, expected);

    // Ranges spanning the generation boundary sum both sides.
    let sum = tree.scan(&be(100), 10);
    assert_eq!(sum, (100..110u64).sum::<u64>());

    // A lower bound landing inside the merged generation still works.
    let tail: Vec<u64> = tree.lower_bound(&be(996)).collect();
    assert_eq!(tail, vec![996, 997, 998, 999]);
}

#[test]
fn scan_yields_overlapping_keys_once() {
    // Keys reinserted after a merge live in both trees; the union walk must
    // yield each of them exactly once.
    let mut tree = U64Art::new();
    for k in 0..600u64 {
        tree.insert(&be(k), k).unwrap();
    }
    tree.merge().unwrap();
    for k in 400..1000u64 {
        tree.insert(&be(k), k).unwrap();
    }

    let walked: Vec<u64> = tree.lower_bound(&be(0)).collect();
    let expected: Vec<u64> = (0..1000).collect();
    assert_eq!(walked, expected);
}

#[test]
fn scan_prefers_dynamic_value_on_shadowed_key() {
    // A key rewritten after a merge scans with its fresh value, matching
    // point lookups.
    let mut tree: HybridArt<8, KeyTable<8>> = HybridArt::with_loader(KeyTable::new());
    let keys: Vec<[u8; 8]> = (0..10u64).map(|k| k.to_be_bytes()).collect();
    let mut values = Vec::new();
    for k in &keys {
        let v = tree.loader_mut().intern(k);
        tree.insert(k, v).unwrap();
        values.push(v);
    }
    tree.merge().unwrap();

    let rewritten = tree.loader_mut().intern(&keys[5]);
    tree.insert(&keys[5], rewritten).unwrap();

    let walked: Vec<u64> = tree.lower_bound(&keys[0]).collect();
    let mut expected = values;
    expected[5] = rewritten;
    assert_eq!(walked, expected);
    assert_eq!(tree.get(&keys[5]), Some(rewritten));
}

#[test]
fn scan_matches_btreemap_oracle() {
    let mut tree = U64Art::new();
    let mut oracle = BTreeMap::new();

    let mut r = StdRng::seed_from_u64(9);
    for _ in 0..20_000 {
        let k = r.gen::<u64>() % 1_000_000;
        let _ = tree.insert(&be(k), k);
        oracle.insert(k, k);
    }

    for _ in 0..200 {
        let start = r.gen::<u64>() % 1_000_000;
        let range = r.gen_range(1..50usize);

        let got = tree.scan(&be(start), range);
        let expected: u64 = oracle.range(start..).take(range).map(|(_, v)| *v).sum();
        assert_eq!(got, expected);
    }
}
