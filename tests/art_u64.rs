use std::collections::BTreeMap;

use hybart::U64Art;
use rand::{
    prelude::{SliceRandom, StdRng},
    Rng, SeedableRng,
};

enum TreeOp {
    Get { key: u64 },
    Insert { key: u64 },
    Scan { low_v: u64, cnt: u8 },
    Delete { key: u64 },
}

fn test_runner(ops: &[TreeOp]) {
    let mut art = U64Art::new();
    let mut bt_map: BTreeMap<u64, u64> = BTreeMap::new();

    for op in ops {
        match op {
            TreeOp::Get { key } => {
                let art_v = art.get(&key.to_be_bytes());
                let bt_v = bt_map.get(key).cloned();
                assert_eq!(art_v, bt_v);
            }
            TreeOp::Insert { key } => {
                let art_changed = art.insert(&key.to_be_bytes(), *key).expect("no duplicates");
                let bt_changed = bt_map.insert(*key, *key).is_none();
                assert_eq!(art_changed, bt_changed);
            }
            TreeOp::Delete { key } => {
                art.erase(&key.to_be_bytes());
                bt_map.remove(key);
                assert!(art.get(&key.to_be_bytes()).is_none());
            }
            TreeOp::Scan { low_v, cnt } => {
                let cnt = *cnt as usize;
                let art_sum = art.scan(&low_v.to_be_bytes(), cnt);
                let bt_sum: u64 = bt_map.range(low_v..).take(cnt).map(|(_, v)| *v).sum();
                assert_eq!(art_sum, bt_sum);
            }
        }
    }
}

fn gen_ops(seed: u64, op_cnt: usize, key_space: u64) -> Vec<TreeOp> {
    let mut r = StdRng::seed_from_u64(seed);
    let mut ops = Vec::with_capacity(op_cnt);
    for _ in 0..op_cnt {
        let op = match r.gen_range(0..4) {
            0 => TreeOp::Get {
                key: r.gen_range(0..key_space),
            },
            1 => TreeOp::Insert {
                key: r.gen_range(0..key_space),
            },
            2 => TreeOp::Scan {
                low_v: r.gen_range(0..key_space),
                cnt: r.gen(),
            },
            _ => TreeOp::Delete {
                key: r.gen_range(0..key_space),
            },
        };
        ops.push(op);
    }
    ops
}

#[test]
fn mixed_ops_small_key_space() {
    let ops = gen_ops(42, 50_000, 4096);
    test_runner(&ops);
}

#[test]
fn mixed_ops_large_key_space() {
    let ops = gen_ops(7, 50_000, u64::MAX >> 1);
    test_runner(&ops);
}

#[test]
fn mixed_ops_then_merge() {
    let mut art = U64Art::new();
    let mut bt_map: BTreeMap<u64, u64> = BTreeMap::new();

    let mut r = StdRng::seed_from_u64(99);
    let mut keys: Vec<u64> = (0..100_000u64).map(|_| r.gen::<u64>() >> 1).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.shuffle(&mut r);

    for k in &keys {
        art.insert(&k.to_be_bytes(), *k).unwrap();
        bt_map.insert(*k, *k);
    }

    art.merge().unwrap();

    for k in &keys {
        assert_eq!(art.get(&k.to_be_bytes()), Some(*k));
    }
    for _ in 0..50_000 {
        let probe: u64 = r.gen::<u64>() >> 1;
        assert_eq!(art.get(&probe.to_be_bytes()), bt_map.get(&probe).cloned());
    }

    // The static cursor serves scans once the dynamic tree is gone.
    for _ in 0..100 {
        let low: u64 = r.gen::<u64>() >> 1;
        let cnt = r.gen_range(1..64usize);
        let art_sum = art.scan(&low.to_be_bytes(), cnt);
        let bt_sum: u64 = bt_map.range(low..).take(cnt).map(|(_, v)| *v).sum();
        assert_eq!(art_sum, bt_sum);
    }

    // A second generation of inserts joins merged state in scans.
    for _ in 0..10_000 {
        let k: u64 = r.gen::<u64>() >> 1;
        let _ = art.insert(&k.to_be_bytes(), k);
        bt_map.insert(k, k);
    }
    for _ in 0..100 {
        let low: u64 = r.gen::<u64>() >> 1;
        let cnt = r.gen_range(1..64usize);
        let art_sum = art.scan(&low.to_be_bytes(), cnt);
        let bt_sum: u64 = bt_map.range(low..).take(cnt).map(|(_, v)| *v).sum();
        assert_eq!(art_sum, bt_sum);
    }
}
