//! Randomized equivalence testing against the standard library's map.
//!
//! Any finite sequence of inserts, removes, lookups, and iterations over a
//! small key domain must behave exactly like `std::collections::HashMap`.

use molt::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap as Reference;

const KEY_DOMAIN: u64 = 64;
const VALUE_DOMAIN: u64 = 1024;

fn run(seed: u64, ops: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let map = HashMap::<u64, u64>::new();
    let mut reference = Reference::new();

    for i in 0..ops {
        let key = rng.gen_range(0..KEY_DOMAIN);
        match rng.gen_range(0..10) {
            // bias toward writes so the map keeps churning
            0..=3 => {
                let value = rng.gen_range(0..VALUE_DOMAIN);
                let guard = map.guard();
                let old = map.insert(key, value, &guard).copied();
                assert_eq!(old, reference.insert(key, value), "op {}: insert({})", i, key);
            }
            4..=6 => {
                let guard = map.guard();
                let old = map.remove(&key, &guard).copied();
                assert_eq!(old, reference.remove(&key), "op {}: remove({})", i, key);
            }
            7..=8 => {
                let guard = map.guard();
                assert_eq!(
                    map.get(&key, &guard).copied(),
                    reference.get(&key).copied(),
                    "op {}: get({})",
                    i,
                    key
                );
            }
            _ => {
                let guard = map.guard();
                let mut snapshot: Vec<(u64, u64)> =
                    map.iter(&guard).map(|(&k, &v)| (k, v)).collect();
                snapshot.sort_unstable();
                let mut expected: Vec<(u64, u64)> =
                    reference.iter().map(|(&k, &v)| (k, v)).collect();
                expected.sort_unstable();
                assert_eq!(snapshot, expected, "op {}: iterate", i);
            }
        }
    }

    // final snapshot must agree exactly
    let guard = map.guard();
    let mut snapshot: Vec<(u64, u64)> = map.iter(&guard).map(|(&k, &v)| (k, v)).collect();
    snapshot.sort_unstable();
    let mut expected: Vec<(u64, u64)> = reference.into_iter().collect();
    expected.sort_unstable();
    assert_eq!(snapshot, expected);
}

#[test]
fn model_equivalence() {
    let ops = if cfg!(miri) { 200 } else { 20_000 };
    for seed in 0..4 {
        run(0xC0FFEE + seed, ops);
    }
}

#[test]
fn model_equivalence_with_try_insert() {
    let ops = if cfg!(miri) { 200 } else { 10_000 };
    let mut rng = StdRng::seed_from_u64(0xBADCAB);
    let map = HashMap::<u64, u64>::new();
    let mut reference = Reference::new();

    for i in 0..ops {
        let key = rng.gen_range(0..KEY_DOMAIN);
        match rng.gen_range(0..4) {
            0 => {
                let value = rng.gen_range(0..VALUE_DOMAIN);
                let guard = map.guard();
                let result = map.try_insert(key, value, &guard);
                match reference.entry(key) {
                    std::collections::hash_map::Entry::Occupied(e) => {
                        let err = result.expect_err("model has the key");
                        assert_eq!(err.not_inserted, value, "op {}", i);
                        assert_eq!(err.current, e.get(), "op {}", i);
                    }
                    std::collections::hash_map::Entry::Vacant(e) => {
                        assert_eq!(result.expect("model lacks the key"), &value, "op {}", i);
                        e.insert(value);
                    }
                }
            }
            1 => {
                let guard = map.guard();
                let old = map.remove(&key, &guard).copied();
                assert_eq!(old, reference.remove(&key), "op {}", i);
            }
            _ => {
                let guard = map.guard();
                assert_eq!(
                    map.get(&key, &guard).copied(),
                    reference.get(&key).copied(),
                    "op {}",
                    i
                );
            }
        }
    }
}
