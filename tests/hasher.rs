use molt::{DefaultHashBuilder, HashMap};
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

#[derive(Default)]
pub struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }
    fn write(&mut self, _: &[u8]) {}
}

fn check<S: BuildHasher + Default>() {
    let range = if cfg!(miri) { 0..16 } else { 0..500 };
    let map = HashMap::<i32, i32, S>::default();
    let guard = map.guard();
    for i in range.clone() {
        map.insert(i, i, &guard);
    }

    assert!(!map.contains_key(&i32::MIN, &guard));
    assert!(!map.contains_key(&(range.start - 1), &guard));
    for i in range.clone() {
        assert!(map.contains_key(&i, &guard));
    }
    assert!(!map.contains_key(&range.end, &guard));
    assert!(!map.contains_key(&i32::MAX, &guard));

    // removal and resurrection still work when every key collides
    for i in range.clone().step_by(2) {
        map.remove(&i, &guard);
    }
    for i in range.clone() {
        assert_eq!(map.contains_key(&i, &guard), i % 2 == 1);
    }
    for i in range.clone().step_by(2) {
        map.insert(i, -i, &guard);
    }
    for i in range {
        let expected = if i % 2 == 0 { -i } else { i };
        assert_eq!(map.get(&i, &guard), Some(&expected));
    }
}

#[test]
fn test_default_hasher() {
    check::<DefaultHashBuilder>();
}

#[test]
fn test_std_hasher() {
    check::<std::collections::hash_map::RandomState>();
}

#[test]
fn test_zero_hasher() {
    // every key lands in one bin; the map degenerates to a linked list but
    // must stay correct
    check::<BuildHasherDefault<ZeroHasher>>();
}

#[test]
fn test_max_hasher() {
    #[derive(Default)]
    struct MaxHasher;

    impl Hasher for MaxHasher {
        fn finish(&self) -> u64 {
            u64::MAX
        }
        fn write(&mut self, _: &[u8]) {}
    }

    check::<BuildHasherDefault<MaxHasher>>();
}

#[test]
fn degenerate_hasher_chain_stats() {
    let map = HashMap::<i32, i32, BuildHasherDefault<ZeroHasher>>::default();
    let guard = map.guard();
    for i in 0..32 {
        map.insert(i, i, &guard);
    }
    let stats = map.stats();
    // one chain holds everything
    assert_eq!(stats.entries, 32);
    assert_eq!(stats.largest_bin, 32);
}
