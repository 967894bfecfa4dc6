use molt::HashSet;

#[test]
fn new() {
    let _set = HashSet::<usize>::new();
}

#[test]
fn insert_and_contains() {
    let set = HashSet::new();
    let guard = set.guard();

    assert!(!set.contains(&42, &guard));
    assert!(set.insert(42, &guard));
    assert!(set.contains(&42, &guard));
    // a second insert of the same value reports it was already there
    assert!(!set.insert(42, &guard));
}

#[test]
fn remove() {
    let set = HashSet::new();
    let guard = set.guard();

    set.insert(42, &guard);
    assert!(set.remove(&42, &guard));
    assert!(!set.contains(&42, &guard));
    assert!(!set.remove(&42, &guard));
}

#[test]
fn get() {
    let set = HashSet::new();
    let guard = set.guard();

    set.insert("hello".to_owned(), &guard);
    assert_eq!(set.get("hello", &guard), Some(&"hello".to_owned()));
    assert_eq!(set.get("world", &guard), None);
}

#[test]
fn iter() {
    let set = HashSet::new();
    let guard = set.guard();
    for i in 0..8 {
        set.insert(i, &guard);
    }
    set.remove(&0, &guard);

    let mut members: Vec<_> = set.iter(&guard).copied().collect();
    members.sort_unstable();
    assert_eq!(members, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn pinned_view() {
    let set = HashSet::new();
    let pinned = set.pin();

    assert!(pinned.insert(1));
    assert!(pinned.insert(2));
    assert!(pinned.contains(&1));
    assert!(pinned.remove(&1));
    assert!(!pinned.contains(&1));
    assert_eq!(pinned.iter().count(), 1);
}

#[test]
fn from_iter_and_eq() {
    let a: HashSet<usize> = (0..10).collect();
    let b: HashSet<usize> = (0..10).rev().collect();
    assert_eq!(a, b);

    b.remove(&0, &b.guard());
    assert_ne!(a, b);
}

#[test]
fn concurrent_membership() {
    use std::sync::Arc;

    let set = Arc::new(HashSet::new());
    {
        let guard = set.guard();
        for i in 0..64 {
            set.insert(i, &guard);
        }
    }

    let mut threads = Vec::new();
    for _ in 0..4 {
        let set = Arc::clone(&set);
        threads.push(std::thread::spawn(move || {
            let guard = set.guard();
            for i in 0..64 {
                assert!(set.contains(&i, &guard));
            }
        }));
    }
    for t in threads {
        t.join().expect("failed to join thread");
    }
}
