use crate::node::*;
use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use std::borrow::Borrow;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A bucket: the head of a chain of entries, plus the number of entries that
/// have been prepended to it. The head is never null: a freshly created bin
/// points at its `Terminal`.
#[derive(Debug)]
pub(crate) struct Bin<K, V> {
    head: Atomic<BinEntry<K, V>>,

    /// Number of entries in this bin's chain (live and tombstoned).
    /// Guarded by the writer lock of the map that owns this table.
    len: AtomicUsize,
}

/// A fixed-capacity hash table with atomic bucket chains.
///
/// One writer and any number of readers may operate on a `Table`
/// concurrently; writers must be externally serialized. The bin count is
/// fixed at construction; a `Table` never grows. Resizing is the owning
/// map's job: it builds a replacement table and swaps it in whole.
///
/// The statistics fields (`entries`, `tombstones`, `largest_bin`, and each
/// bin's `len`) are owned by the writer: they are stored in atomics only so
/// that sharing the table is sound, are accessed with relaxed ordering, and
/// are meaningful solely while the writer lock is held. No lock-free code
/// path reads them.
#[derive(Debug)]
pub(crate) struct Table<K, V> {
    bins: Box<[Bin<K, V>]>,

    /// Entries physically present in the table, live and tombstoned alike.
    entries: AtomicUsize,

    /// Entries whose value slot currently holds a tombstone.
    tombstones: AtomicUsize,

    /// Length of the longest chain ever observed in this table.
    largest_bin: AtomicUsize,
}

/// The outcome of a [`Table::put`].
#[derive(Debug)]
pub(crate) enum PutResult<'g, T> {
    Inserted {
        new: &'g T,
    },
    Replaced {
        old: &'g T,
        new: &'g T,
    },
    Exists {
        current: &'g T,
        not_inserted: Box<T>,
    },
}

impl<K, V> Table<K, V> {
    /// Creates a table with `bins` buckets, each terminated by a fresh
    /// `Terminal` entry.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    pub(crate) fn new(bins: usize) -> Self {
        assert_ne!(bins, 0, "a table must have at least one bin");
        let bins = (0..bins)
            .map(|_| Bin {
                head: Atomic::new(BinEntry::Terminal),
                len: AtomicUsize::new(0),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            bins,
            entries: AtomicUsize::new(0),
            tombstones: AtomicUsize::new(0),
            largest_bin: AtomicUsize::new(0),
        }
    }

    /// The number of bins in this table.
    pub(crate) fn len(&self) -> usize {
        self.bins.len()
    }

    /// Entries physically present (live + tombstoned). Writer-only.
    pub(crate) fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Tombstoned entries. Writer-only.
    pub(crate) fn tombstones(&self) -> usize {
        self.tombstones.load(Ordering::Relaxed)
    }

    /// Longest chain observed so far. Writer-only.
    pub(crate) fn largest_bin(&self) -> usize {
        self.largest_bin.load(Ordering::Relaxed)
    }

    /// Maps a hash to a bin index.
    ///
    /// The hash is 32 bits and the reduction is by modulo, so bin counts
    /// beyond 2^32 would go unused. Bin counts are derived from entry counts
    /// divided by a load factor, which keeps them far below that in practice.
    pub(crate) fn bini(&self, hash: u32) -> usize {
        hash as usize % self.bins.len()
    }

    /// Loads the head of bin `i`.
    pub(crate) fn bin<'g>(&'g self, i: usize, guard: &'g Guard) -> Shared<'g, BinEntry<K, V>> {
        self.bins[i].head.load(Ordering::Acquire, guard)
    }

    /// Walks the chain of `key`'s bin and returns its entry, live or
    /// tombstoned, if one exists.
    ///
    /// Safe to call without the writer lock: the chain is only ever extended
    /// at the head by release stores, and entries are never unlinked, so an
    /// acquire walk observes fully-initialized nodes all the way down to the
    /// terminator.
    pub(crate) fn find<'g, Q>(
        &'g self,
        hash: u32,
        key: &Q,
        guard: &'g Guard,
    ) -> Option<&'g Node<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut e = self.bin(self.bini(hash), guard);
        loop {
            // safety: chain pointers are never null (every chain ends at the
            // bin's Terminal), and anything reachable from a bin head read
            // under `guard` stays allocated at least until the guard drops:
            // nodes and terminals are only freed together with their table,
            // which is deferred behind the epoch.
            match unsafe { e.deref() } {
                BinEntry::Terminal => return None,
                BinEntry::Node(node) => {
                    if node.key.borrow() == key {
                        return Some(node);
                    }
                    e = node.next.load(Ordering::Acquire, guard);
                }
            }
        }
    }

    /// Reads the live value for `key`, if there is one.
    pub(crate) fn get<'g, Q>(&'g self, hash: u32, key: &Q, guard: &'g Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let node = self.find(hash, key, guard)?;
        let v = node.value.load(Ordering::Acquire, guard);
        if v.is_null() {
            // tombstone
            return None;
        }
        // safety: the value was reachable under `guard`, and values are only
        // destroyed via defer_destroy after being unreachable from any
        // current table, so it lives at least until the guard drops.
        Some(unsafe { v.deref() })
    }

    /// Maps `key` to `value`.
    ///
    /// Requires the writer lock of the owning map.
    ///
    /// If an entry for `key` exists, its value slot is overwritten (clearing
    /// any tombstone); with `no_replacement`, a live value is left untouched
    /// and handed back together with the rejected `value`. Otherwise a new
    /// entry is prepended to the bin: its next pointer is aimed at the
    /// current head before the head store publishes it, so a concurrent
    /// reader sees either the old chain or the fully-initialized new entry.
    pub(crate) fn put<'g>(
        &'g self,
        hash: u32,
        key: K,
        value: V,
        no_replacement: bool,
        guard: &'g Guard,
    ) -> PutResult<'g, V>
    where
        K: Eq,
    {
        if let Some(node) = self.find(hash, &key, guard) {
            let current = node.value.load(Ordering::Acquire, guard);
            if no_replacement && !current.is_null() {
                // safety: as in `get`, live values outlive the guard.
                return PutResult::Exists {
                    current: unsafe { current.deref() },
                    not_inserted: Box::new(value),
                };
            }

            let new = Owned::new(value).into_shared(guard);
            let old = node.value.swap(new, Ordering::AcqRel, guard);
            // safety: `new` was just stored and can only be retired by a
            // later write, which is ordered after this one by the writer
            // lock; readers cannot retire values.
            let new = unsafe { new.deref() };
            return if old.is_null() {
                // the entry was tombstoned; it is now resurrected
                self.tombstones.fetch_sub(1, Ordering::Relaxed);
                PutResult::Inserted { new }
            } else {
                // safety: the old value is no longer reachable from the
                // chain; readers that loaded it before the swap hold guards
                // that keep the deferred destruction pending.
                unsafe { guard.defer_destroy(old) };
                PutResult::Replaced {
                    old: unsafe { old.deref() },
                    new,
                }
            };
        }

        let bini = self.bini(hash);
        let bin = &self.bins[bini];

        self.entries.fetch_add(1, Ordering::Relaxed);
        let len = bin.len.fetch_add(1, Ordering::Relaxed) + 1;
        if len > self.largest_bin.load(Ordering::Relaxed) {
            self.largest_bin.store(len, Ordering::Relaxed);
        }

        let value = Owned::new(value).into_shared(guard);
        let head = bin.head.load(Ordering::Acquire, guard);
        bin.head.store(
            Owned::new(BinEntry::Node(Node {
                key,
                value: Atomic::from(value),
                next: Atomic::from(head),
            })),
            Ordering::Release,
        );
        // safety: as above, the freshly stored value outlives the guard.
        PutResult::Inserted {
            new: unsafe { value.deref() },
        }
    }

    /// Tombstones `key`'s entry, returning the value it held.
    ///
    /// Requires the writer lock of the owning map. A missing or
    /// already-tombstoned key is a no-op, so deleting twice is
    /// indistinguishable from deleting once. The entry itself stays in the
    /// chain until the table is rebuilt.
    pub(crate) fn delete<'g, Q>(&'g self, hash: u32, key: &Q, guard: &'g Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let node = self.find(hash, key, guard)?;
        let old = node.value.swap(Shared::null(), Ordering::AcqRel, guard);
        if old.is_null() {
            // already a tombstone
            return None;
        }
        self.tombstones.fetch_add(1, Ordering::Relaxed);
        // safety: the value is unreachable from the chain from here on, and
        // concurrent readers hold guards that delay the destruction.
        unsafe { guard.defer_destroy(old) };
        Some(unsafe { old.deref() })
    }

    /// Prepends an entry carrying an existing value allocation.
    ///
    /// Used only while rebuilding into a fresh, unpublished table, where all
    /// keys are known to be distinct, so no `find` is needed. The value
    /// pointer aliases the old table's allocation; ownership moves with it.
    pub(crate) fn transfer(&self, hash: u32, key: K, value: Shared<'_, V>, guard: &Guard) {
        let bini = self.bini(hash);
        let bin = &self.bins[bini];

        self.entries.fetch_add(1, Ordering::Relaxed);
        let len = bin.len.fetch_add(1, Ordering::Relaxed) + 1;
        if len > self.largest_bin.load(Ordering::Relaxed) {
            self.largest_bin.store(len, Ordering::Relaxed);
        }

        let head = bin.head.load(Ordering::Acquire, guard);
        bin.head.store(
            Owned::new(BinEntry::Node(Node {
                key,
                value: Atomic::from(value),
                next: Atomic::from(head),
            })),
            Ordering::Release,
        );
    }

    /// Destroys every live value still owned by this table.
    ///
    /// Must only be called with exclusive access to the owning map (its
    /// `Drop`), since value allocations may otherwise still be read through
    /// outstanding guards or be shared with a successor table.
    pub(crate) fn drop_values(&self) {
        // safety: exclusive access per the contract above.
        let guard = unsafe { crossbeam_epoch::unprotected() };
        for bin in &*self.bins {
            let mut e = bin.head.load(Ordering::Relaxed, guard);
            loop {
                // safety: chains are intact until `Drop` and end at a
                // Terminal, and we have exclusive access.
                match unsafe { e.deref() } {
                    BinEntry::Terminal => break,
                    BinEntry::Node(node) => {
                        let v = node.value.swap(Shared::null(), Ordering::Relaxed, guard);
                        if !v.is_null() {
                            // safety: the value is owned by this table and
                            // nothing can reach it anymore.
                            drop(unsafe { v.into_owned() });
                        }
                        e = node.next.load(Ordering::Relaxed, guard);
                    }
                }
            }
        }
    }
}

impl<K, V> Drop for Table<K, V> {
    fn drop(&mut self) {
        // Frees the chain links (nodes and terminals) but not the values:
        // after a rebuild the live value allocations are owned by the
        // successor table, and on final teardown the map destroys them via
        // `drop_values` before dropping the table itself.
        //
        // safety: we have &mut self, and a table is only dropped once it is
        // unreachable (either defer-destroyed after being unpublished, or
        // owned by a map that is itself being dropped), so nothing else can
        // touch these chains.
        let guard = unsafe { crossbeam_epoch::unprotected() };
        for bin in &*self.bins {
            let mut e = bin.head.swap(Shared::null(), Ordering::Relaxed, guard);
            while !e.is_null() {
                // safety: we own the chain exclusively.
                let owned = unsafe { e.into_owned() };
                e = match *owned.into_box() {
                    BinEntry::Node(node) => node.next.load(Ordering::Relaxed, guard),
                    BinEntry::Terminal => Shared::null(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch as epoch;

    fn put<'g>(
        table: &'g Table<usize, usize>,
        key: usize,
        value: usize,
        guard: &'g Guard,
    ) -> PutResult<'g, usize> {
        table.put(key as u32, key, value, false, guard)
    }

    #[test]
    fn find_on_empty_table() {
        let guard = &epoch::pin();
        let table = Table::<usize, usize>::new(4);
        assert!(table.find(1, &1, guard).is_none());
    }

    #[test]
    fn put_then_find() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        assert!(matches!(
            put(&table, 1, 42, guard),
            PutResult::Inserted { new: &42 }
        ));
        assert_eq!(table.find(1, &1, guard).map(|n| n.key), Some(1));
        assert_eq!(table.get(1, &1, guard), Some(&42));
        assert_eq!(table.entries(), 1);
        assert_eq!(table.tombstones(), 0);
        table.drop_values();
    }

    #[test]
    fn put_replaces() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        put(&table, 1, 42, guard);
        assert!(matches!(
            put(&table, 1, 43, guard),
            PutResult::Replaced { old: &42, new: &43 }
        ));
        // still one physical entry
        assert_eq!(table.entries(), 1);
        table.drop_values();
    }

    #[test]
    fn no_replacement_keeps_current() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        put(&table, 1, 42, guard);
        match table.put(1, 1, 43, true, guard) {
            PutResult::Exists {
                current,
                not_inserted,
            } => {
                assert_eq!(current, &42);
                assert_eq!(*not_inserted, 43);
            }
            result => panic!("unexpected put result: {:?}", result),
        }
        table.drop_values();
    }

    #[test]
    fn delete_tombstones_in_place() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        put(&table, 1, 42, guard);
        assert_eq!(table.delete(1, &1, guard), Some(&42));
        // the entry is still physically present, but logically gone
        assert!(table.find(1, &1, guard).is_some());
        assert_eq!(table.get(1, &1, guard), None);
        assert_eq!(table.entries(), 1);
        assert_eq!(table.tombstones(), 1);

        // deleting again is a no-op
        assert_eq!(table.delete(1, &1, guard), None);
        assert_eq!(table.tombstones(), 1);
        table.drop_values();
    }

    #[test]
    fn resurrection_clears_tombstone() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        put(&table, 1, 42, guard);
        table.delete(1, &1, guard);
        assert!(matches!(
            put(&table, 1, 43, guard),
            PutResult::Inserted { new: &43 }
        ));
        assert_eq!(table.get(1, &1, guard), Some(&43));
        assert_eq!(table.entries(), 1);
        assert_eq!(table.tombstones(), 0);
        table.drop_values();
    }

    #[test]
    fn colliding_keys_share_a_bin() {
        let guard = &epoch::pin();
        let table = Table::new(4);
        // same hash, different keys: both end up chained in bin 3
        table.put(3, 1, 10, false, guard);
        table.put(3, 2, 20, false, guard);
        table.put(3, 3, 30, false, guard);
        assert_eq!(table.get(3, &1, guard), Some(&10));
        assert_eq!(table.get(3, &2, guard), Some(&20));
        assert_eq!(table.get(3, &3, guard), Some(&30));
        assert_eq!(table.largest_bin(), 3);
        table.drop_values();
    }

    #[test]
    #[should_panic(expected = "at least one bin")]
    fn zero_bins() {
        let _ = Table::<usize, usize>::new(0);
    }
}
