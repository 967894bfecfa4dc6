use crate::iter::*;
use crate::raw::{PutResult, Table};
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::Ordering;

/// The number of bins a map starts out with, and the floor that shrinking
/// never goes below. Rebuild capacities are computed from entry counts, so
/// this does not need to be a power of two.
pub(crate) const INITIAL_CAPACITY: usize = 16;

/// The number of physical entries a table must hold before any rebuild is
/// considered. Below this, chains are short no matter how skewed the load
/// factor or the tombstone ratio looks.
const MIN_SIZE: usize = 64;

/// Load factor (entries per bin) below which the table is considered too
/// sparse and is shrunk.
const LOWER_LOAD: usize = 2;

/// Load factor a freshly rebuilt table is sized for.
const TARGET_LOAD: usize = 4;

/// Load factor above which chains are considered too long and the table is
/// grown. Load is measured over physical entries, tombstones included, so
/// this bounds worst-case chain length as seen by readers.
const UPPER_LOAD: usize = 6;

/// A resizable concurrent hash map with lock-free readers and a single
/// serialized writer.
///
/// The map is two layers. Underneath is a fixed-capacity table of bucket
/// chains whose heads, next pointers, and value slots are all atomics; it
/// supports any number of readers in parallel with one writer. On top, the
/// map keeps the current table behind an atomically swappable pointer and
/// funnels all writers through one mutex. When a write leaves the table too
/// dense, too sparse, or too full of logically-deleted entries, the writer
/// builds a replacement table of the right size and swaps it in whole, and
/// readers either see the old table or the new one, never anything in
/// between.
///
/// Deletion is logical: removing a key tombstones its entry in place, and
/// the entry is only physically dropped when a rebuild copies the live
/// entries into a fresh table. This is what lets readers walk chains without
/// any locking: entries never disappear out from under them.
///
/// `molt` uses [`Guard`]s to control the lifetime of the resources that get
/// stored in and extracted from the map. [`Guard`]s are acquired through
/// [`epoch::pin`], [`HashMap::pin`], and [`HashMap::guard`]. References
/// returned by [`get`](HashMap::get) and friends are valid for as long as
/// the guard they were created with is held, even if the mapping is
/// concurrently removed or the whole table is swapped out by a resize.
///
/// Readers never block: [`get`](HashMap::get) and the iterators take no
/// locks and contain no waits. [`insert`](HashMap::insert) and
/// [`remove`](HashMap::remove) serialize on the writer mutex.
/// [`try_insert`](HashMap::try_insert) reports an existing mapping without
/// locking at all.
///
/// # Iteration
///
/// Iterators walk the table they captured at creation. They are weakly
/// consistent: concurrent inserts and removes may or may not be observed,
/// no entry is yielded twice, and a mapping that is live for the entire
/// iteration is not missed. A resize during iteration is invisible; the
/// iterator keeps walking its captured table, which the guard keeps alive.
/// Iteration order is unspecified.
///
/// # Resizing behavior
///
/// With `E` physical entries (live + tombstoned), `D` tombstones, and `B`
/// bins, a rebuild is triggered after a write once `E >= 64` and either
/// `E > 6·B` (chains too long), `E < 2·B` (table too sparse), or `E < 2·D`
/// (mostly tombstones). The replacement table gets `max((E − D) / 4, 16)`
/// bins. Rebuilds copy only live entries, so they are also how tombstones
/// get compacted away.
pub struct HashMap<K, V, S = crate::DefaultHashBuilder> {
    /// The current table. Loaded lock-free by readers; replaced only under
    /// `write`, and only ever with a fully-populated table.
    table: Atomic<Table<K, V>>,

    /// Serializes `insert`, `remove`, the slow path of `try_insert`, and
    /// every access to the table statistics.
    write: Mutex<()>,

    /// Collector that all `Guard` references used for operations on this map
    /// must be associated with. It is important that they all associate with
    /// the _same_ collector: a guard from a foreign collector would not hold
    /// back this map's deferred destructions, and a reader could be left
    /// holding a reference to a value that has already been freed. Every
    /// public operation that takes a guard asserts the association.
    ///
    /// The collector can be the global one, which is also why `K` and `V`
    /// must be `'static` for mutating operations: destruction of what they
    /// put in the map may be deferred arbitrarily far.
    collector: epoch::Collector,

    /// Hashes keys for the current table and for every future rebuild.
    build_hasher: S,
}

/// A writer's view of the current table, taken under the writer mutex.
///
/// All counts describe physical state: `entries` includes tombstoned
/// entries, and `entries - tombstones` is the number of live mappings.
/// `largest_bin` is the longest chain the current table has ever had.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Number of bins in the current table.
    pub bins: usize,
    /// Entries physically present, live and tombstoned alike.
    pub entries: usize,
    /// Entries that are currently tombstoned.
    pub tombstones: usize,
    /// Length of the longest chain observed in the current table.
    pub largest_bin: usize,
}

/// The error type for the [`HashMap::try_insert`] method.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TryInsertError<'a, V> {
    /// A reference to the value currently mapped to the key.
    pub current: &'a V,
    /// The value that [`HashMap::try_insert`] did not insert.
    pub not_inserted: V,
}

impl<'a, V> Display for TryInsertError<'a, V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insert of \"{:?}\" failed as key was already present with value \"{:?}\"",
            self.not_inserted, self.current
        )
    }
}

impl<'a, V> Error for TryInsertError<'a, V>
where
    V: Debug,
{
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl<K, V> HashMap<K, V, crate::DefaultHashBuilder> {
    /// Creates an empty `HashMap` with 16 bins.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `HashMap` sized to hold at least `capacity` elements
    /// at the target load factor without rebuilding.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::with_capacity(100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, crate::DefaultHashBuilder::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty map which will use `hash_builder` to hash keys.
    ///
    /// The created map has 16 bins. The hasher's output is truncated to 32
    /// bits before bin selection; it must be deterministic and consistent
    /// with `Eq`, but needs no cryptographic properties.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is
    /// designed to allow the map to be resistant to attacks that cause many
    /// collisions and very poor performance. Setting it manually using this
    /// function can expose a DoS attack vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::{DefaultHashBuilder, HashMap};
    ///
    /// let map = HashMap::with_hasher(DefaultHashBuilder::default());
    /// map.pin().insert(1, 2);
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: Atomic::new(Table::new(INITIAL_CAPACITY)),
            write: Mutex::new(()),
            collector: epoch::default_collector().clone(),
            build_hasher: hash_builder,
        }
    }

    /// Creates an empty map with the specified `capacity`, using
    /// `hash_builder` to hash the keys.
    ///
    /// The map gets enough bins to hold `capacity` elements at the target
    /// load factor, but never fewer than the initial 16.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let map = HashMap::with_capacity_and_hasher(10, RandomState::new());
    /// map.pin().insert(1, 2);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: Atomic::new(Table::new(usize::max(
                capacity / TARGET_LOAD,
                INITIAL_CAPACITY,
            ))),
            write: Mutex::new(()),
            collector: epoch::default_collector().clone(),
            build_hasher: hash_builder,
        }
    }

    /// Pin a [`Guard`] for use with this map.
    ///
    /// Keep in mind that for as long as you hold onto this guard, you are
    /// preventing the collection of garbage generated by the map: replaced
    /// values, tombstoned values, and tables superseded by a resize.
    pub fn guard(&self) -> epoch::Guard {
        self.collector.register().pin()
    }

    #[inline]
    fn check_guard(&self, guard: &Guard) {
        // guard.collector() may be `None` if the guard is unprotected
        if let Some(c) = guard.collector() {
            assert_eq!(c, &self.collector);
        }
    }

    /// Loads the current table.
    #[inline]
    fn current<'g>(&'g self, guard: &'g Guard) -> &'g Table<K, V> {
        let table = self.table.load(Ordering::Acquire, guard);
        // safety: the initial table is installed at construction and
        // replacements are published whole, so the pointer is never null;
        // superseded tables are destroyed behind the epoch, so anything
        // loaded under `guard` outlives it.
        unsafe { table.deref() }
    }

    /// A writer's view of the current table's statistics.
    ///
    /// This acquires the writer mutex, so the returned snapshot is exact:
    /// no write can be in flight while it is taken. The statistics describe
    /// physical state; see [`Stats`].
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.pin().insert(1, "a");
    /// map.pin().remove(&1);
    ///
    /// let stats = map.stats();
    /// assert_eq!(stats.bins, 16);
    /// assert_eq!(stats.entries, 1);
    /// assert_eq!(stats.tombstones, 1);
    /// ```
    pub fn stats(&self) -> Stats {
        let _write = self.write.lock();
        let guard = self.collector.register().pin();
        let table = self.current(&guard);
        Stats {
            bins: table.len(),
            entries: table.entries(),
            tombstones: table.tombstones(),
            largest_bin: table.largest_bin(),
        }
    }
}

// ===
// the following methods never introduce new keys or values, only hand out
// ones that were previously inserted (which implies those are thread-safe
// already), so they do not themselves need thread-safety bounds.
// ===

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn hash<Q: ?Sized + Hash>(&self, key: &Q) -> u32 {
        let mut h = self.build_hasher.build_hasher();
        key.hash(&mut h);
        // bin selection works on 32 bits; see `Table::bini`
        h.finish() as u32
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the key type.
    ///
    /// To obtain a `Guard`, use [`HashMap::guard`].
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// let guard = map.guard();
    /// map.insert(1, "a", &guard);
    /// assert_eq!(map.get(&1, &guard), Some(&"a"));
    /// assert_eq!(map.get(&2, &guard), None);
    /// ```
    #[inline]
    pub fn get<'g, Q>(&'g self, key: &Q, guard: &'g Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.check_guard(guard);
        let h = self.hash(key);
        self.current(guard).get(h, key, guard)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// let mref = map.pin();
    /// mref.insert(1, "a");
    /// assert_eq!(mref.contains_key(&1), true);
    /// assert_eq!(mref.contains_key(&2), false);
    /// ```
    pub fn contains_key<Q>(&self, key: &Q, guard: &Guard) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key, guard).is_some()
    }

    /// Returns the key-value pair corresponding to `key`.
    ///
    /// Returns `None` if this map contains no mapping for `key`.
    ///
    /// The key may be any borrowed form of the map's key type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the key type.
    #[inline]
    pub fn get_key_value<'g, Q>(&'g self, key: &Q, guard: &'g Guard) -> Option<(&'g K, &'g V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.check_guard(guard);
        let h = self.hash(key);
        let node = self.current(guard).find(h, key, guard)?;
        let v = node.value.load(Ordering::Acquire, guard);
        if v.is_null() {
            // tombstone
            return None;
        }
        // safety: the value was live under our guard, so its destruction is
        // deferred until at least after the guard drops.
        Some((&node.key, unsafe { v.deref() }))
    }

    pub(crate) fn guarded_eq(&self, other: &Self, our_guard: &Guard, their_guard: &Guard) -> bool
    where
        V: PartialEq,
    {
        let mut len = 0;
        for (key, value) in self.iter(our_guard) {
            len += 1;
            if other.get(key, their_guard) != Some(value) {
                return false;
            }
        }
        len == other.iter(their_guard).count()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// An iterator visiting all key-value pairs in arbitrary order.
    ///
    /// The iterator element type is `(&'g K, &'g V)`.
    ///
    /// The iterator walks the table as it was when this method was called;
    /// see the [notes on iteration](HashMap#iteration).
    pub fn iter<'g>(&'g self, guard: &'g Guard) -> Iter<'g, K, V> {
        self.check_guard(guard);
        let table = self.table.load(Ordering::Acquire, guard);
        Iter {
            node_iter: NodeIter::new(table, guard),
            guard,
        }
    }

    /// An iterator visiting all keys in arbitrary order.
    ///
    /// The iterator element type is `&'g K`.
    pub fn keys<'g>(&'g self, guard: &'g Guard) -> Keys<'g, K, V> {
        self.check_guard(guard);
        let table = self.table.load(Ordering::Acquire, guard);
        Keys {
            node_iter: NodeIter::new(table, guard),
            guard,
        }
    }

    /// An iterator visiting all values in arbitrary order.
    ///
    /// The iterator element type is `&'g V`.
    pub fn values<'g>(&'g self, guard: &'g Guard) -> Values<'g, K, V> {
        self.check_guard(guard);
        let table = self.table.load(Ordering::Acquire, guard);
        Values {
            node_iter: NodeIter::new(table, guard),
            guard,
        }
    }
}

// ===
// the following methods can insert keys and values, or move them between
// tables during a rebuild, and so require the full set of bounds: thread
// safety, `'static` (destruction may be deferred arbitrarily), and `Clone`
// on keys (a rebuild re-keys live entries into the replacement table).
// ===

impl<K, V, S> HashMap<K, V, S>
where
    K: 'static + Sync + Send + Clone + Hash + Eq,
    V: 'static + Sync + Send,
    S: BuildHasher,
{
    /// Maps `key` to `value`, returning the live value the key was
    /// previously mapped to, if any.
    ///
    /// If the key was logically deleted, the entry is resurrected in place
    /// and `None` is returned, since no live mapping was replaced.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// let guard = map.guard();
    /// assert_eq!(map.insert(37, "a", &guard), None);
    /// assert_eq!(map.insert(37, "b", &guard), Some(&"a"));
    /// assert_eq!(map.get(&37, &guard), Some(&"b"));
    /// ```
    pub fn insert<'g>(&'g self, key: K, value: V, guard: &'g Guard) -> Option<&'g V> {
        self.check_guard(guard);
        let h = self.hash(&key);

        let _write = self.write.lock();
        let table = self.table.load(Ordering::Acquire, guard);
        // safety: as in `current`
        let old = match unsafe { table.deref() }.put(h, key, value, false, guard) {
            PutResult::Inserted { .. } => None,
            PutResult::Replaced { old, .. } => Some(old),
            PutResult::Exists { .. } => unreachable!("put without no_replacement cannot refuse"),
        };
        self.resize_if_needed(table, guard);
        old
    }

    /// Inserts `(key, value)` only if the key has no live mapping, and hands
    /// back whichever value ends up mapped: the freshly inserted one on
    /// `Ok`, the pre-existing one inside the error on `Err`.
    ///
    /// Racing callers agree on the winner: exactly one receives `Ok`, and
    /// every loser's error carries the winning value. If a live mapping
    /// already exists, this takes no lock at all.
    ///
    /// Unlike [`insert`](HashMap::insert) and [`remove`](HashMap::remove),
    /// this never triggers a rebuild; table growth is amortized over the
    /// plain write operations only.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// let guard = map.guard();
    /// assert_eq!(map.try_insert(37, "a", &guard), Ok(&"a"));
    ///
    /// let err = map.try_insert(37, "b", &guard).unwrap_err();
    /// assert_eq!(err.current, &"a");
    /// assert_eq!(err.not_inserted, "b");
    /// ```
    pub fn try_insert<'g>(
        &'g self,
        key: K,
        value: V,
        guard: &'g Guard,
    ) -> Result<&'g V, TryInsertError<'g, V>> {
        self.check_guard(guard);
        let h = self.hash(&key);

        // fast path: a live mapping can be reported without the lock
        if let Some(current) = self.current(guard).get(h, &key, guard) {
            return Err(TryInsertError {
                current,
                not_inserted: value,
            });
        }

        let _write = self.write.lock();
        // the table may have been swapped and the key inserted since the
        // unlocked check, so decide again against the current table
        match self.current(guard).put(h, key, value, true, guard) {
            PutResult::Inserted { new } => Ok(new),
            PutResult::Exists {
                current,
                not_inserted,
            } => Err(TryInsertError {
                current,
                not_inserted: *not_inserted,
            }),
            PutResult::Replaced { .. } => {
                unreachable!("put with no_replacement cannot replace")
            }
        }
    }

    /// Removes the mapping for `key`, returning the value it held.
    ///
    /// The entry is tombstoned, not unlinked; removing an absent or
    /// already-removed key is a no-op returning `None`. Tombstones are
    /// compacted away by the next rebuild.
    ///
    /// The key may be any borrowed form of the map's key type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashMap;
    ///
    /// let map = HashMap::new();
    /// let guard = map.guard();
    /// map.insert(1, "a", &guard);
    /// assert_eq!(map.remove(&1, &guard), Some(&"a"));
    /// assert_eq!(map.remove(&1, &guard), None);
    /// assert_eq!(map.get(&1, &guard), None);
    /// ```
    pub fn remove<'g, Q>(&'g self, key: &Q, guard: &'g Guard) -> Option<&'g V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.check_guard(guard);
        let h = self.hash(key);

        let _write = self.write.lock();
        let table = self.table.load(Ordering::Acquire, guard);
        // safety: as in `current`
        let old = unsafe { table.deref() }.delete(h, key, guard);
        self.resize_if_needed(table, guard);
        old
    }

    /// Rebuilds the table if the thresholds say so. Must be called with the
    /// writer mutex held.
    fn resize_if_needed<'g>(&'g self, table: Shared<'g, Table<K, V>>, guard: &'g Guard) {
        // safety: as in `current`
        let t = unsafe { table.deref() };

        let entries = t.entries();
        if entries < MIN_SIZE {
            return;
        }
        let bins = t.len();
        let tombstones = t.tombstones();
        let live = entries - tombstones;

        let overfull = entries > UPPER_LOAD * bins;
        let sparse = entries < LOWER_LOAD * bins;
        let tombstone_heavy = entries < 2 * tombstones;
        if !overfull && !sparse && !tombstone_heavy {
            return;
        }

        // build the replacement in full before anything is published
        let new_table = Table::new(usize::max(live / TARGET_LOAD, INITIAL_CAPACITY));
        for node in NodeIter::new(table, guard) {
            let value = node.value.load(Ordering::Acquire, guard);
            if value.is_null() {
                // tombstone: compacted away by not carrying it over
                continue;
            }
            // the value allocation moves to the new table; only the key is
            // cloned
            new_table.transfer(self.hash(&node.key), node.key.clone(), value, guard);
        }

        self.table.store(Owned::new(new_table), Ordering::Release);
        // safety: the old table is no longer reachable through the map, and
        // readers or iterators still walking it hold guards that keep the
        // deferred destruction pending. Dropping a table frees its chain
        // links only, never the (transferred) values.
        unsafe { guard.defer_destroy(table) };
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        // safety: we have &mut self, and every reference handed out of the
        // map is tied to a borrow of it, so none are outstanding.
        let guard = unsafe { epoch::unprotected() };
        let table = self.table.swap(Shared::null(), Ordering::Relaxed, guard);
        // safety: the table pointer is never null, and at this point we are
        // its sole owner.
        let table = unsafe { table.into_owned() };
        // the final table still owns its live values; destroy them before
        // the table frees the chains
        table.drop_values();
    }
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        f.debug_map().entries(self.iter(&guard)).finish()
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.guarded_eq(other, &self.guard(), &other.guard())
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: 'static + Sync + Send + Clone + Hash + Eq,
    V: 'static + Sync + Send,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let map = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        {
            let guard = map.guard();
            for (key, value) in iter {
                map.insert(key, value, &guard);
            }
        }
        map
    }
}

impl<K, V, S> Extend<(K, V)> for &HashMap<K, V, S>
where
    K: 'static + Sync + Send + Clone + Hash + Eq,
    V: 'static + Sync + Send,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let guard = self.guard();
        for (key, value) in iter {
            self.insert(key, value, &guard);
        }
    }
}
