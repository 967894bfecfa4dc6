use crossbeam_epoch::Atomic;

/// A link in a bin's chain.
///
/// Every bin holds a chain of `BinEntry`s: zero or more `Node`s followed by
/// the bin's `Terminal`. The `Terminal` is allocated when the table is
/// created and stays at the end of the chain for the lifetime of the table,
/// so a reader walking the chain never races a null check; it simply walks
/// until it observes the terminator.
#[derive(Debug)]
pub(crate) enum BinEntry<K, V> {
    Node(Node<K, V>),
    Terminal,
}

/// Key-value entry.
///
/// The key is set once at construction and never changes. The value slot is
/// an atomic pointer: non-null is a live value, null is a tombstone (the
/// entry is logically deleted). Entries are never unlinked from their chain;
/// a tombstoned entry is resurrected in place if its key is inserted again,
/// and only goes away when the table it lives in is rebuilt.
#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: Atomic<V>,
    pub(crate) next: Atomic<BinEntry<K, V>>,
}
