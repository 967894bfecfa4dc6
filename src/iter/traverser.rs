use crate::node::{BinEntry, Node};
use crate::raw::Table;
use crossbeam_epoch::{Guard, Shared};
use std::sync::atomic::Ordering;

/// A raw walker over the entries of a single table.
///
/// The table is captured when the iterator is created and is walked bin by
/// bin until each chain's terminator. A rebuild that happens mid-walk swaps
/// the map over to a new table, but this iterator keeps walking the captured
/// one; the guard it holds keeps the old table (and everything hanging off
/// it) alive. Entries are yielded whether live or tombstoned; filtering is
/// the consumer's job.
#[derive(Debug)]
pub(crate) struct NodeIter<'g, K, V> {
    /// The table captured at iterator creation.
    table: &'g Table<K, V>,

    /// The last node yielded, if any; the walk resumes from its next pointer.
    prev: Option<&'g Node<K, V>>,

    /// Index of the bin to walk once the current chain is exhausted.
    bini: usize,

    guard: &'g Guard,
}

impl<'g, K, V> NodeIter<'g, K, V> {
    pub(crate) fn new(table: Shared<'g, Table<K, V>>, guard: &'g Guard) -> Self {
        // safety: the table was loaded under `guard` and superseded tables
        // are destroyed only behind the epoch, so it outlives the guard.
        let table = unsafe { table.deref() };
        Self {
            table,
            prev: None,
            bini: 0,
            guard,
        }
    }
}

impl<'g, K, V> Iterator for NodeIter<'g, K, V> {
    type Item = &'g Node<K, V>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let e = match self.prev.take() {
                Some(prev) => prev.next.load(Ordering::Acquire, self.guard),
                None => {
                    if self.bini == self.table.len() {
                        return None;
                    }
                    let head = self.table.bin(self.bini, self.guard);
                    self.bini += 1;
                    head
                }
            };
            // safety: chain pointers are never null and everything reachable
            // from the captured table stays allocated until the guard drops.
            match unsafe { e.deref() } {
                BinEntry::Node(node) => {
                    self.prev = Some(node);
                    return Some(node);
                }
                // end of this chain; move on to the next bin
                BinEntry::Terminal => {}
            }
        }
    }
}
