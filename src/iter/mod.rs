//! Iterators over a map's entries, keys, and values.
//!
//! All iterators walk the table that was current when they were created and
//! are weakly consistent; see the [notes on iteration](crate::HashMap#iteration).

mod traverser;
pub(crate) use traverser::NodeIter;

use crossbeam_epoch::Guard;
use std::sync::atomic::Ordering;

/// An iterator over a map's entries.
///
/// See [`HashMap::iter`](crate::HashMap::iter) for details.
#[derive(Debug)]
pub struct Iter<'g, K, V> {
    pub(crate) node_iter: NodeIter<'g, K, V>,
    pub(crate) guard: &'g Guard,
}

impl<'g, K, V> Iterator for Iter<'g, K, V> {
    type Item = (&'g K, &'g V);
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.node_iter.next()?;
            let value = node.value.load(Ordering::Acquire, self.guard);
            if value.is_null() {
                // tombstoned entry
                continue;
            }
            // safety: the value was live when loaded under our guard, so its
            // destruction is deferred at least until the guard drops.
            return Some((&node.key, unsafe { value.deref() }));
        }
    }
}

/// An iterator over a map's keys.
///
/// See [`HashMap::keys`](crate::HashMap::keys) for details.
#[derive(Debug)]
pub struct Keys<'g, K, V> {
    pub(crate) node_iter: NodeIter<'g, K, V>,
    pub(crate) guard: &'g Guard,
}

impl<'g, K, V> Iterator for Keys<'g, K, V> {
    type Item = &'g K;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.node_iter.next()?;
            // a tombstoned entry's key is not a key of the map
            if node.value.load(Ordering::Acquire, self.guard).is_null() {
                continue;
            }
            return Some(&node.key);
        }
    }
}

/// An iterator over a map's values.
///
/// See [`HashMap::values`](crate::HashMap::values) for details.
#[derive(Debug)]
pub struct Values<'g, K, V> {
    pub(crate) node_iter: NodeIter<'g, K, V>,
    pub(crate) guard: &'g Guard,
}

impl<'g, K, V> Iterator for Values<'g, K, V> {
    type Item = &'g V;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.node_iter.next()?;
            let value = node.value.load(Ordering::Acquire, self.guard);
            if value.is_null() {
                continue;
            }
            // safety: as in `Iter::next`.
            return Some(unsafe { value.deref() });
        }
    }
}
