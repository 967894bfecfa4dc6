//! A resizable concurrent hash map with lock-free readers and a single
//! serialized writer.
//!
//! `molt` keeps its entries in a fixed-capacity table of bucket chains whose
//! heads, next pointers, and value slots are all atomics. Any number of
//! readers can walk those chains in parallel with one writer, and readers take
//! no locks, ever. Writers serialize on a mutex, and when a write leaves the
//! table too dense, too sparse, or too full of logically-deleted entries,
//! the writer builds a right-sized replacement table and atomically swaps it
//! in. Like its namesake, the map sheds its old skin in one piece: readers
//! see either the old table or the new one, never a half-built hybrid.
//!
//! This shape is a deliberate trade-off. Writes do not scale across cores:
//! if you need many concurrent writers, reach for a sharded or CAS-based map
//! instead. What you get in exchange is a very simple reader contract:
//! [`HashMap::get`] and iteration are plain pointer walks over memory that
//! is immutable once published, with no helping, no retry loops, and no
//! reader-visible intermediate states.
//!
//! # A note on `Guard`s and memory use
//!
//! Removed and replaced values, and tables superseded by a resize, cannot be
//! freed while some reader might still be looking at them. `molt` uses
//! epoch-based reclamation ([`crossbeam-epoch`](epoch)) to defer that
//! cleanup: operations take a [`Guard`](epoch::Guard), acquired from
//! [`HashMap::guard`] or [`epoch::pin`], and everything an operation returns
//! borrows from that guard. Holding a guard for a long time holds back
//! garbage collection for every user of the same collector, so pin around
//! bursts of work rather than around your whole program.
//!
//! If juggling guards is noise in your use case, [`HashMap::pin`] returns a
//! [`HashMapRef`] that owns a guard and exposes the same API without the
//! extra argument.
//!
//! # Examples
//!
//! ```
//! use molt::HashMap;
//!
//! let map = HashMap::new();
//!
//! // pin once, do a batch of work
//! let guard = map.guard();
//! map.insert("alpha", 1, &guard);
//! map.insert("beta", 2, &guard);
//! assert_eq!(map.get(&"alpha", &guard), Some(&1));
//! map.remove(&"beta", &guard);
//! assert!(!map.contains_key(&"beta", &guard));
//!
//! // or use the pinned view
//! let pinned = map.pin();
//! pinned.insert("gamma", 3);
//! assert_eq!(pinned.get(&"gamma"), Some(&3));
//! ```
//!
//! Racing initialization resolves to a single winner:
//!
//! ```
//! use molt::HashMap;
//!
//! let map: HashMap<&str, i32> = HashMap::new();
//! let guard = map.guard();
//! let first = map.try_insert("k", 1, &guard);
//! let second = map.try_insert("k", 2, &guard);
//! assert_eq!(first, Ok(&1));
//! assert_eq!(second.unwrap_err().current, &1);
//! ```
#![deny(missing_docs, missing_debug_implementations, unreachable_pub)]
#![warn(rust_2018_idioms)]

mod map;
mod map_ref;
mod node;
mod raw;
mod set;
mod set_ref;

#[cfg(feature = "serde")]
mod serde_impls;

pub mod iter;

pub use map::{HashMap, Stats, TryInsertError};
pub use map_ref::HashMapRef;
pub use set::HashSet;
pub use set_ref::HashSetRef;

/// Re-export of [`crossbeam-epoch`](https://docs.rs/crossbeam-epoch), whose
/// [`Guard`](epoch::Guard)s gate every operation on the map.
pub use crossbeam_epoch as epoch;

/// The default [`BuildHasher`](std::hash::BuildHasher) for maps and sets.
///
/// A fast, DoS-resistant, non-cryptographic hasher; the map only ever uses
/// the low 32 bits of its output.
pub type DefaultHashBuilder = ahash::RandomState;
