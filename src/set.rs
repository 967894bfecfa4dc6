//! A concurrent hash set.
//!
//! See `HashSet` for details.

use crate::iter::Keys;
use crate::HashMap;
use crossbeam_epoch::Guard;
use std::borrow::Borrow;
use std::fmt::{self, Debug, Formatter};
use std::hash::{BuildHasher, Hash};

/// A concurrent hash set implemented as a [`HashMap`] where the value is
/// `()`.
///
/// It shares the map's concurrency contract: membership tests and iteration
/// are lock-free and may run in parallel with one writer; `insert` and
/// `remove` serialize on the map's writer mutex.
///
/// # Examples
///
/// ```
/// use molt::HashSet;
///
/// // Initialize a new hash set.
/// let books = HashSet::new();
/// let guard = books.guard();
///
/// // Add some books
/// books.insert("Fight Club", &guard);
/// books.insert("Three Men In A Raft", &guard);
/// books.insert("The Book of Dust", &guard);
/// books.insert("The Dry", &guard);
///
/// // Check for a specific one.
/// if !books.contains(&"The Drunken Botanist", &guard) {
///     println!("We don't have The Drunken Botanist.");
/// }
///
/// // Remove a book.
/// books.remove(&"Three Men In A Raft", &guard);
///
/// // Iterate over everything.
/// for book in books.iter(&guard) {
///     println!("{}", book);
/// }
/// ```
pub struct HashSet<T, S = crate::DefaultHashBuilder> {
    map: HashMap<T, (), S>,
}

impl<T> HashSet<T, crate::DefaultHashBuilder> {
    /// Creates an empty `HashSet`.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashSet;
    /// let set: HashSet<i32> = HashSet::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `HashSet` sized to hold at least `capacity` elements
    /// at the target load factor without rebuilding.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashSet;
    /// let set: HashSet<i32> = HashSet::with_capacity(10);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, crate::DefaultHashBuilder::default())
    }
}

impl<T, S> Default for HashSet<T, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> HashSet<T, S> {
    /// Creates an empty set which will use `hash_builder` to hash values.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is
    /// designed to allow the set to be resistant to attacks that cause many
    /// collisions and very poor performance. Setting it manually using this
    /// function can expose a DoS attack vector.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            map: HashMap::with_hasher(hash_builder),
        }
    }

    /// Creates an empty set with the specified `capacity`, using
    /// `hash_builder` to hash the values.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Pin a [`Guard`] for use with this set.
    ///
    /// Keep in mind that for as long as you hold onto this guard, you are
    /// preventing the collection of garbage generated by the set.
    pub fn guard(&self) -> Guard {
        self.map.guard()
    }

    /// An iterator visiting all elements in arbitrary order.
    ///
    /// The iterator element type is `&'g T`.
    pub fn iter<'g>(&'g self, guard: &'g Guard) -> Keys<'g, T, ()> {
        self.map.keys(guard)
    }
}

impl<T, S> HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    /// Returns `true` if the set contains the specified value.
    ///
    /// The value may be any borrowed form of the set's type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the type.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashSet;
    ///
    /// let set = HashSet::new();
    /// let guard = set.guard();
    /// set.insert(2, &guard);
    ///
    /// assert!(set.contains(&2, &guard));
    /// assert!(!set.contains(&1, &guard));
    /// ```
    pub fn contains<Q>(&self, value: &Q, guard: &Guard) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(value, guard)
    }

    /// Returns a reference to the element in the set, if any, that is equal
    /// to the given value.
    ///
    /// The value may be any borrowed form of the set's type, but [`Hash`]
    /// and [`Eq`] on the borrowed form *must* match those for the type.
    pub fn get<'g, Q>(&'g self, value: &Q, guard: &'g Guard) -> Option<&'g T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.get_key_value(value, guard).map(|(k, _)| k)
    }
}

impl<T, S> HashSet<T, S>
where
    T: 'static + Sync + Send + Clone + Hash + Eq,
    S: BuildHasher,
{
    /// Adds a value to the set.
    ///
    /// Returns `true` if the value was freshly added, `false` if it was
    /// already a member.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashSet;
    ///
    /// let set = HashSet::new();
    /// let guard = set.guard();
    ///
    /// assert!(set.insert(2, &guard));
    /// assert!(!set.insert(2, &guard));
    /// assert!(set.contains(&2, &guard));
    /// ```
    pub fn insert(&self, value: T, guard: &Guard) -> bool {
        self.map.insert(value, (), guard).is_none()
    }

    /// Removes a value from the set.
    ///
    /// Returns `true` if the value was a member.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::HashSet;
    ///
    /// let set = HashSet::new();
    /// let guard = set.guard();
    ///
    /// set.insert(2, &guard);
    /// assert!(set.remove(&2, &guard));
    /// assert!(!set.contains(&2, &guard));
    /// assert!(!set.remove(&2, &guard));
    /// ```
    pub fn remove<Q>(&self, value: &Q, guard: &Guard) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove(value, guard).is_some()
    }
}

impl<T, S> Debug for HashSet<T, S>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let guard = self.guard();
        f.debug_set().entries(self.iter(&guard)).finish()
    }
}

impl<T, S> PartialEq for HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T, S> Eq for HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
}

impl<T, S> FromIterator<T> for HashSet<T, S>
where
    T: 'static + Sync + Send + Clone + Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            map: HashMap::from_iter(iter.into_iter().map(|value| (value, ()))),
        }
    }
}

impl<T, S> Extend<T> for &HashSet<T, S>
where
    T: 'static + Sync + Send + Clone + Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let guard = self.guard();
        for value in iter {
            self.insert(value, &guard);
        }
    }
}
