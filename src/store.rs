//! Insert-only result store.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// A mapping from key to a previously computed result.
///
/// Entries are written once and never replaced or removed; the store only
/// grows. Dropping the store drops every entry with it.
#[derive(Debug, Clone)]
pub struct CacheStore<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for CacheStore<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored result for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Whether a result is stored for `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Store `value` under `key` unless an entry already exists.
    ///
    /// Returns the value that ends up stored, which is the existing one when
    /// the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> &V {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// The stored result for `key`, computing and storing it on a miss.
    ///
    /// If `compute` fails nothing is stored and the error is returned as is.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, compute: F) -> Result<&V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(compute()?)),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A return type whose successful part can be cached on its own.
///
/// The `#[memoize]` expansion stores [`MemoOutput::Stored`] for `Result`
/// returns, so only `Ok` payloads are kept and the error type does not need
/// to be `Clone`.
pub trait MemoOutput: Sized {
    /// The part of the output that is kept in the store.
    type Stored: Clone;

    /// A copy of the storable part, or `None` if nothing should be stored.
    fn stored(&self) -> Option<Self::Stored>;

    /// Rebuilds the output from a stored value.
    fn from_stored(stored: Self::Stored) -> Self;
}

impl<T: Clone, E> MemoOutput for Result<T, E> {
    type Stored = T;

    fn stored(&self) -> Option<T> {
        self.as_ref().ok().cloned()
    }

    fn from_stored(stored: T) -> Self {
        Ok(stored)
    }
}
