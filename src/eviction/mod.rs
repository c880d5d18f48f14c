//! Eviction policy implementations.
//!
//! These only serve [`crate::bounded::BoundedMemoized`]; the plain
//! [`crate::Memoized`] never evicts.

use crate::config::EvictionKind;
use std::collections::HashMap;
use std::hash::Hash;

/// Result of an eviction policy decision.
#[derive(Debug)]
pub struct EvictionResult<K> {
    /// The keys that should be evicted from the cache.
    pub keys_to_evict: Vec<K>,
}

/// A trait for cache eviction policies.
///
/// Implementations decide which keys to drop when a bounded cache is full.
/// They only track keys; the cache keeps the values.
pub trait EvictionPolicy<K>: std::fmt::Debug {
    /// Called when a key is inserted into the cache.
    fn on_insert(&mut self, key: &K);

    /// Called when a key is read from the cache.
    fn on_access(&mut self, key: &K);

    /// Picks up to `count` keys to evict and forgets them.
    fn evict(&mut self, count: usize) -> EvictionResult<K>;
}

/// LRU (Least Recently Used) eviction policy.
///
/// Uses a logical clock rather than wall time so ordering is exact even when
/// accesses happen within the same instant.
#[derive(Debug)]
pub struct LruPolicy<K> {
    clock: u64,
    last_used: HashMap<K, u64>,
}

impl<K> Default for LruPolicy<K> {
    fn default() -> Self {
        Self {
            clock: 0,
            last_used: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LruPolicy<K> {
    /// Creates a new LRU eviction policy.
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn on_insert(&mut self, key: &K) {
        let now = self.tick();
        self.last_used.insert(key.clone(), now);
    }

    fn on_access(&mut self, key: &K) {
        let now = self.tick();
        if let Some(used) = self.last_used.get_mut(key) {
            *used = now;
        }
    }

    fn evict(&mut self, count: usize) -> EvictionResult<K> {
        let mut entries: Vec<(K, u64)> = self
            .last_used
            .iter()
            .map(|(key, used)| (key.clone(), *used))
            .collect();

        entries.sort_by_key(|(_, used)| *used);

        let keys_to_evict = entries
            .into_iter()
            .take(count)
            .map(|(key, _)| {
                self.last_used.remove(&key);
                key
            })
            .collect();

        EvictionResult { keys_to_evict }
    }
}

/// LFU (Least Frequently Used) eviction policy.
///
/// Ties are broken by insertion order, oldest first.
#[derive(Debug)]
pub struct LfuPolicy<K> {
    clock: u64,
    access_count: HashMap<K, (usize, u64)>,
}

impl<K> Default for LfuPolicy<K> {
    fn default() -> Self {
        Self {
            clock: 0,
            access_count: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LfuPolicy<K> {
    /// Creates a new LFU eviction policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K> EvictionPolicy<K> for LfuPolicy<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn on_insert(&mut self, key: &K) {
        self.clock += 1;
        self.access_count.insert(key.clone(), (1, self.clock));
    }

    fn on_access(&mut self, key: &K) {
        if let Some((count, _)) = self.access_count.get_mut(key) {
            *count += 1;
        }
    }

    fn evict(&mut self, count: usize) -> EvictionResult<K> {
        if count == 0 || self.access_count.is_empty() {
            return EvictionResult {
                keys_to_evict: Vec::new(),
            };
        }

        let mut entries: Vec<(K, (usize, u64))> = self
            .access_count
            .iter()
            .map(|(key, stats)| (key.clone(), *stats))
            .collect();

        entries.sort_by_key(|(_, stats)| *stats);

        let keys_to_evict = entries
            .into_iter()
            .take(count)
            .map(|(key, _)| {
                self.access_count.remove(&key);
                key
            })
            .collect();

        EvictionResult { keys_to_evict }
    }
}

/// Factory for creating eviction policies.
pub fn create_policy<K>(kind: EvictionKind) -> Box<dyn EvictionPolicy<K>>
where
    K: Eq + Hash + Clone + std::fmt::Debug + 'static,
{
    match kind {
        EvictionKind::Lru => Box::new(LruPolicy::new()),
        EvictionKind::Lfu => Box::new(LfuPolicy::new()),
    }
}
