//! Memoization cache for diagram operations.
//!
//! A thin wrapper around [HashMap] that records hit/miss statistics. The
//! manager keeps one persistent cache per family of operations; operations
//! whose result depends on an extra argument that is not part of the key
//! (e.g. a variable set) use a fresh cache per call instead.

use std::collections::HashMap;
use std::hash::Hash;

use crate::reference::{AddRef, Ref};

/// Keys of the persistent operation caches.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
    ToAdd(Ref),
    AddApply(u8, AddRef, AddRef),
    AddToBdd(AddRef),
}

pub struct Cache<K, V> {
    map: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq,
    V: Copy,
{
    #[inline]
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(&v) => {
                self.hits += 1;
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_cache_statistics() {
        let mut cache = Cache::<OpKey, Ref>::new();
        let key = OpKey::Ite(Ref::positive(2), Ref::ONE, Ref::ZERO);

        assert_eq!(cache.get(&key), None);
        cache.insert(key, Ref::positive(2));
        assert_eq!(cache.get(&key), Some(Ref::positive(2)));

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
