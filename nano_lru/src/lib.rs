//! Minimal bounded caches used by the waymark router.
//!
//! Two flavours, both deliberately tiny:
//!
//! - [`LruMap`] is a capacity-bounded map that evicts the least recently
//!   used entry on overflow.
//! - [`PairCache`] holds exactly one keyed entry and is meant for
//!   memoising a computation that is repeatedly asked for the same key
//!   in bursts.
//!
//! ```rust
//! use nano_lru::LruMap;
//!
//! let mut cache = LruMap::new(2);
//! cache.insert("a", 1);
//! cache.insert("b", 2);
//! cache.insert("c", 3); // "a" is evicted
//!
//! assert_eq!(cache.get(&"a"), None);
//! assert_eq!(cache.get(&"c"), Some(&3));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

// Entries are kept in a plain vector ordered from least to most recently
// used. `n` is small enough in practice (router match caches default to a
// few dozen entries) that linear scans beat hashing.
/// A capacity-bounded map with least-recently-used eviction.
#[derive(Debug, Clone)]
pub struct LruMap<K, V> {
    entries: Vec<(K, V)>,
    capacity: usize,
}

impl<K, V> LruMap<K, V>
where
    K: PartialEq,
{
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// ## Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LruMap capacity must be non-zero");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// The maximum number of entries the cache will hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of entries currently cached.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up `key`, marking the entry as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.borrow() == key)?;
        // Move the entry to the most-recently-used end.
        let entry = self.entries.remove(index);
        self.entries.push(entry);
        self.entries.last().map(|(_, v)| v)
    }

    /// Looks up `key` without touching the recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Returns `true` if the cache holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries.iter().any(|(k, _)| k.borrow() == key)
    }

    /// Inserts an entry, returning the previous value for `key` if any.
    ///
    /// When the cache is full the least recently used entry is dropped to
    /// make room.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(index) = self.entries.iter().position(|(k, _)| k == &key) {
            let (_, old) = self.entries.remove(index);
            self.entries.push((key, value));
            return Some(old);
        }

        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((key, value));
        None
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A cache of exactly one keyed entry.
///
/// Useful when the same question is asked many times in a row with the
/// same key, such as segment-delta computations during a transition.
#[derive(Debug, Clone, Default)]
pub struct PairCache<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> PairCache<K, V>
where
    K: PartialEq,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Returns the cached value if `key` matches the stored key.
    pub fn get(&self, key: &K) -> Option<&V> {
        match &self.slot {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if an entry is stored (regardless of its key).
    pub fn is_occupied(&self) -> bool {
        self.slot.is_some()
    }

    /// Returns the cached value if the stored key satisfies `matches`.
    ///
    /// This allows a caller to probe the cache with a borrowed view of the
    /// key without building an owned key first.
    pub fn get_by<F>(&self, matches: F) -> Option<&V>
    where
        F: FnOnce(&K) -> bool,
    {
        match &self.slot {
            Some((k, v)) if matches(k) => Some(v),
            _ => None,
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: K, value: V) {
        self.slot = Some((key, value));
    }

    /// Returns the value for `key`, computing and storing it if the cached
    /// entry is missing or keyed differently.
    pub fn get_or_insert_with<F>(&mut self, key: K, compute: F) -> &V
    where
        F: FnOnce(&K) -> V,
    {
        let stale = match &self.slot {
            Some((k, _)) => *k != key,
            None => true,
        };
        if stale {
            let value = compute(&key);
            self.slot = Some((key, value));
        }
        // The slot is occupied on every path above.
        &self.slot.as_ref().unwrap().1
    }

    /// Drops the cached entry.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{LruMap, PairCache};

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruMap::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so that "b" becomes the eviction candidate.
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.insert("c", 3);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = LruMap::new(3);
        for i in 0..100 {
            cache.insert(i, i);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut cache = LruMap::new(2);
        cache.insert("a", 1);
        assert_eq!(cache.insert("a", 2), Some(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(&2));
    }

    #[test]
    fn peek_does_not_touch_recency() {
        let mut cache = LruMap::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert_eq!(cache.peek(&"a"), Some(&1));
        cache.insert("c", 3);

        // "a" was only peeked, so it is still the eviction candidate.
        assert_eq!(cache.peek(&"a"), None);
        assert_eq!(cache.peek(&"b"), Some(&2));
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = LruMap::<u8, u8>::new(0);
    }

    #[test]
    fn pair_cache_holds_a_single_entry() {
        let mut cache = PairCache::new();
        cache.put(("home", "about"), 1);
        assert_eq!(cache.get(&("home", "about")), Some(&1));

        cache.put(("about", "home"), 2);
        assert_eq!(cache.get(&("home", "about")), None);
        assert_eq!(cache.get(&("about", "home")), Some(&2));
    }

    #[test]
    fn pair_cache_borrowed_probe() {
        let mut cache = PairCache::new();
        cache.put(("users".to_owned(), "home".to_owned()), 7);

        let hit = cache.get_by(|(a, b)| a == "users" && b == "home");
        assert_eq!(hit, Some(&7));
        let miss = cache.get_by(|(a, _)| a == "admin");
        assert_eq!(miss, None);
    }

    #[test]
    fn pair_cache_recomputes_on_key_change() {
        let mut cache = PairCache::new();
        let mut calls = 0;

        let v = *cache.get_or_insert_with("a", |_| {
            calls += 1;
            10
        });
        assert_eq!((v, calls), (10, 1));

        let v = *cache.get_or_insert_with("a", |_| {
            calls += 1;
            11
        });
        // Same key: cached value is reused.
        assert_eq!((v, calls), (10, 1));

        let v = *cache.get_or_insert_with("b", |_| {
            calls += 1;
            12
        });
        assert_eq!((v, calls), (12, 2));
    }
}
