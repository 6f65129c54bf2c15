//! Bounded query-result cache with TTL expiry and a runtime-switchable
//! LRu/MRU eviction policy (spec §4.5).
//!
//! Backed by an `indexmap::IndexMap` rather than a fixed-policy crate like
//! `lru`: the map's iteration order *is* the access-order permutation spec
//! §3 requires of cache entries, and moving an accessed key to the back on
//! every `get`/`set` lets both LRU (evict the front) and MRU (evict the
//! back) read off the same order list.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStrategy {
    Lru,
    Mru,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    created_at: u64,
    last_accessed: u64,
    access_count: u32,
}

#[derive(Debug, Clone)]
pub struct CacheAnalysis {
    pub hit_rate: f64,
    pub mean_access_count: f64,
    pub top_accessed: Vec<(String, u32)>,
}

#[derive(Debug)]
pub struct Cache<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    capacity: usize,
    ttl_ms: u64,
    strategy: EvictionStrategy,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

impl<V: Clone> Cache<V> {
    pub fn new(capacity: usize, ttl_ms: u64, strategy: EvictionStrategy) -> Cache<V> {
        Cache {
            entries: IndexMap::new(),
            capacity,
            ttl_ms,
            strategy,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn with_defaults() -> Cache<V> {
        Cache::new(DEFAULT_CAPACITY, DEFAULT_TTL_MS, EvictionStrategy::Lru)
    }

    pub fn set_strategy(&mut self, strategy: EvictionStrategy) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn is_expired(entry: &CacheEntry<V>, ttl_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(entry.created_at) > ttl_ms
    }

    /// Returns a clone of the cached value, refreshing its last-accessed
    /// time and access count, and moving it to the most-recently-used
    /// position in the order list. An expired entry is evicted and counted
    /// as a miss, never returned.
    pub fn get(&mut self, key: &str, now_ms: u64) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => Self::is_expired(entry, self.ttl_ms, now_ms),
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.shift_remove(key);
            self.evictions += 1;
            self.misses += 1;
            return None;
        }
        let mut entry = self.entries.shift_remove(key).expect("checked present above");
        entry.last_accessed = now_ms;
        entry.access_count += 1;
        let data = entry.data.clone();
        self.entries.insert(key.to_string(), entry);
        self.hits += 1;
        Some(data)
    }

    /// Inserts or replaces `key`, evicting once under the configured
    /// strategy if the cache is at capacity and `key` is new.
    pub fn set(&mut self, key: impl Into<String>, data: V, now_ms: u64) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.shift_remove(&key);
        self.entries.insert(
            key,
            CacheEntry { data, created_at: now_ms, last_accessed: now_ms, access_count: 0 },
        );
    }

    fn evict_one(&mut self) {
        let victim = match self.strategy {
            EvictionStrategy::Lru => self.entries.get_index(0).map(|(k, _)| k.clone()),
            EvictionStrategy::Mru => {
                let last = self.entries.len().checked_sub(1);
                last.and_then(|idx| self.entries.get_index(idx)).map(|(k, _)| k.clone())
            }
        };
        if let Some(key) = victim {
            self.entries.shift_remove(&key);
            self.evictions += 1;
        }
    }

    /// Sweeps every expired entry regardless of access, returning the
    /// number removed.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| Self::is_expired(entry, self.ttl_ms, now_ms))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            self.entries.shift_remove(key);
        }
        self.evictions += expired_keys.len() as u64;
        expired_keys.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn analyze(&self, top_k: usize) -> CacheAnalysis {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 { 0.0 } else { self.hits as f64 / total as f64 };
        let mean_access_count = if self.entries.is_empty() {
            0.0
        } else {
            let sum: u64 = self.entries.values().map(|e| e.access_count as u64).sum();
            sum as f64 / self.entries.len() as f64
        };
        let mut ranked: Vec<(String, u32)> =
            self.entries.iter().map(|(k, e)| (k.clone(), e.access_count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(top_k);
        CacheAnalysis { hit_rate, mean_access_count, top_accessed: ranked }
    }
}
