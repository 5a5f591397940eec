use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::models::CacheEntry;
use crate::cache::CacheStore;
use crate::error::CacheError;

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,
    /// Total number of cache misses
    pub misses: u64,
    /// Total number of LRU evictions
    pub evictions: u64,
    /// Total number of insertions
    pub insertions: u64,
    /// Total number of expired entries removed
    pub expirations: u64,
    /// Cache hit ratio (hits / (hits + misses))
    pub hit_ratio: f64,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            hits: 0,
            misses: 0,
            evictions: 0,
            insertions: 0,
            expirations: 0,
            hit_ratio: 0.0,
        }
    }
}

impl CacheStats {
    fn record_hit(&mut self) {
        self.hits += 1;
        self.update_hit_ratio();
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.update_hit_ratio();
    }

    fn update_hit_ratio(&mut self) {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hit_ratio = self.hits as f64 / total as f64;
        }
    }
}

struct StoredEntry {
    entry: CacheEntry,
    last_accessed: Instant,
}

/// In-process cache tier with LRU eviction and lazy expiry.
///
/// Expired entries read as misses and are removed on touch; a periodic
/// opportunistic sweep cleans up entries that are never touched again.
pub struct MemoryStore {
    cache: RwLock<HashMap<String, StoredEntry>>,
    lru_queue: RwLock<VecDeque<String>>,
    max_entries: usize,
    stats: RwLock<CacheStats>,
    cleanup_interval: Duration,
    last_cleanup: RwLock<Instant>,
}

impl MemoryStore {
    /// Create a store with default capacity
    pub fn new() -> Self {
        Self::with_max_entries(1000)
    }

    /// Create a store bounded to the given number of entries
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            lru_queue: RwLock::new(VecDeque::new()),
            max_entries,
            stats: RwLock::new(CacheStats::default()),
            cleanup_interval: Duration::from_secs(60),
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    /// Set the opportunistic cleanup interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        self.stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| CacheError::RetrieveError("stats lock poisoned".to_string()))
    }

    /// Number of entries currently stored, including not-yet-swept
    /// expired ones
    pub fn len(&self) -> Result<usize, CacheError> {
        self.cache
            .read()
            .map(|c| c.len())
            .map_err(|_| CacheError::RetrieveError("cache lock poisoned".to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Remove all expired entries, returning how many were removed
    pub fn sweep_expired(&self) -> Result<usize, CacheError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;
        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;

        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, stored)| stored.entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            cache.remove(key);
            if let Some(pos) = lru_queue.iter().position(|k| k == key) {
                lru_queue.remove(pos);
            }
        }

        if let Ok(mut stats) = self.stats.write() {
            stats.expirations += expired.len() as u64;
        }

        Ok(expired.len())
    }

    fn maybe_sweep(&self) {
        let due = self
            .last_cleanup
            .write()
            .map(|mut last| {
                if last.elapsed() >= self.cleanup_interval {
                    *last = Instant::now();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if due {
            let _ = self.sweep_expired();
        }
    }

    fn touch_lru(&self, key: &str) -> Result<(), CacheError> {
        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;

        if let Some(pos) = lru_queue.iter().position(|k| k == key) {
            lru_queue.remove(pos);
        }
        lru_queue.push_front(key.to_string());
        Ok(())
    }

    fn evict_if_full(&self, new_key: &str) -> Result<(), CacheError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;

        if cache.len() < self.max_entries || cache.contains_key(new_key) {
            return Ok(());
        }

        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;

        if let Some(lru_key) = lru_queue.pop_back() {
            cache.remove(&lru_key);
            if let Ok(mut stats) = self.stats.write() {
                stats.evictions += 1;
            }
        }

        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.maybe_sweep();

        let result = {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| CacheError::RetrieveError("cache lock poisoned".to_string()))?;

            match cache.get_mut(key) {
                Some(stored) if stored.entry.is_expired() => {
                    cache.remove(key);
                    if let Ok(mut stats) = self.stats.write() {
                        stats.record_miss();
                        stats.expirations += 1;
                    }
                    None
                }
                Some(stored) => {
                    stored.last_accessed = Instant::now();
                    if let Ok(mut stats) = self.stats.write() {
                        stats.record_hit();
                    }
                    Some(stored.entry.clone())
                }
                None => {
                    if let Ok(mut stats) = self.stats.write() {
                        stats.record_miss();
                    }
                    None
                }
            }
        };

        if result.is_some() {
            self.touch_lru(key)?;
        }

        Ok(result)
    }

    async fn set(&self, key: &str, entry: CacheEntry, _ttl: Duration) -> Result<(), CacheError> {
        self.evict_if_full(key)?;

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;

            let is_new = !cache.contains_key(key);
            cache.insert(
                key.to_string(),
                StoredEntry {
                    entry,
                    last_accessed: Instant::now(),
                },
            );

            if is_new {
                if let Ok(mut stats) = self.stats.write() {
                    stats.insertions += 1;
                }
            }
        }

        self.touch_lru(key)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;
        cache.remove(key);

        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;
        if let Some(pos) = lru_queue.iter().position(|k| k == key) {
            lru_queue.remove(pos);
        }

        Ok(())
    }

    async fn invalidate_service(&self, service_tag: &str) -> Result<(), CacheError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;
        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;

        let doomed: Vec<String> = cache
            .iter()
            .filter(|(_, stored)| stored.entry.service_tag == service_tag)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            cache.remove(key);
            if let Some(pos) = lru_queue.iter().position(|k| k == key) {
                lru_queue.remove(pos);
            }
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| CacheError::StoreError("cache lock poisoned".to_string()))?;
        cache.clear();

        let mut lru_queue = self
            .lru_queue
            .write()
            .map_err(|_| CacheError::StoreError("lru lock poisoned".to_string()))?;
        lru_queue.clear();

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let cache = self
            .cache
            .read()
            .map_err(|_| CacheError::RetrieveError("cache lock poisoned".to_string()))?;
        Ok(cache.contains_key(key))
    }
}
