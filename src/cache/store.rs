//! Bounded in-process LRU cache.

use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tracing::instrument;

use crate::domain::entities::PostRecord;

use super::config::CacheConfig;
use super::keys::create_key;
use super::lock::mutex_lock;
use super::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, PostCache};

const SOURCE: &str = "cache::store";
const CACHE_LABEL: &str = "lru";

/// Fixed-capacity least-recently-used cache of posts.
///
/// Inserting beyond capacity evicts the least-recently-used entry. A `get` hit
/// counts as a use and refreshes recency. One mutex guards the whole map since
/// a hit reorders the recency list.
pub struct LruPostCache {
    entries: Mutex<LruCache<String, PostRecord>>,
}

impl LruPostCache {
    /// Create a new LRU cache with the configured capacity.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(&CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    /// Get the number of cached posts.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "capacity").cap().get()
    }
}

#[async_trait]
impl PostCache for LruPostCache {
    #[instrument(name = "lru.Add", skip(self, record))]
    async fn add(&self, user_id: &str, post_id: &str, record: &PostRecord) {
        let key = create_key(user_id, post_id);
        let evicted = mutex_lock(&self.entries, SOURCE, "add").push(key.clone(), record.clone());
        // `push` also returns the old value when overwriting the same key.
        if matches!(evicted, Some((ref evicted_key, _)) if *evicted_key != key) {
            counter!(METRIC_CACHE_EVICT, "cache" => CACHE_LABEL).increment(1);
        }
    }

    #[instrument(name = "lru.Get", skip(self))]
    async fn get(&self, user_id: &str, post_id: &str) -> Option<PostRecord> {
        let key = create_key(user_id, post_id);
        let found = mutex_lock(&self.entries, SOURCE, "get").get(&key).cloned();
        match found {
            Some(_) => counter!(METRIC_CACHE_HIT, "cache" => CACHE_LABEL).increment(1),
            None => counter!(METRIC_CACHE_MISS, "cache" => CACHE_LABEL).increment(1),
        }
        found
    }

    #[instrument(name = "lru.Remove", skip(self))]
    async fn remove(&self, user_id: &str, post_id: &str) {
        let key = create_key(user_id, post_id);
        mutex_lock(&self.entries, SOURCE, "remove").pop(&key);
    }
}
