//! Read-through caches for posts.
//!
//! A cache is an optional optimisation in front of a
//! [`PostStore`](crate::application::repos::PostStore). It never owns
//! authoritative state, so no cache operation reports an error: failures
//! degrade to a miss or are dropped.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "memory"   # none | memory | memcached
//! capacity = 1024
//! memcached_servers = ["memcache://127.0.0.1:11211"]
//! ttl_seconds = 0
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod memcached;
mod noop;
mod store;

use async_trait::async_trait;

use crate::domain::entities::PostRecord;

pub use config::{CacheBackend, CacheConfig};
pub use keys::{KEY_DELIMITER, create_key};
pub use memcached::MemcachedCache;
pub use noop::NoopCache;
pub use store::LruPostCache;

pub(crate) const METRIC_CACHE_HIT: &str = "postkeep_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "postkeep_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "postkeep_cache_evict_total";

#[async_trait]
pub trait PostCache: Send + Sync {
    /// Insert or overwrite the cached copy of a post.
    async fn add(&self, user_id: &str, post_id: &str, record: &PostRecord);

    /// Look up a post; `None` on miss, eviction, disabled cache or remote failure.
    async fn get(&self, user_id: &str, post_id: &str) -> Option<PostRecord>;

    /// Evict a post if present.
    async fn remove(&self, user_id: &str, post_id: &str);
}
