//! External memcached cache.
//!
//! Records are stored as JSON under [`create_key`]. The `memcache` client is
//! blocking, so every call runs on the blocking thread pool. Any failure on the
//! remote side degrades to a miss or is dropped after a `warn!`.

use std::time::Duration;

use async_trait::async_trait;
use memcache::Client;
use tokio::task;
use tracing::{instrument, warn};

use crate::domain::entities::PostRecord;

use super::config::CacheConfig;
use super::keys::create_key;
use super::PostCache;

const SOURCE: &str = "cache::memcached";
const IO_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct MemcachedCache {
    client: Client,
    ttl_seconds: u32,
}

impl MemcachedCache {
    /// Connect to the configured memcached servers.
    pub fn connect(config: &CacheConfig) -> Result<Self, memcache::MemcacheError> {
        let client = Client::connect(config.memcached_servers.clone())?;
        client.set_read_timeout(Some(IO_TIMEOUT))?;
        client.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(Self::from_client(client, config.ttl_seconds()))
    }

    pub fn from_client(client: Client, ttl_seconds: u32) -> Self {
        Self {
            client,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl PostCache for MemcachedCache {
    #[instrument(name = "memcached.Add", skip(self, record))]
    async fn add(&self, user_id: &str, post_id: &str, record: &PostRecord) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target = SOURCE, error = %err, "failed to encode post for cache");
                return;
            }
        };

        let key = create_key(user_id, post_id);
        let client = self.client.clone();
        let ttl = self.ttl_seconds;
        let outcome = task::spawn_blocking(move || client.set(&key, payload.as_str(), ttl)).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(target = SOURCE, error = %err, "memcached set failed"),
            Err(err) => warn!(target = SOURCE, error = %err, "memcached set task failed"),
        }
    }

    #[instrument(name = "memcached.Get", skip(self))]
    async fn get(&self, user_id: &str, post_id: &str) -> Option<PostRecord> {
        let key = create_key(user_id, post_id);
        let client = self.client.clone();
        let outcome = task::spawn_blocking(move || client.get::<String>(&key)).await;

        let payload = match outcome {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => return None,
            Ok(Err(err)) => {
                warn!(target = SOURCE, error = %err, "memcached get failed");
                return None;
            }
            Err(err) => {
                warn!(target = SOURCE, error = %err, "memcached get task failed");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(target = SOURCE, error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    #[instrument(name = "memcached.Remove", skip(self))]
    async fn remove(&self, user_id: &str, post_id: &str) {
        let key = create_key(user_id, post_id);
        let client = self.client.clone();
        let outcome = task::spawn_blocking(move || client.delete(&key)).await;

        match outcome {
            Ok(Ok(_existed)) => {}
            Ok(Err(err)) => warn!(target = SOURCE, error = %err, "memcached delete failed"),
            Err(err) => warn!(target = SOURCE, error = %err, "memcached delete task failed"),
        }
    }
}
