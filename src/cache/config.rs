//! Cache configuration.

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_MEMCACHED_SERVER: &str = "memcache://127.0.0.1:11211";

/// Which [`PostCache`](super::PostCache) implementation to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    None,
    Memory,
    Memcached,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Memory => "memory",
            Self::Memcached => "memcached",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "noop" | "disabled" => Ok(Self::None),
            "memory" | "lru" => Ok(Self::Memory),
            "memcached" => Ok(Self::Memcached),
            other => Err(format!(
                "unknown cache backend `{other}` (expected none|memory|memcached)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Maximum entries held by the in-process LRU cache.
    pub capacity: usize,
    /// memcached server URLs, e.g. `memcache://127.0.0.1:11211`.
    pub memcached_servers: Vec<String>,
    /// Expiry applied to memcached entries; zero keeps them until evicted.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            capacity: DEFAULT_CAPACITY,
            memcached_servers: vec![DEFAULT_MEMCACHED_SERVER.to_string()],
            ttl: Duration::ZERO,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            capacity: settings.capacity.get(),
            memcached_servers: settings.memcached_servers.clone(),
            ttl: settings.ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// memcached expiration in seconds, saturating at `u32::MAX`.
    pub fn ttl_seconds(&self) -> u32 {
        u32::try_from(self.ttl.as_secs()).unwrap_or(u32::MAX)
    }
}
