//! Disabled cache.

use async_trait::async_trait;

use crate::domain::entities::PostRecord;

use super::PostCache;

/// Cache that stores nothing; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PostCache for NoopCache {
    async fn add(&self, _user_id: &str, _post_id: &str, _record: &PostRecord) {}

    async fn get(&self, _user_id: &str, _post_id: &str) -> Option<PostRecord> {
        None
    }

    async fn remove(&self, _user_id: &str, _post_id: &str) {}
}
