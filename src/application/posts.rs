//! Cache-aside access to posts.
//!
//! [`PostService`] composes one [`PostStore`] with one [`PostCache`]. The store
//! stays authoritative: reads consult the cache first and populate it on a
//! miss, mutations invalidate the cached copy after the store succeeds. Every
//! store call is bounded by the configured deadline.
//!
//! A read miss skips the populate when an `update` or `delete` started while
//! its store read was in flight, so a slow read cannot re-insert a post that
//! was just invalidated. A mutation that lands between that check and the
//! `add` can still leave a stale entry, as can a crash between a store
//! mutation and the invalidation. Such entries live until evicted or expired.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::repos::{PostStore, RepoError};
use crate::cache::PostCache;
use crate::domain::entities::PostRecord;

const SOURCE: &str = "application::posts::PostService";

pub(crate) const METRIC_STORE_OP_MS: &str = "postkeep_store_op_ms";
pub(crate) const METRIC_STORE_TIMEOUT: &str = "postkeep_store_timeout_total";

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
    cache: Arc<dyn PostCache>,
    timeout: Duration,
    /// Bumped before every `update`/`delete` reaches the store.
    mutations: Arc<AtomicU64>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, cache: Arc<dyn PostCache>, timeout: Duration) -> Self {
        Self {
            store,
            cache,
            timeout,
            mutations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
        let record = self
            .bounded("create", self.store.create(user_id, data))
            .await?;
        self.cache.add(user_id, &record.post_id, &record).await;
        Ok(record)
    }

    pub async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
        if let Some(record) = self.cache.get(user_id, post_id).await {
            debug!(target = SOURCE, user_id, post_id, "served post from cache");
            return Ok(record);
        }

        let epoch = self.mutations.load(Ordering::Acquire);
        let record = self
            .bounded("read", self.store.read(user_id, post_id))
            .await?;
        if self.mutations.load(Ordering::Acquire) == epoch {
            self.cache.add(user_id, post_id, &record).await;
        } else {
            debug!(
                target = SOURCE,
                user_id, post_id, "skipped cache populate after concurrent mutation"
            );
        }
        Ok(record)
    }

    /// Always served by the store; the cache holds single posts only.
    pub async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
        self.bounded("read_all", self.store.read_all(user_id)).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        post_id: &str,
        data: &str,
    ) -> Result<OffsetDateTime, RepoError> {
        self.mutations.fetch_add(1, Ordering::AcqRel);
        let updated_at = self
            .bounded("update", self.store.update(user_id, post_id, data))
            .await?;
        self.cache.remove(user_id, post_id).await;
        Ok(updated_at)
    }

    pub async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
        self.mutations.fetch_add(1, Ordering::AcqRel);
        self.bounded("delete", self.store.delete(user_id, post_id))
            .await?;
        self.cache.remove(user_id, post_id).await;
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        let started_at = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, call).await;
        histogram!(METRIC_STORE_OP_MS, "op" => operation)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(result) => result,
            Err(_) => {
                counter!(METRIC_STORE_TIMEOUT, "op" => operation).increment(1);
                warn!(
                    target = SOURCE,
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store operation exceeded deadline"
                );
                Err(RepoError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{LruPostCache, NoopCache};
    use crate::infra::memory::MemoryPostStore;

    /// Delegates to a memory store and counts reads that reach it.
    struct CountingStore {
        inner: MemoryPostStore,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryPostStore::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PostStore for CountingStore {
        async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
            self.inner.create(user_id, data).await
        }

        async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(user_id, post_id).await
        }

        async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
            self.inner.read_all(user_id).await
        }

        async fn update(
            &self,
            user_id: &str,
            post_id: &str,
            data: &str,
        ) -> Result<OffsetDateTime, RepoError> {
            self.inner.update(user_id, post_id, data).await
        }

        async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
            self.inner.delete(user_id, post_id).await
        }
    }

    /// Never completes within any reasonable deadline.
    struct SlowStore;

    #[async_trait]
    impl PostStore for SlowStore {
        async fn create(&self, _user_id: &str, _data: &str) -> Result<PostRecord, RepoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(RepoError::Persistence("unreachable".into()))
        }

        async fn read(&self, _user_id: &str, _post_id: &str) -> Result<PostRecord, RepoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(RepoError::Persistence("unreachable".into()))
        }

        async fn read_all(&self, _user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn update(
            &self,
            _user_id: &str,
            _post_id: &str,
            _data: &str,
        ) -> Result<OffsetDateTime, RepoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(RepoError::Persistence("unreachable".into()))
        }

        async fn delete(&self, _user_id: &str, _post_id: &str) -> Result<(), RepoError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn service_with_lru(store: Arc<dyn PostStore>) -> (PostService, Arc<LruPostCache>) {
        let cache = Arc::new(LruPostCache::with_capacity(16));
        let service = PostService::new(store, cache.clone(), Duration::from_secs(5));
        (service, cache)
    }

    #[tokio::test]
    async fn read_after_create_is_served_from_cache() {
        let store = Arc::new(CountingStore::new());
        let (service, _cache) = service_with_lru(store.clone());

        let created = service.create("alice", "hello").await.expect("create");
        let fetched = service
            .read("alice", &created.post_id)
            .await
            .expect("read");

        assert_eq!(fetched, created);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn cache_miss_populates_from_store() {
        let store = Arc::new(CountingStore::new());
        let created = store.inner.create("alice", "hello").await.expect("create");
        let (service, cache) = service_with_lru(store.clone());

        service
            .read("alice", &created.post_id)
            .await
            .expect("first read");
        service
            .read("alice", &created.post_id)
            .await
            .expect("second read");

        assert_eq!(store.reads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn update_invalidates_cached_copy() {
        let store = Arc::new(CountingStore::new());
        let (service, cache) = service_with_lru(store.clone());

        let created = service.create("alice", "v1").await.expect("create");
        let updated_at = service
            .update("alice", &created.post_id, "v2")
            .await
            .expect("update");

        assert!(cache.get("alice", &created.post_id).await.is_none());

        let fetched = service
            .read("alice", &created.post_id)
            .await
            .expect("read");
        assert_eq!(fetched.data, "v2");
        assert_eq!(fetched.updated_at, updated_at);
        assert_eq!(fetched.created_at, created.created_at);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn delete_invalidates_cached_copy() {
        let store = Arc::new(CountingStore::new());
        let (service, cache) = service_with_lru(store.clone());

        let created = service.create("alice", "hello").await.expect("create");
        service
            .delete("alice", &created.post_id)
            .await
            .expect("delete");

        assert!(cache.is_empty());
        let err = service
            .read("alice", &created.post_id)
            .await
            .expect_err("deleted post");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_update_leaves_cache_untouched() {
        let store = Arc::new(CountingStore::new());
        let (service, cache) = service_with_lru(store.clone());

        let err = service
            .update("alice", "missing", "v2")
            .await
            .expect_err("missing post");
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn read_all_bypasses_cache() {
        let store = Arc::new(CountingStore::new());
        let service = PostService::new(
            store.clone(),
            Arc::new(NoopCache::new()),
            Duration::from_secs(5),
        );

        service.create("alice", "a").await.expect("create a");
        service.create("alice", "b").await.expect("create b");
        service.create("bob", "c").await.expect("create c");

        let mut data: Vec<String> = service
            .read_all("alice")
            .await
            .expect("read_all")
            .into_iter()
            .map(|record| record.data)
            .collect();
        data.sort();
        assert_eq!(data, vec!["a".to_string(), "b".to_string()]);
        assert!(service.read_all("carol").await.expect("empty").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_yields_timeout() {
        let service = PostService::new(
            Arc::new(SlowStore),
            Arc::new(NoopCache::new()),
            Duration::from_millis(50),
        );

        let err = service.read("alice", "p-1").await.expect_err("deadline");
        assert!(matches!(err, RepoError::Timeout));

        let err = service
            .update("alice", "p-1", "data")
            .await
            .expect_err("deadline");
        assert!(matches!(err, RepoError::Timeout));
    }

    /// Reads the inner store, then parks until released, so a mutation can
    /// land while the read is still in flight.
    struct GatedStore {
        inner: MemoryPostStore,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl PostStore for GatedStore {
        async fn create(&self, user_id: &str, data: &str) -> Result<PostRecord, RepoError> {
            self.inner.create(user_id, data).await
        }

        async fn read(&self, user_id: &str, post_id: &str) -> Result<PostRecord, RepoError> {
            let record = self.inner.read(user_id, post_id).await;
            self.entered.notify_one();
            self.release.notified().await;
            record
        }

        async fn read_all(&self, user_id: &str) -> Result<Vec<PostRecord>, RepoError> {
            self.inner.read_all(user_id).await
        }

        async fn update(
            &self,
            user_id: &str,
            post_id: &str,
            data: &str,
        ) -> Result<OffsetDateTime, RepoError> {
            self.inner.update(user_id, post_id, data).await
        }

        async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), RepoError> {
            self.inner.delete(user_id, post_id).await
        }
    }

    #[tokio::test]
    async fn read_overlapping_delete_does_not_repopulate_cache() {
        let store = Arc::new(GatedStore {
            inner: MemoryPostStore::new(),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let created = store.inner.create("alice", "hello").await.expect("create");
        let (service, cache) = service_with_lru(store.clone());

        let reader = {
            let service = service.clone();
            let post_id = created.post_id.clone();
            tokio::spawn(async move { service.read("alice", &post_id).await })
        };

        store.entered.notified().await;
        service
            .delete("alice", &created.post_id)
            .await
            .expect("delete");
        store.release.notify_one();

        let stale = reader.await.expect("join").expect("in-flight read");
        assert_eq!(stale, created);
        assert!(cache.get("alice", &created.post_id).await.is_none());

        let err = service
            .read("alice", &created.post_id)
            .await
            .expect_err("deleted post");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delimiter_in_user_id_does_not_leak_posts_across_users() {
        let store = Arc::new(CountingStore::new());
        let (service, _cache) = service_with_lru(store.clone());

        let created = service.create("a#b", "secret").await.expect("create");
        let forged_post_id = format!("b#{}", created.post_id);

        let err = service
            .read("a", &forged_post_id)
            .await
            .expect_err("other user's post");
        assert!(err.is_not_found());

        let own = service
            .read("a#b", &created.post_id)
            .await
            .expect("owner read");
        assert_eq!(own, created);
    }
}
