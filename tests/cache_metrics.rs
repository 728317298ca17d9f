use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use postkeep::application::posts::PostService;
use postkeep::cache::{LruPostCache, PostCache};
use postkeep::domain::{clock, entities::PostRecord};
use postkeep::infra::memory::MemoryPostStore;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // hit/miss/evict straight through the LRU cache
    let lru = LruPostCache::with_capacity(1);
    let first = PostRecord::new("alice", "p-1", "one", clock::now());
    let second = PostRecord::new("alice", "p-2", "two", clock::now());

    assert!(lru.get("alice", "p-1").await.is_none());
    lru.add("alice", "p-1", &first).await;
    assert!(lru.get("alice", "p-1").await.is_some());
    lru.add("alice", "p-2", &second).await;

    // store latency through the composing service
    let service = PostService::new(
        Arc::new(MemoryPostStore::new()),
        Arc::new(LruPostCache::with_capacity(4)),
        Duration::from_secs(5),
    );
    let created = service.create("bob", "hello").await.expect("create");
    service.read("bob", &created.post_id).await.expect("read");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "postkeep_cache_hit_total",
        "postkeep_cache_miss_total",
        "postkeep_cache_evict_total",
        "postkeep_store_op_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
