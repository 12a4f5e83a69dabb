mod helpers;

use helpers::*;
use loopmemory::config::ReconcilePolicy;
use loopmemory::error::MemoryError;
use loopmemory::memory::store::MemoryStore;
use serde_json::json;

#[tokio::test]
async fn add_memory_writes_row_and_vector() {
    let h = harness(ReconcilePolicy::Rollback);

    let mut metadata = serde_json::Map::new();
    metadata.insert("source".into(), json!("chat"));
    let ingested = h
        .pipeline
        .add_memory("the deploy key lives in vault".into(), Some(metadata))
        .await
        .unwrap();

    assert!(ingested.indexed);
    assert_eq!(ingested.memory.content, "the deploy key lives in vault");
    assert_eq!(ingested.memory.metadata.as_ref().unwrap()["source"], json!("chat"));

    let stored = h.store.get_memory(&ingested.memory.id).await.unwrap().unwrap();
    assert_eq!(stored, ingested.memory);
    assert_eq!(h.index.vector_count().await, 1);
    assert_eq!(h.count_rows("pending_index"), 0);
}

#[tokio::test]
async fn empty_content_is_rejected_before_embedding() {
    let h = harness(ReconcilePolicy::Rollback);

    for content in ["", "   ", "\n\t"] {
        let err = h.pipeline.add_memory(content.into(), None).await.unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)), "got {err:?}");
    }
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.count_rows("memories"), 0);
}

#[tokio::test]
async fn embedding_failure_writes_nothing() {
    let h = harness(ReconcilePolicy::Rollback);
    h.embedder.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.pipeline.add_memory("hello".into(), None).await.unwrap_err();
    assert!(matches!(err, MemoryError::EmbeddingProvider(_)));
    assert_eq!(h.count_rows("memories"), 0);
    assert_eq!(h.index.upsert_calls(), 0);
}

#[tokio::test]
async fn transient_index_failures_are_retried() {
    let h = harness(ReconcilePolicy::Rollback);
    h.index.fail_next_upserts(2);

    let ingested = h.pipeline.add_memory("retry me".into(), None).await.unwrap();

    assert!(ingested.indexed);
    assert_eq!(h.index.upsert_calls(), 3);
    assert_eq!(h.index.vector_count().await, 1);
    assert_eq!(h.count_rows("pending_index"), 0);
}

#[tokio::test]
async fn rollback_removes_row_when_index_stays_down() {
    let h = harness(ReconcilePolicy::Rollback);
    h.index.fail_all_upserts();

    let err = h.pipeline.add_memory("doomed".into(), None).await.unwrap_err();

    match err {
        MemoryError::IndexWrite(msg) => assert!(msg.contains("rolled back"), "{msg}"),
        other => panic!("expected IndexWrite, got {other:?}"),
    }
    assert_eq!(h.index.upsert_calls(), 3);
    assert_eq!(h.count_rows("memories"), 0);
    assert_eq!(h.count_rows("pending_index"), 0);
    assert_eq!(h.index.vector_count().await, 0);
}

#[tokio::test]
async fn failed_rollback_leaves_memory_queued() {
    let h = harness(ReconcilePolicy::Rollback);
    h.index.fail_all_upserts();
    h.index
        .fail_deletes
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = h.pipeline.add_memory("stuck".into(), None).await.unwrap_err();

    match err {
        MemoryError::IndexWrite(msg) => assert!(msg.contains("queued for re-indexing"), "{msg}"),
        other => panic!("expected IndexWrite, got {other:?}"),
    }
    assert_eq!(h.count_rows("memories"), 1);

    let pending = h.store.pending_index(i64::MAX, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].last_error.as_deref().unwrap().contains("index unavailable"));
}

#[tokio::test]
async fn defer_keeps_row_and_reports_unindexed() {
    let h = harness(ReconcilePolicy::Defer);
    h.index.fail_all_upserts();

    let ingested = h.pipeline.add_memory("later".into(), None).await.unwrap();

    assert!(!ingested.indexed);
    assert!(h.store.get_memory(&ingested.memory.id).await.unwrap().is_some());
    let pending = h.store.pending_index(i64::MAX, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].memory_id, ingested.memory.id);
}

#[tokio::test]
async fn concurrent_adds_all_land() {
    let h = harness(ReconcilePolicy::Rollback);

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = h.pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.add_memory(format!("note number {i}"), None).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().indexed);
    }

    assert_eq!(h.count_rows("memories"), 8);
    assert_eq!(h.index.vector_count().await, 8);
}
