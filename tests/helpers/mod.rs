#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use loopmemory::config::{LoopConfig, ReconcilePolicy};
use loopmemory::db;
use loopmemory::embedding::EmbeddingProvider;
use loopmemory::index::sqlite::SqliteVecIndex;
use loopmemory::index::{VectorIndex, VectorMatch, VectorRecord};
use loopmemory::memory::retry::RetryPolicy;
use loopmemory::memory::store::{MemoryStore, SqliteMemoryStore};
use loopmemory::memory::types::{IndexAttempt, Memory, NewMemory, PendingIndex, Project};
use loopmemory::memory::{MemoryPipeline, PipelineOptions};
use loopmemory::tools::LoopTools;

pub const TEST_DIMS: usize = 32;

/// Deterministic bag-of-words embedder: each lowercase word hashes into one
/// bucket, so texts sharing words land close together.
#[derive(Default)]
pub struct TestEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl TestEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn test_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIMS];
    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        let bucket = word
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        v[bucket as usize % TEST_DIMS] += 1.0;
    }
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for TestEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        Ok(test_embedding(text))
    }

    fn dimensions(&self) -> usize {
        TEST_DIMS
    }

    fn model(&self) -> &str {
        "test-bag-of-words"
    }
}

/// A real in-memory sqlite-vec index with switchable faults.
pub struct FlakyIndex {
    inner: SqliteVecIndex,
    /// Number of upcoming upserts to fail. `usize::MAX` fails forever.
    pub failing_upserts: AtomicUsize,
    pub fail_deletes: AtomicBool,
    pub fail_queries: AtomicBool,
    pub upsert_calls: AtomicUsize,
}

impl FlakyIndex {
    pub fn new() -> Self {
        Self {
            inner: SqliteVecIndex::open_in_memory(TEST_DIMS).unwrap(),
            failing_upserts: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_upserts(&self, n: usize) {
        self.failing_upserts.store(n, Ordering::SeqCst);
    }

    pub fn fail_all_upserts(&self) {
        self.fail_next_upserts(usize::MAX);
    }

    pub fn recover(&self) {
        self.failing_upserts.store(0, Ordering::SeqCst);
        self.fail_deletes.store(false, Ordering::SeqCst);
        self.fail_queries.store(false, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub async fn vector_count(&self) -> u64 {
        self.inner.count().await.unwrap().unwrap()
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.failing_upserts.store(remaining - 1, Ordering::SeqCst);
            }
            bail!("index unavailable");
        }
        self.inner.upsert(records).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            bail!("index unavailable");
        }
        self.inner.query(vector, top_k).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("index unavailable");
        }
        self.inner.delete(ids).await
    }

    async fn count(&self) -> Result<Option<u64>> {
        self.inner.count().await
    }
}

/// The real SQLite store with switchable faults.
pub struct FaultyStore {
    pub inner: SqliteMemoryStore,
    pub fail_projects: AtomicBool,
    /// Delete the memory just before its outbox entry is cleared, as a
    /// concurrent rollback would.
    pub vanish_before_mark: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteMemoryStore::new(db::open_memory_database().unwrap()),
            fail_projects: AtomicBool::new(false),
            vanish_before_mark: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MemoryStore for FaultyStore {
    async fn insert_memory(&self, new: NewMemory) -> Result<Memory> {
        self.inner.insert_memory(new).await
    }
    async fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        self.inner.get_memory(id).await
    }
    async fn list_memories(&self, limit: usize) -> Result<Vec<Memory>> {
        self.inner.list_memories(limit).await
    }
    async fn delete_memory(&self, id: &str) -> Result<bool> {
        self.inner.delete_memory(id).await
    }
    async fn mark_indexed(&self, id: &str) -> Result<bool> {
        if self.vanish_before_mark.load(Ordering::SeqCst) {
            self.inner.delete_memory(id).await?;
        }
        self.inner.mark_indexed(id).await
    }
    async fn record_index_failure(&self, id: &str, attempt: IndexAttempt, error: &str) -> Result<()> {
        self.inner.record_index_failure(id, attempt, error).await
    }
    async fn pending_index(&self, enqueued_before: i64, limit: usize) -> Result<Vec<PendingIndex>> {
        self.inner.pending_index(enqueued_before, limit).await
    }
    async fn list_projects(&self) -> Result<Vec<Project>> {
        if self.fail_projects.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        self.inner.list_projects().await
    }
    async fn add_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        self.inner.add_project(name, description).await
    }
}

/// Everything a pipeline test needs to poke at.
pub struct Harness {
    pub pipeline: Arc<MemoryPipeline>,
    pub store: Arc<FaultyStore>,
    pub index: Arc<FlakyIndex>,
    pub embedder: Arc<TestEmbedder>,
}

impl Harness {
    pub fn tools(&self) -> LoopTools {
        LoopTools::new(Arc::clone(&self.pipeline), Arc::new(LoopConfig::default()))
    }

    /// Number of rows in a relational table.
    pub fn count_rows(&self, table: &str) -> i64 {
        let conn = self.store.inner.connection();
        let conn = conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }
}

pub fn test_options(policy: ReconcilePolicy) -> PipelineOptions {
    PipelineOptions {
        on_index_failure: policy,
        upsert_retry: RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        default_limit: 5,
        max_limit: 100,
    }
}

pub fn harness(policy: ReconcilePolicy) -> Harness {
    let store = Arc::new(FaultyStore::new());
    let index = Arc::new(FlakyIndex::new());
    let embedder = Arc::new(TestEmbedder::default());
    let pipeline = Arc::new(MemoryPipeline::new(
        embedder.clone(),
        store.clone(),
        index.clone(),
        test_options(policy),
    ));
    Harness {
        pipeline,
        store,
        index,
        embedder,
    }
}
