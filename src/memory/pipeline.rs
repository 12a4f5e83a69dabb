use std::sync::Arc;

use crate::config::{LoopConfig, ReconcilePolicy};
use crate::embedding::EmbeddingProvider;
use crate::error::MemoryError;
use crate::index::{VectorIndex, VectorRecord};
use crate::memory::retry::RetryPolicy;
use crate::memory::store::MemoryStore;
use crate::memory::types::{Memory, Project};

/// Knobs for the pipeline, usually taken from [`LoopConfig`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub on_index_failure: ReconcilePolicy,
    pub upsert_retry: RetryPolicy,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&LoopConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &LoopConfig) -> Self {
        Self {
            on_index_failure: config.ingest.on_index_failure,
            upsert_retry: RetryPolicy::from(&config.ingest),
            default_limit: config.search.default_limit,
            max_limit: config.search.max_limit,
        }
    }
}

/// The dual-write memory pipeline. All dependencies are injected, so each
/// can be swapped for a test double.
pub struct MemoryPipeline {
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) store: Arc<dyn MemoryStore>,
    pub(crate) index: Arc<dyn VectorIndex>,
    pub(crate) options: PipelineOptions,
}

impl MemoryPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn MemoryStore>,
        index: Arc<dyn VectorIndex>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            index,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Most recent memories, newest first.
    pub async fn list_memories(&self, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        self.store
            .list_memories(limit)
            .await
            .map_err(MemoryError::persistence)
    }

    /// All projects. Store failures are reported, never turned into an empty list.
    pub async fn list_projects(&self) -> Result<Vec<Project>, MemoryError> {
        self.store
            .list_projects()
            .await
            .map_err(MemoryError::persistence)
    }

    pub async fn add_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, MemoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MemoryError::Validation("project name must not be empty".into()));
        }
        self.store
            .add_project(name, description)
            .await
            .map_err(MemoryError::persistence)
    }
}

/// Index payload for a memory: its metadata with `content` added so search
/// results can be rendered without a relational lookup.
pub(crate) fn vector_record(memory: &Memory, values: Vec<f32>) -> VectorRecord {
    let mut metadata = memory.metadata.clone().unwrap_or_default();
    metadata.insert(
        "content".into(),
        serde_json::Value::String(memory.content.clone()),
    );
    VectorRecord {
        id: memory.id.clone(),
        values,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vector_record_copies_content_into_metadata() {
        let mut metadata = crate::memory::types::Metadata::new();
        metadata.insert("type".into(), json!("note"));
        metadata.insert("content".into(), json!("stale"));
        let memory = Memory {
            id: "m1".into(),
            content: "fresh".into(),
            metadata: Some(metadata),
            created_at: "2026-01-01T00:00:00.000000Z".into(),
        };

        let record = vector_record(&memory, vec![0.5; 3]);
        assert_eq!(record.id, "m1");
        assert_eq!(record.metadata["type"], json!("note"));
        assert_eq!(record.metadata["content"], json!("fresh"));
    }

    #[test]
    fn options_follow_config() {
        let mut config = LoopConfig::default();
        config.ingest.on_index_failure = ReconcilePolicy::Defer;
        config.ingest.upsert_attempts = 7;
        config.search.max_limit = 20;

        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.on_index_failure, ReconcilePolicy::Defer);
        assert_eq!(options.upsert_retry.attempts, 7);
        assert_eq!(options.max_limit, 20);
        assert_eq!(options.default_limit, 5);
    }
}
