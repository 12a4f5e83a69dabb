//! Vector index: nearest-neighbor search keyed by memory id.
//!
//! [`VectorIndex`] is the seam between the ingestion pipeline and the index
//! backend. Two backends exist: a local sqlite-vec database ([`sqlite`]) and
//! Pinecone's REST data plane ([`pinecone`]). Upserts are idempotent on id, so
//! callers may retry them freely.

pub mod pinecone;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::types::Metadata;

/// One vector to write.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    /// Similarity, higher is closer. Scale is backend-defined.
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the given records.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Top-`top_k` matches for `vector`, metadata included.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Remove the given ids. Missing ids are not an error.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Number of stored vectors, when the backend can tell cheaply.
    async fn count(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Create the configured vector index.
pub fn create_index(
    config: &crate::config::LoopConfig,
) -> Result<Box<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "sqlite" => {
            let index = sqlite::SqliteVecIndex::open(
                config.resolved_index_path(),
                config.embedding.dimensions,
            )?;
            Ok(Box::new(index))
        }
        "pinecone" => {
            let index = pinecone::PineconeIndex::new(&config.index)?;
            Ok(Box::new(index))
        }
        other => anyhow::bail!("unknown vector index provider: {other}. Supported: sqlite, pinecone"),
    }
}
