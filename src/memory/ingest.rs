//! Write path: validate → embed → persist (with outbox) → upsert with retry
//! → reconcile on failure.

use anyhow::Context;

use crate::config::ReconcilePolicy;
use crate::error::MemoryError;
use crate::memory::pipeline::{vector_record, MemoryPipeline};
use crate::memory::retry::retry;
use crate::memory::types::{IndexAttempt, Ingested, Memory, Metadata, NewMemory};

impl MemoryPipeline {
    /// Store a memory in the relational store and the vector index.
    ///
    /// The relational row and its pending-index entry commit together. If the
    /// vector upsert then fails after all retries, the configured
    /// [`ReconcilePolicy`] decides between rolling the row back and leaving
    /// it queued for the reconciler.
    pub async fn add_memory(
        &self,
        content: String,
        metadata: Option<Metadata>,
    ) -> Result<Ingested, MemoryError> {
        if content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }

        tracing::info!(content_len = content.len(), "add_memory called");

        // 1. Embed
        let embedding = self
            .embedder
            .embed(&content)
            .await
            .map_err(MemoryError::embedding)?;

        // 2. Persist row + outbox entry
        let memory = self
            .store
            .insert_memory(NewMemory { content, metadata })
            .await
            .map_err(MemoryError::persistence)?;

        // 3. Upsert into the vector index
        let record = vector_record(&memory, embedding);
        let upserted = retry(&self.options.upsert_retry, "vector upsert", || {
            self.index.upsert(vec![record.clone()])
        })
        .await;

        match upserted {
            Ok(()) => {
                if let Err(err) = self.store.mark_indexed(&memory.id).await {
                    // The reconciler re-upserts; the write itself succeeded.
                    tracing::warn!(id = %memory.id, error = %format!("{err:#}"), "failed to clear pending index entry");
                }
                tracing::info!(id = %memory.id, "memory stored");
                Ok(Ingested {
                    memory,
                    indexed: true,
                })
            }
            Err(err) => self.handle_index_failure(memory, err).await,
        }
    }

    async fn handle_index_failure(
        &self,
        memory: Memory,
        err: anyhow::Error,
    ) -> Result<Ingested, MemoryError> {
        let reason = format!("{err:#}");

        match self.options.on_index_failure {
            ReconcilePolicy::Defer => {
                if let Err(record_err) = self
                    .store
                    .record_index_failure(&memory.id, IndexAttempt::Ingest, &reason)
                    .await
                {
                    tracing::warn!(id = %memory.id, error = %format!("{record_err:#}"), "failed to record index failure");
                }
                tracing::warn!(id = %memory.id, error = %reason, "vector write deferred to reconciler");
                Ok(Ingested {
                    memory,
                    indexed: false,
                })
            }
            ReconcilePolicy::Rollback => match self.compensate(&memory.id).await {
                Ok(()) => {
                    tracing::warn!(id = %memory.id, error = %reason, "vector write failed, memory rolled back");
                    Err(MemoryError::IndexWrite(format!(
                        "{reason} (memory {} rolled back)",
                        memory.id
                    )))
                }
                Err(comp_err) => {
                    // The outbox entry survives, so the reconciler finishes the write.
                    let comp_reason = format!("{comp_err:#}");
                    if let Err(record_err) = self
                    .store
                    .record_index_failure(&memory.id, IndexAttempt::Ingest, &reason)
                    .await
                {
                        tracing::warn!(id = %memory.id, error = %format!("{record_err:#}"), "failed to record index failure");
                    }
                    tracing::error!(
                        id = %memory.id,
                        error = %reason,
                        rollback_error = %comp_reason,
                        "rollback failed, memory queued for re-indexing"
                    );
                    Err(MemoryError::IndexWrite(format!(
                        "{reason} (rollback failed: {comp_reason}; memory {} queued for re-indexing)",
                        memory.id
                    )))
                }
            },
        }
    }

    /// Undo a half-finished ingestion: drop any partial vector, then the row.
    async fn compensate(&self, id: &str) -> anyhow::Result<()> {
        self.index
            .delete(&[id.to_string()])
            .await
            .context("remove partial vector")?;
        self.store
            .delete_memory(id)
            .await
            .context("delete memory row")?;
        Ok(())
    }
}
