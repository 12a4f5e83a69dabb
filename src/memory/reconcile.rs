//! Background completion of vector writes left pending by crashes, deferred
//! ingestions, or failed rollbacks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::MemoryError;
use crate::memory::pipeline::{vector_record, MemoryPipeline};
use crate::memory::retry::retry;
use crate::memory::store::now_millis;
use crate::memory::types::IndexAttempt;

/// Outcome of one reconcile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub indexed: usize,
    /// Entries whose memory vanished (rolled back) before or during the pass.
    pub dropped: usize,
    pub failed: usize,
}

impl MemoryPipeline {
    /// Re-index up to `limit` pending memories enqueued at least `older_than` ago.
    ///
    /// The age cutoff keeps the pass from racing ingestions that are still in
    /// flight.
    pub async fn reconcile(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<ReconcileReport, MemoryError> {
        let cutoff = now_millis().saturating_sub(older_than.as_millis() as i64);
        let pending = self
            .store
            .pending_index(cutoff, limit)
            .await
            .map_err(MemoryError::persistence)?;

        let mut report = ReconcileReport {
            scanned: pending.len(),
            ..Default::default()
        };

        for entry in pending {
            match self.reindex(&entry.memory_id).await {
                Ok(true) => report.indexed += 1,
                Ok(false) => report.dropped += 1,
                Err(err) => {
                    report.failed += 1;
                    let reason = format!("{err:#}");
                    tracing::warn!(
                        id = %entry.memory_id,
                        attempts = entry.attempts + 1,
                        error = %reason,
                        "re-index failed"
                    );
                    if let Err(record_err) = self
                        .store
                        .record_index_failure(&entry.memory_id, IndexAttempt::Reconcile, &reason)
                        .await
                    {
                        tracing::warn!(id = %entry.memory_id, error = %format!("{record_err:#}"), "failed to record index failure");
                    }
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                indexed = report.indexed,
                dropped = report.dropped,
                failed = report.failed,
                "reconcile pass complete"
            );
        }
        Ok(report)
    }

    /// Returns `Ok(false)` when the memory no longer exists.
    async fn reindex(&self, id: &str) -> anyhow::Result<bool> {
        let Some(memory) = self.store.get_memory(id).await? else {
            return Ok(false);
        };

        let embedding = self.embedder.embed(&memory.content).await?;
        let record = vector_record(&memory, embedding);
        retry(&self.options.upsert_retry, "vector re-index", || {
            self.index.upsert(vec![record.clone()])
        })
        .await?;

        if !self.store.mark_indexed(&memory.id).await? {
            // Rolled back while we were writing; take the vector out again.
            self.index.delete(&[memory.id.clone()]).await?;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Run [`MemoryPipeline::reconcile`] now and then every `every`, forever.
pub fn spawn_reconciler(
    pipeline: Arc<MemoryPipeline>,
    every: Duration,
    grace: Duration,
    batch: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = pipeline.reconcile(grace, batch).await {
                tracing::warn!(error = %err, "reconcile pass failed");
            }
        }
    })
}
