//! Record types shared by the store, the index, and the tool layer.

use serde::{Deserialize, Serialize};

/// Open string-keyed JSON mapping attached to a memory.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored note, matching the `memories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7, generated at creation and never changed.
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// RFC 3339 UTC creation timestamp.
    pub created_at: String,
}

/// Input to [`crate::memory::store::MemoryStore::insert_memory`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub metadata: Option<Metadata>,
}

/// Outcome of the ingestion pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub memory: Memory,
    /// `false` when the vector write was deferred to the reconciler.
    pub indexed: bool,
}

/// A read-only projection of a vector index hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    /// Similarity, higher is closer.
    pub score: f32,
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub username: String,
    pub role: String,
}

/// Where a failed vector write happened. Recorded in the audit log so
/// reconciler retries can be told apart from ingestion-time deferrals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAttempt {
    Ingest,
    Reconcile,
}

impl IndexAttempt {
    pub fn audit_operation(self) -> &'static str {
        match self {
            IndexAttempt::Ingest => "defer",
            IndexAttempt::Reconcile => "retry",
        }
    }
}

/// An outbox row: a memory whose vector write is not yet confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingIndex {
    pub memory_id: String,
    /// Unix milliseconds.
    pub enqueued_at: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
}
