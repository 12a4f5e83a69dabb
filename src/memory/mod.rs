//! Memory engine: relational store, ingestion, search, and reconciliation.
//!
//! [`pipeline::MemoryPipeline`] owns the injected embedding provider,
//! relational store, and vector index. Its operations live in [`ingest`],
//! [`search`], and [`reconcile`].

pub mod ingest;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod search;
pub mod store;
pub mod types;

pub use pipeline::{MemoryPipeline, PipelineOptions};
