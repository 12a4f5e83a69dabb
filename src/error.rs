//! Error kinds surfaced by the memory pipeline and the tool layer.
//!
//! Component traits (embedding provider, relational store, vector index)
//! return `anyhow::Result`; the pipeline maps those failures onto the typed
//! kinds below so callers can tell a bad argument from a dependency outage.

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Malformed tool arguments. Reported to the caller, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("index write error: {0}")]
    IndexWrite(String),

    #[error("index query error: {0}")]
    IndexQuery(String),
}

impl MemoryError {
    /// Stable snake-case code for API payloads and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UnknownTool(_) => "unknown_tool",
            Self::EmbeddingProvider(_) => "embedding_provider_error",
            Self::Persistence(_) => "persistence_error",
            Self::IndexWrite(_) => "index_write_error",
            Self::IndexQuery(_) => "index_query_error",
        }
    }

    pub(crate) fn persistence(err: anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }

    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        Self::EmbeddingProvider(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            MemoryError::Validation(String::new()),
            MemoryError::UnknownTool(String::new()),
            MemoryError::EmbeddingProvider(String::new()),
            MemoryError::Persistence(String::new()),
            MemoryError::IndexWrite(String::new()),
            MemoryError::IndexQuery(String::new()),
        ];
        let mut codes: Vec<_> = errors.iter().map(MemoryError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn anyhow_chain_is_kept_in_message() {
        let err = anyhow::anyhow!("disk full").context("insert memory");
        let mapped = MemoryError::persistence(err);
        assert_eq!(
            mapped.to_string(),
            "persistence error: insert memory: disk full"
        );
    }
}
