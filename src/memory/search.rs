//! Read path: embed the query, ask the vector index for the nearest
//! neighbors, and project the hits into [`SearchResult`]s.

use crate::error::MemoryError;
use crate::memory::pipeline::MemoryPipeline;
use crate::memory::types::SearchResult;

impl MemoryPipeline {
    /// Semantic search. `limit` defaults to the configured default and must be
    /// within `1..=max_limit`. Results are ordered by non-increasing score.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        if query.trim().is_empty() {
            return Err(MemoryError::Validation("query must not be empty".into()));
        }
        let limit = self.resolve_limit(limit)?;

        tracing::info!(query_len = query.len(), limit, "search called");

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(MemoryError::embedding)?;

        let matches = self
            .index
            .query(&embedding, limit)
            .await
            .map_err(|e| MemoryError::IndexQuery(format!("{e:#}")))?;

        let mut results: Vec<SearchResult> = matches
            .into_iter()
            .map(|m| SearchResult {
                content: m
                    .metadata
                    .as_ref()
                    .and_then(|md| md.get("content"))
                    .and_then(|c| c.as_str())
                    .map(String::from),
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);

        tracing::debug!(returned = results.len(), "search complete");
        Ok(results)
    }

    fn resolve_limit(&self, limit: Option<i64>) -> Result<usize, MemoryError> {
        let max = self.options.max_limit;
        match limit {
            None => Ok(self.options.default_limit.clamp(1, max.max(1))),
            Some(n) if n >= 1 && (n as u64) <= max as u64 => Ok(n as usize),
            Some(n) => Err(MemoryError::Validation(format!(
                "limit must be between 1 and {max}, got {n}"
            ))),
        }
    }
}
