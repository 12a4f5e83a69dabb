//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait and a Gemini REST implementation.
//! The provider is created via [`create_provider`] from configuration and
//! injected into the pipeline, so tests can substitute a deterministic one.

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;

/// Turns text into a fixed-length vector.
///
/// Implementations return exactly [`EmbeddingProvider::dimensions`] values or
/// an error; they never return an empty vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier, recorded alongside the stored vectors.
    fn model(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Currently only `"gemini"` is supported. Fails if no API key is configured
/// (set `embedding.api_key` or `GEMINI_API_KEY`).
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let provider = gemini::GeminiEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: gemini"),
    }
}
