//! Google Gemini embedding client (`models/{model}:embedContent`).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

pub struct GeminiEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("Gemini embedding provider needs an API key (GEMINI_API_KEY)"))?;

        if config.dimensions == 0 {
            bail!("embedding.dimensions must be positive");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "outputDimensionality": self.dimensions,
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini embedding request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to read Gemini response body")?;

        let parsed: EmbedResponse = serde_json::from_str(&text).with_context(|| {
            format!("unexpected Gemini response (HTTP {status}): {}", truncate(&text, 200))
        })?;

        if let Some(err) = parsed.error {
            bail!("Gemini API error (HTTP {status}): {}", err.message);
        }
        if !status.is_success() {
            bail!("Gemini API returned HTTP {status}");
        }

        let values = parsed
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| anyhow!("Gemini response contained no embedding"))?;

        if values.len() != self.dimensions {
            bail!(
                "Gemini returned {} dimensions, expected {}",
                values.len(),
                self.dimensions
            );
        }

        tracing::debug!(model = %self.model, dims = values.len(), "embedded text");
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
