//! Pinecone REST data-plane client.
//!
//! Talks to an index host (`https://<index>-<project>.svc.<env>.pinecone.io`)
//! with the `Api-Key` header. Pinecone only accepts flat metadata values
//! (strings, numbers, booleans, lists of strings); nested objects are
//! rejected by the service and surface as upsert errors.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{VectorIndex, VectorMatch, VectorRecord};
use crate::config::IndexConfig;

const API_VERSION: &str = "2024-07";

pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: Option<u64>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("Pinecone index needs a host (PINECONE_HOST)"))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("Pinecone index needs an API key (PINECONE_API_KEY)"))?;

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            namespace: config.namespace.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = format!("{}{path}", self.host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Pinecone request to {path} failed"))?;

        let status = response.status();
        let text = response.text().await.context("failed to read Pinecone response")?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            bail!("Pinecone {path} returned HTTP {status}: {message}");
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text).with_context(|| format!("invalid JSON from Pinecone {path}"))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let body = UpsertRequest {
            vectors: &records,
            namespace: self.namespace.as_deref(),
        };
        self.post("/vectors/upsert", &body).await?;
        tracing::debug!(count = records.len(), "pinecone upsert");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }
        let value = self.post("/query", &body).await?;
        let parsed: QueryResponse =
            serde_json::from_value(value).context("unexpected Pinecone query response")?;
        Ok(parsed.matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut body = json!({ "ids": ids });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }
        self.post("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn count(&self) -> Result<Option<u64>> {
        let value = self.post("/describe_index_stats", &json!({})).await?;
        let stats: StatsResponse =
            serde_json::from_value(value).context("unexpected Pinecone stats response")?;
        Ok(stats.total_vector_count)
    }
}
