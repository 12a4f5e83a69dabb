//! REST surface served next to the MCP endpoint in HTTP mode.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::MemoryError;
use crate::memory::types::Metadata;
use crate::memory::MemoryPipeline;
use crate::tools::LoopTools;

const SERVICE_NAME: &str = "loopmemory-mcp";
const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<MemoryPipeline>,
    pub tools: LoopTools,
}

impl MemoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnknownTool(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmbeddingProvider(_) | Self::IndexWrite(_) | Self::IndexQuery(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for MemoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

/// Routes for `/health` and `/api/*`. The MCP service and HTTP layers are
/// attached by the server.
pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/memories", get(list_memories).post(create_memory))
        .route("/api/projects", get(list_projects))
        .route("/api/tools/{name}", post(call_tool))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_memories(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, MemoryError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let memories = state.pipeline.list_memories(limit).await?;
    Ok(Json(json!(memories)))
}

#[derive(Debug, Deserialize)]
struct CreateMemoryRequest {
    #[serde(default)]
    content: String,
    metadata: Option<Metadata>,
}

async fn create_memory(
    State(state): State<ApiState>,
    payload: Result<Json<CreateMemoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), MemoryError> {
    let Json(payload) =
        payload.map_err(|rejection| MemoryError::Validation(rejection.body_text()))?;
    let ingested = state
        .pipeline
        .add_memory(payload.content, payload.metadata)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "memory": ingested.memory,
            "indexed": ingested.indexed,
        })),
    ))
}

async fn list_projects(State(state): State<ApiState>) -> Result<Json<Value>, MemoryError> {
    let projects = state.pipeline.list_projects().await?;
    Ok(Json(json!(projects)))
}

async fn call_tool(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, MemoryError> {
    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| MemoryError::Validation(format!("invalid JSON body: {e}")))?
    };
    let result = state.tools.dispatch(&name, arguments).await?;
    Ok(Json(result))
}
