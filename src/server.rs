//! Server initialization for the stdio and HTTP transports.
//!
//! [`build_pipeline`] wires the relational store, vector index, and embedding
//! provider together; [`serve_stdio`] and [`serve_http`] put the tool handler
//! on a transport and start the background reconciler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{self, ApiState};
use crate::config::LoopConfig;
use crate::db;
use crate::embedding;
use crate::index;
use crate::memory::reconcile::spawn_reconciler;
use crate::memory::store::SqliteMemoryStore;
use crate::memory::{MemoryPipeline, PipelineOptions};
use crate::tools::LoopTools;

/// Open the store and index, create the embedding provider, and assemble the
/// pipeline.
pub fn build_pipeline(config: &LoopConfig) -> Result<Arc<MemoryPipeline>> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    match db::migrations::get_embedding_model(&conn)? {
        Some((model, dims))
            if model != config.embedding.model || dims != config.embedding.dimensions =>
        {
            tracing::warn!(
                stored_model = %model,
                stored_dimensions = dims,
                configured_model = %config.embedding.model,
                configured_dimensions = config.embedding.dimensions,
                "embedding model changed; existing vectors were produced by a different model"
            );
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(
            &conn,
            &config.embedding.model,
            config.embedding.dimensions,
        )?,
    }

    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    tracing::info!(model = embedder.model(), "embedding provider ready");

    let index: Arc<dyn index::VectorIndex> = Arc::from(index::create_index(config)?);
    tracing::info!(provider = %config.index.provider, "vector index ready");

    let store = Arc::new(SqliteMemoryStore::new(conn));

    Ok(Arc::new(MemoryPipeline::new(
        embedder,
        store,
        index,
        PipelineOptions::from_config(config),
    )))
}

/// Start the periodic reconciler unless the interval is zero.
fn start_reconciler(pipeline: &Arc<MemoryPipeline>, config: &LoopConfig) {
    let ingest = &config.ingest;
    if ingest.reconcile_interval_secs == 0 {
        tracing::info!("background reconciler disabled");
        return;
    }
    let grace = config.reconcile_grace();
    spawn_reconciler(
        Arc::clone(pipeline),
        Duration::from_secs(ingest.reconcile_interval_secs),
        grace,
        ingest.reconcile_batch,
    );
    tracing::info!(
        interval_secs = ingest.reconcile_interval_secs,
        grace_secs = grace.as_secs(),
        "background reconciler started"
    );
}

/// Dispatch to the transport named in config.
pub async fn serve(config: LoopConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "stdio" => serve_stdio(config).await,
        "http" => serve_http(config).await,
        other => anyhow::bail!("unknown transport: {other}. Supported: stdio, http"),
    }
}

/// Start the MCP server over stdio.
pub async fn serve_stdio(config: LoopConfig) -> Result<()> {
    tracing::info!("starting Loopmemory MCP server on stdio");

    let pipeline = build_pipeline(&config)?;
    start_reconciler(&pipeline, &config);

    let tools = LoopTools::new(pipeline, Arc::new(config));
    let server = tools
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start stdio transport")?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");
    Ok(())
}

/// Start the MCP streamable HTTP endpoint at `/mcp` plus the REST API.
pub async fn serve_http(config: LoopConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting Loopmemory server on HTTP");

    let pipeline = build_pipeline(&config)?;
    start_reconciler(&pipeline, &config);

    let tools = LoopTools::new(Arc::clone(&pipeline), Arc::new(config));
    let mcp_tools = tools.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(mcp_tools.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = api::routes(ApiState { pipeline, tools })
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP endpoint at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
