//! Semantic memory for AI agents, served over MCP.
//!
//! Loopmemory is an [MCP](https://modelcontextprotocol.io/) server with four
//! tools: `addMemory`, `search`, `whoAmI`, and `getProjects`. Every memory is
//! written twice: once to a relational SQLite store (the source of truth) and
//! once, as an embedding, to a vector index used for semantic search.
//!
//! # Architecture
//!
//! - **Storage**: SQLite for memories, projects, the audit log, and a
//!   pending-index outbox
//! - **Embeddings**: Google Gemini `embedContent` (768 dimensions by default)
//! - **Vector index**: local [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   file or Pinecone
//! - **Consistency**: failed vector writes are rolled back or deferred to a
//!   background reconciler, so no memory stays unsearchable unnoticed
//! - **Transport**: MCP over stdio, or streamable HTTP plus a small REST API
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`logging`]: tracing subscriber setup
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: text-to-vector providers
//! - [`index`]: vector index backends
//! - [`memory`]: the ingestion, search, and reconcile pipeline
//! - [`tools`]: the MCP tool handler
//! - [`api`]: REST routes for HTTP mode

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod logging;
pub mod memory;
pub mod server;
pub mod tools;
