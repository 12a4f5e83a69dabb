use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoopConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    pub search: SearchConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// `stdio` or `http`.
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// `sqlite` (local sqlite-vec file) or `pinecone`.
    pub provider: String,
    pub path: String,
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub namespace: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub on_index_failure: ReconcilePolicy,
    pub upsert_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub reconcile_interval_secs: u64,
    pub reconcile_grace_secs: u64,
    pub reconcile_batch: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub username: String,
    pub role: String,
}

/// What the ingestion pipeline does when the vector upsert fails after the
/// relational write committed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Delete the relational record and report the failure.
    #[default]
    Rollback,
    /// Keep the record queued for re-indexing and report success.
    Defer,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 3002,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_loopmemory_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "text-embedding-004".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: None,
            dimensions: 768,
            timeout_secs: 30,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        let path = default_loopmemory_dir()
            .join("vectors.db")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "sqlite".into(),
            path,
            host: None,
            api_key: None,
            namespace: None,
            timeout_secs: 30,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            on_index_failure: ReconcilePolicy::Rollback,
            upsert_attempts: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            reconcile_interval_secs: 300,
            reconcile_grace_secs: 180,
            reconcile_batch: 50,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 100,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username: "User".into(),
            role: "admin".into(),
        }
    }
}

/// Returns `~/.loopmemory/`
pub fn default_loopmemory_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".loopmemory")
}

/// Returns the default config file path: `~/.loopmemory/config.toml`
pub fn default_config_path() -> PathBuf {
    default_loopmemory_dir().join("config.toml")
}

impl LoopConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LoopConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOOPMEMORY_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LOOPMEMORY_VECTORS") {
            self.index.path = val;
        }
        if let Ok(val) = std::env::var("LOOPMEMORY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("LOOPMEMORY_TRANSPORT") {
            self.server.transport = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring unparseable PORT"),
            }
        }
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.embedding.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("PINECONE_API_KEY") {
            self.index.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("PINECONE_HOST") {
            self.index.host = Some(val);
        }
    }

    /// Resolve the relational database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the local vector index path, expanding `~` if needed.
    pub fn resolved_index_path(&self) -> PathBuf {
        expand_tilde(&self.index.path)
    }

    /// Longest an ingestion can hold an outbox entry of its own: every upsert
    /// attempt and the compensating delete may each run to the index timeout,
    /// plus the backoff sleeps and the relational rollback.
    pub fn ingest_index_window(&self) -> Duration {
        let retry = crate::memory::retry::RetryPolicy::from(&self.ingest);
        let index_calls = retry.attempts.max(1) + 1;
        Duration::from_secs(self.index.timeout_secs).saturating_mul(index_calls)
            + retry.total_delay()
            + STORE_BUSY_TIMEOUT
    }

    /// Reconciler grace period, never shorter than [`Self::ingest_index_window`]
    /// so the reconciler cannot pick up an ingestion that is still running.
    pub fn reconcile_grace(&self) -> Duration {
        let configured = Duration::from_secs(self.ingest.reconcile_grace_secs);
        let window = self.ingest_index_window();
        if configured < window {
            tracing::warn!(
                configured_secs = self.ingest.reconcile_grace_secs,
                effective_secs = window.as_secs_f64().ceil() as u64,
                "reconcile_grace_secs is shorter than an ingestion's index window, raising it"
            );
            return window;
        }
        configured
    }
}

/// Matches the `busy_timeout` set on every relational connection.
const STORE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
