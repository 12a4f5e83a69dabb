//! Local vector index backed by sqlite-vec.
//!
//! Lives in its own database file so the relational store and the index can
//! fail independently, just like a hosted index would. Vectors are
//! L2-normalized on the way in and out; the reported score is the cosine
//! similarity recovered from the L2 distance.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{VectorIndex, VectorMatch, VectorRecord};
use crate::db;
use crate::memory::types::Metadata;

pub struct SqliteVecIndex {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

impl SqliteVecIndex {
    /// Open (or create) the index database at `path`.
    pub fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        db::ensure_parent_dir(path)?;
        db::load_sqlite_vec();

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open vector index at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        tracing::info!(path = %path.display(), dimensions, "vector index ready");
        Self::with_connection(conn, dimensions)
    }

    /// In-memory index, used by tests and dry runs.
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        db::load_sqlite_vec();
        let conn = Connection::open_in_memory().context("failed to open in-memory index")?;
        Self::with_connection(conn, dimensions)
    }

    fn with_connection(conn: Connection, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            bail!("vector index dimensions must be positive");
        }
        init_index_schema(&conn, dimensions)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        db::run_blocking(&self.conn, f).await
    }

    fn check_dimensions(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.dimensions {
            bail!(
                "vector has {} dimensions, index expects {}",
                values.len(),
                self.dimensions
            );
        }
        Ok(())
    }
}

fn init_index_schema(conn: &Connection, dimensions: usize) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS vectors USING vec0(
            id TEXT PRIMARY KEY,
            embedding FLOAT[{dimensions}]
        );
        CREATE TABLE IF NOT EXISTS vector_metadata (
            id TEXT PRIMARY KEY,
            metadata TEXT NOT NULL
        );"
    ))
    .context("failed to initialize vector index schema")?;
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteVecIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_dimensions(&record.values)?;
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for record in &records {
                let normalized = normalize(&record.values);
                // vec0 has no upsert; replace by delete + insert
                tx.execute("DELETE FROM vectors WHERE id = ?1", params![record.id])?;
                tx.execute(
                    "INSERT INTO vectors (id, embedding) VALUES (?1, ?2)",
                    params![record.id, embedding_to_bytes(&normalized)],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO vector_metadata (id, metadata) VALUES (?1, ?2)",
                    params![record.id, serde_json::to_string(&record.metadata)?],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        self.check_dimensions(vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let normalized = normalize(vector);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, distance FROM vectors \
                 WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
            )?;
            let hits = stmt
                .query_map(params![embedding_to_bytes(&normalized), top_k as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut matches = Vec::with_capacity(hits.len());
            for (id, distance) in hits {
                let metadata: Option<String> = conn
                    .query_row(
                        "SELECT metadata FROM vector_metadata WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let metadata = metadata
                    .map(|m| serde_json::from_str::<Metadata>(&m))
                    .transpose()?;
                matches.push(VectorMatch {
                    id,
                    score: distance_to_similarity(distance),
                    metadata,
                });
            }
            Ok(matches)
        })
        .await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for id in &ids {
                tx.execute("DELETE FROM vectors WHERE id = ?1", params![id])?;
                tx.execute("DELETE FROM vector_metadata WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM vector_metadata", [], |row| row.get(0))?;
            Ok(Some(n as u64))
        })
        .await
    }
}

/// L2-normalize a vector. Zero vectors are returned unchanged.
fn normalize(values: &[f32]) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter().map(|x| x / norm).collect()
    } else {
        values.to_vec()
    }
}

/// For unit vectors, `|a - b|² = 2 - 2·cos(a, b)`.
fn distance_to_similarity(distance: f64) -> f32 {
    (1.0 - distance * distance / 2.0) as f32
}

/// View an f32 slice as raw bytes for sqlite-vec.
fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
