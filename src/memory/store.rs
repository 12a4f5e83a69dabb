//! Relational store: memories, the pending-index outbox, projects, and the
//! audit log.
//!
//! The sync functions operate on a `rusqlite::Connection` and are what the
//! tests exercise directly. [`SqliteMemoryStore`] wraps them behind the async
//! [`MemoryStore`] trait, running each call on the blocking pool.
//!
//! Inserting a memory writes its outbox row in the same transaction, so a
//! memory can never exist without either a confirmed vector or a pending entry.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::memory::types::{IndexAttempt, Memory, Metadata, NewMemory, PendingIndex, Project};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a memory together with its pending-index entry.
    async fn insert_memory(&self, new: NewMemory) -> Result<Memory>;

    async fn get_memory(&self, id: &str) -> Result<Option<Memory>>;

    /// Newest first.
    async fn list_memories(&self, limit: usize) -> Result<Vec<Memory>>;

    /// Remove a memory and its outbox entry. Returns `false` if it did not exist.
    async fn delete_memory(&self, id: &str) -> Result<bool>;

    /// Clear the outbox entry for a memory. Returns `false` if the memory no
    /// longer exists.
    async fn mark_indexed(&self, id: &str) -> Result<bool>;

    /// Bump the attempt count and remember why indexing failed.
    async fn record_index_failure(&self, id: &str, attempt: IndexAttempt, error: &str) -> Result<()>;

    /// Outbox entries enqueued at or before `enqueued_before` (unix millis), oldest first.
    async fn pending_index(&self, enqueued_before: i64, limit: usize) -> Result<Vec<PendingIndex>>;

    /// Projects ordered by name.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn add_project(&self, name: &str, description: Option<&str>) -> Result<Project>;
}

#[derive(Clone)]
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Shared connection handle, for callers that need raw access (doctor, migrations).
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn insert_memory(&self, new: NewMemory) -> Result<Memory> {
        db::run_blocking(&self.conn, move |conn| insert_memory(conn, &new)).await
    }

    async fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        let id = id.to_string();
        db::run_blocking(&self.conn, move |conn| get_memory(conn, &id)).await
    }

    async fn list_memories(&self, limit: usize) -> Result<Vec<Memory>> {
        db::run_blocking(&self.conn, move |conn| list_memories(conn, limit)).await
    }

    async fn delete_memory(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        db::run_blocking(&self.conn, move |conn| delete_memory(conn, &id)).await
    }

    async fn mark_indexed(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        db::run_blocking(&self.conn, move |conn| mark_indexed(conn, &id)).await
    }

    async fn record_index_failure(&self, id: &str, attempt: IndexAttempt, error: &str) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        db::run_blocking(&self.conn, move |conn| record_index_failure(conn, &id, attempt, &error))
            .await
    }

    async fn pending_index(&self, enqueued_before: i64, limit: usize) -> Result<Vec<PendingIndex>> {
        db::run_blocking(&self.conn, move |conn| pending_index(conn, enqueued_before, limit)).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        db::run_blocking(&self.conn, |conn| list_projects(conn)).await
    }

    async fn add_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let name = name.to_string();
        let description = description.map(String::from);
        db::run_blocking(&self.conn, move |conn| {
            add_project(conn, &name, description.as_deref())
        })
        .await
    }
}

/// Insert a memory row, its outbox entry, and a `create` audit record atomically.
pub fn insert_memory(conn: &mut Connection, new: &NewMemory) -> Result<Memory> {
    if new.content.trim().is_empty() {
        bail!("content must not be empty");
    }

    let memory = Memory {
        id: uuid::Uuid::now_v7().to_string(),
        content: new.content.clone(),
        metadata: new.metadata.clone(),
        created_at: timestamp(),
    };
    let metadata_json = memory
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, content, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![memory.id, memory.content, metadata_json, memory.created_at],
    )
    .context("insert memory")?;
    tx.execute(
        "INSERT INTO pending_index (memory_id, enqueued_at, attempts) VALUES (?1, ?2, 0)",
        params![memory.id, now_millis()],
    )
    .context("enqueue index write")?;
    write_audit_log(&tx, "create", &memory.id, None)?;
    tx.commit()?;

    Ok(memory)
}

pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<Memory>> {
    conn.query_row(
        "SELECT id, content, metadata, created_at FROM memories WHERE id = ?1",
        params![id],
        row_to_memory,
    )
    .optional()
    .context("load memory")
}

pub fn list_memories(conn: &Connection, limit: usize) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, metadata, created_at FROM memories \
         ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;
    let memories = stmt
        .query_map(params![limit as i64], row_to_memory)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(memories)
}

/// Compensating delete for a failed ingestion.
pub fn delete_memory(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM pending_index WHERE memory_id = ?1", params![id])?;
    let rows = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
    if rows > 0 {
        write_audit_log(&tx, "rollback", id, None)?;
    }
    tx.commit()?;
    Ok(rows > 0)
}

pub fn mark_indexed(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM memories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let cleared = tx.execute("DELETE FROM pending_index WHERE memory_id = ?1", params![id])?;
    if exists && cleared > 0 {
        write_audit_log(&tx, "index", id, None)?;
    }
    tx.commit()?;
    Ok(exists)
}

pub fn record_index_failure(
    conn: &Connection,
    id: &str,
    attempt: IndexAttempt,
    error: &str,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE pending_index SET attempts = attempts + 1, last_error = ?1 WHERE memory_id = ?2",
        params![error, id],
    )?;
    if rows == 0 {
        bail!("no pending index entry for memory {id}");
    }
    write_audit_log(
        conn,
        attempt.audit_operation(),
        id,
        Some(&serde_json::json!({ "error": error })),
    )?;
    Ok(())
}

pub fn pending_index(conn: &Connection, enqueued_before: i64, limit: usize) -> Result<Vec<PendingIndex>> {
    let mut stmt = conn.prepare(
        "SELECT memory_id, enqueued_at, attempts, last_error FROM pending_index \
         WHERE enqueued_at <= ?1 ORDER BY enqueued_at, memory_id LIMIT ?2",
    )?;
    let entries = stmt
        .query_map(params![enqueued_before, limit as i64], |row| {
            Ok(PendingIndex {
                memory_id: row.get(0)?,
                enqueued_at: row.get(1)?,
                attempts: row.get(2)?,
                last_error: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn
        .prepare("SELECT id, name, description, created_at FROM projects ORDER BY name")
        .context("query projects")?;
    let projects = stmt
        .query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

pub fn add_project(conn: &Connection, name: &str, description: Option<&str>) -> Result<Project> {
    let name = name.trim();
    if name.is_empty() {
        bail!("project name must not be empty");
    }
    let project = Project {
        id: uuid::Uuid::now_v7().to_string(),
        name: name.to_string(),
        description: description.map(String::from),
        created_at: timestamp(),
    };
    conn.execute(
        "INSERT INTO projects (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![project.id, project.name, project.description, project.created_at],
    )
    .with_context(|| format!("insert project {name}"))?;
    Ok(project)
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let now = timestamp();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, memory_id, details_json, now],
    )?;
    Ok(())
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let metadata: Option<String> = row.get(2)?;
    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        metadata: metadata.and_then(|m| serde_json::from_str::<Metadata>(&m).ok()),
        created_at: row.get(3)?,
    })
}

/// Fixed-width RFC 3339 UTC timestamp, so string order matches time order.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
