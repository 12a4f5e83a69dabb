//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`]. Also records which
//! embedding model (and vector width) the stored memories were indexed with.

use rusqlite::Connection;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// The embedding model and dimension count recorded for this database, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<(String, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT key, value FROM schema_meta WHERE key IN ('embedding_model', 'embedding_dimensions')",
    )?;
    let mut model = None;
    let mut dims = None;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            "embedding_model" => model = Some(value),
            _ => dims = value.parse::<usize>().ok(),
        }
    }
    Ok(model.zip(dims))
}

/// Record the embedding model and dimension count used to index memories.
pub fn set_embedding_model(conn: &Connection, model: &str, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_dimensions', ?1)",
        [dimensions.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations, each inside its own transaction.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: index the outbox by age so the reconciler scan stays cheap.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pending_enqueued ON pending_index(enqueued_at)",
        [],
    )?;
    Ok(())
}

/// Migration v2 → v3: allow `retry` audit entries. SQLite cannot alter a
/// CHECK constraint, so the log table is rebuilt.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE memory_log_v3 (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            operation TEXT NOT NULL CHECK(operation IN ('create','index','rollback','defer','retry')),
            memory_id TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL
        );
        INSERT INTO memory_log_v3 (id, operation, memory_id, details, created_at)
            SELECT id, operation, memory_id, details, created_at FROM memory_log;
        DROP TABLE memory_log;
        ALTER TABLE memory_log_v3 RENAME TO memory_log;
        "#,
    )
}
