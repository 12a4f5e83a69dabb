//! CLI `doctor` command: database diagnostics and a health report.

use anyhow::{Context, Result};

use crate::config::LoopConfig;
use crate::db;
use crate::index;

/// Run diagnostics on the relational store and the vector index.
pub async fn doctor(config: &LoopConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `loopmemory serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Loopmemory Health Report");
    println!("========================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Configured:      {} ({} dims)",
        config.embedding.model, config.embedding.dimensions
    );
    if let (Some(stored), Some(dims)) = (&report.embedding_model, report.embedding_dimensions) {
        if stored != &config.embedding.model || dims != config.embedding.dimensions {
            println!("  WARNING: model mismatch, search quality will suffer.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Projects:        {}", report.project_count);
    println!("  Pending index:   {}", report.pending_index_count);
    println!("  Audit log:       {}", report.log_count);
    println!();

    match index::create_index(config) {
        Ok(index) => match index.count().await {
            Ok(Some(n)) => println!("Vector index:      {} ({n} vectors)", config.index.provider),
            Ok(None) => println!("Vector index:      {} (reachable)", config.index.provider),
            Err(err) => println!("Vector index:      {} UNREACHABLE ({err:#})", config.index.provider),
        },
        Err(err) => println!("Vector index:      misconfigured ({err:#})"),
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore ~/.loopmemory/memory.db from a backup.");
    }

    if report.pending_index_count > 0 {
        println!();
        println!(
            "{} memories await indexing. Run `loopmemory reconcile`.",
            report.pending_index_count
        );
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
