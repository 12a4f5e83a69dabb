use anyhow::Result;

use crate::config::LoopConfig;

/// Run a semantic search from the terminal.
pub async fn search(config: &LoopConfig, query: &str, limit: Option<i64>) -> Result<()> {
    let pipeline = crate::server::build_pipeline(config)?;
    let results = pipeline.search(query, limit).await?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("  {}. {} (score: {:.4})", i + 1, result.id, result.score);
        println!(
            "     {}",
            super::preview(result.content.as_deref().unwrap_or("(no content)"), 120)
        );
        println!();
    }

    Ok(())
}
