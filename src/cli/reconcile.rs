use std::time::Duration;

use anyhow::Result;

use crate::config::LoopConfig;

/// Re-index pending memories. `now` skips the grace period, which is only
/// safe while no server is ingesting into the same database.
pub async fn reconcile(config: &LoopConfig, limit: usize, now: bool) -> Result<()> {
    let pipeline = crate::server::build_pipeline(config)?;
    let grace = if now { Duration::ZERO } else { config.reconcile_grace() };
    let report = pipeline.reconcile(grace, limit).await?;

    println!("Scanned:   {}", report.scanned);
    println!("Indexed:   {}", report.indexed);
    println!("Dropped:   {}", report.dropped);
    println!("Failed:    {}", report.failed);

    if report.failed > 0 {
        println!();
        println!("Some memories are still pending. Check the vector index and run again.");
    }
    Ok(())
}
