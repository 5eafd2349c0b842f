use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the journal once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&engine, threshold).await {
            // Contention or a journal hiccup; try again next tick.
            warn!("compaction skipped: {e}");
        }
    }
}

/// Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> Result<bool, crate::engine::EngineError> {
    let appends = engine.journal_appends_since_compact().await?;
    if appends < threshold {
        debug!(appends, threshold, "journal below compaction threshold");
        return Ok(false);
    }
    info!(appends, "compacting journal");
    engine.compact_journal().await?;
    Ok(true)
}
