use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::repository::RepoError;
use crate::store::Store;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the store's log once `threshold` appends have accumulated.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(store: &Store, threshold: u64) -> Result<bool, RepoError> {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    store.compact().await?;
    info!("log compacted after {appends} appends");
    Ok(true)
}

/// Background task: check the log size every 30 seconds.
pub async fn run_compactor(store: Arc<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&store, threshold).await {
            error!("compaction failed: {e}");
        }
    }
}
