//! Periodic maintenance running alongside the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeustv_catalog::CatalogService;
use zeustv_sources::neonspor::NeonSporSource;

use crate::bootstrap::Sources;

/// Delay before the first playlist load, so start-up is not blocked on it.
const FIRST_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// Drop expired entries from every in-process cache on a fixed interval.
pub fn spawn_cache_sweep(
    catalog: Arc<CatalogService>,
    sources: Arc<Sources>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = catalog.purge_expired() + sources.purge_expired();
            if removed > 0 {
                debug!(removed, "expired cache entries purged");
            }
        }
    })
}

/// Reload the live playlist on a fixed interval.
pub fn spawn_playlist_refresh(neonspor: Arc<NeonSporSource>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(FIRST_REFRESH_DELAY).await;
        loop {
            match neonspor.refresh().await {
                Ok(channels) => info!(channels, "live playlist loaded"),
                Err(err) => warn!(error = %err, "live playlist refresh failed"),
            }
            tokio::time::sleep(every).await;
        }
    })
}
