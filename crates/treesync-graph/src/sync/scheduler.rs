//! Periodic sync of every enabled source.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use treesync_source::SourceRegistry;

use super::{SyncEngine, SyncError};

/// Trigger a run for each enabled source. Returns how many were started.
pub fn trigger_enabled(engine: &SyncEngine, registry: &SourceRegistry) -> usize {
    let mut started = 0;
    for source_id in registry.enabled_ids() {
        match engine.trigger(&source_id) {
            Ok(run_id) => {
                info!(source_id = %source_id, run_id = %run_id, "Scheduled sync started");
                started += 1;
            }
            Err(SyncError::AlreadyRunning(_)) => {
                info!(source_id = %source_id, "Scheduled sync skipped, previous run still active");
            }
            Err(e) => warn!(source_id = %source_id, error = %e, "Scheduled sync not started"),
        }
    }
    started
}

/// Run [`trigger_enabled`] every `every`, first one interval after start.
pub fn spawn_scheduler(
    engine: SyncEngine,
    registry: Arc<SourceRegistry>,
    every: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Sync scheduler started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let started = trigger_enabled(&engine, &registry);
            info!(started, "Scheduled sync tick");
        }
    })
}
