//! Run-scoped logging.
//!
//! Every line goes to `tracing` with the source and run ids attached, and is
//! mirrored onto the source's live log channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};
use treesync_core::{LogLevel, SyncLogHub};
use uuid::Uuid;

pub struct RunLogger {
    source_id: String,
    run_id: Uuid,
    hub: SyncLogHub,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl RunLogger {
    pub fn new(source_id: &str, run_id: Uuid, hub: SyncLogHub) -> Self {
        Self {
            source_id: source_id.to_string(),
            run_id,
            hub,
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(source_id = %self.source_id, run_id = %self.run_id, "{}", message);
        self.hub.publish(&self.source_id, LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(source_id = %self.source_id, run_id = %self.run_id, "{}", message);
        self.warnings.fetch_add(1, Ordering::Relaxed);
        self.hub.publish(&self.source_id, LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(source_id = %self.source_id, run_id = %self.run_id, "{}", message);
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.hub.publish(&self.source_id, LogLevel::Error, message);
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_are_counted_and_broadcast() {
        let hub = SyncLogHub::new();
        let mut rx = hub.subscribe("plant");
        let log = RunLogger::new("plant", Uuid::new_v4(), hub);

        log.info("starting");
        log.warn("null key");
        log.error("lookup failed");

        assert_eq!(log.warnings(), 1);
        assert_eq!(log.errors(), 1);
        assert_eq!(rx.recv().await.unwrap().render(), "INFO: starting");
        assert_eq!(rx.recv().await.unwrap().render(), "WARN: null key");
        assert_eq!(rx.recv().await.unwrap().render(), "ERROR: lookup failed");
    }
}
