//! Status store interface and its in-process implementation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

use super::model::{RunOutcome, SyncRun};

/// Owns run status per source identifier.
///
/// Implementations carry their own locking; callers share them behind `Arc`.
pub trait StatusStore: Send + Sync {
    /// Mark a run as in progress.
    fn begin(&self, source_id: &str, run_id: Uuid);

    /// Record a terminal outcome and prepend it to the history.
    fn complete(&self, source_id: &str, outcome: RunOutcome);

    /// Snapshot for a source; `Idle` if it never ran.
    fn get(&self, source_id: &str) -> SyncRun;
}

/// Process-memory status store. History is lost on restart.
#[derive(Default)]
pub struct InMemoryStatusStore {
    runs: Mutex<HashMap<String, SyncRun>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for InMemoryStatusStore {
    fn begin(&self, source_id: &str, run_id: Uuid) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.entry(source_id.to_string()).or_default().begin(run_id);
    }

    fn complete(&self, source_id: &str, outcome: RunOutcome) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let run = runs.entry(source_id.to_string()).or_default();
        run.complete(&outcome);
        info!(
            source_id,
            status = run.status.as_str(),
            duration_ms = outcome.duration_ms(),
            "Sync status updated"
        );
    }

    fn get(&self, source_id: &str) -> SyncRun {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.get(source_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::RunStatus;
    use std::sync::Arc;

    #[test]
    fn test_unknown_source_is_idle() {
        let store = InMemoryStatusStore::new();
        let run = store.get("never-ran");
        assert_eq!(run.status, RunStatus::Idle);
        assert!(run.history.is_empty());
        assert!(run.last_run_at.is_none());
    }

    #[test]
    fn test_begin_then_complete() {
        let store = InMemoryStatusStore::new();
        let run_id = Uuid::new_v4();
        store.begin("plant-a", run_id);
        assert_eq!(store.get("plant-a").status, RunStatus::InProgress);
        assert_eq!(store.get("plant-a").run_id, Some(run_id));

        store.complete(
            "plant-a",
            RunOutcome::Success {
                message: "6 nodes, 5 edges".into(),
                duration_ms: 40,
            },
        );
        let run = store.get("plant-a");
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.history.len(), 1);
        assert_eq!(run.history[0].duration_ms, Some(40));
        assert_eq!(store.get("plant-b").status, RunStatus::Idle);
    }

    #[test]
    fn test_concurrent_writers_keep_history_capped() {
        let store = Arc::new(InMemoryStatusStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let id = format!("src-{}", t % 2);
                        store.begin(&id, Uuid::new_v4());
                        store.complete(
                            &id,
                            RunOutcome::Success {
                                message: format!("{}-{}", t, i),
                                duration_ms: 1,
                            },
                        );
                        let _ = store.get(&id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("src-0").history.len(), 20);
        assert_eq!(store.get("src-1").history.len(), 20);
    }
}
