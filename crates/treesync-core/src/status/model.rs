//! Run status models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Number of history entries kept per source.
pub const MAX_HISTORY: usize = 20;

/// Longest history message kept, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Lifecycle state of a source's synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    InProgress,
    Success,
    Fail,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Fail)
    }
}

/// One entry of a source's run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub message: String,
    pub duration_ms: Option<u64>,
}

impl SyncEvent {
    pub fn new(status: RunStatus, message: &str, duration_ms: Option<u64>) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            message: truncate_message(message),
            duration_ms,
        }
    }
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let kept: String = message.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{}...", kept)
}

/// Terminal outcome reported when a run ends.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success {
        message: String,
        duration_ms: u64,
    },
    Fail {
        stage: String,
        error: String,
        duration_ms: u64,
    },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Success { .. } => RunStatus::Success,
            RunOutcome::Fail { .. } => RunStatus::Fail,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            RunOutcome::Success { duration_ms, .. } | RunOutcome::Fail { duration_ms, .. } => {
                *duration_ms
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            RunOutcome::Success { message, .. } => message.clone(),
            RunOutcome::Fail { stage, error, .. } => {
                format!("Failed during step: {}. Error: {}", stage, error)
            }
        }
    }
}

/// Status snapshot and recent history of one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub status: RunStatus,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub failed_stage: Option<String>,
    pub last_error: Option<String>,
    /// Newest first.
    pub history: VecDeque<SyncEvent>,
}

impl SyncRun {
    pub fn begin(&mut self, run_id: Uuid) {
        self.status = RunStatus::InProgress;
        self.run_id = Some(run_id);
        self.started_at = Some(Utc::now());
        self.failed_stage = None;
        self.last_error = None;
    }

    pub fn complete(&mut self, outcome: &RunOutcome) {
        let status = outcome.status();
        let duration_ms = outcome.duration_ms();

        self.status = status;
        self.last_run_at = Some(Utc::now());
        self.last_duration_ms = Some(duration_ms);
        if let RunOutcome::Fail { stage, error, .. } = outcome {
            self.failed_stage = Some(stage.clone());
            self.last_error = Some(error.clone());
        }
        self.push_event(SyncEvent::new(status, &outcome.message(), Some(duration_ms)));
    }

    pub fn push_event(&mut self, event: SyncEvent) {
        self.history.push_front(event);
        self.history.truncate(MAX_HISTORY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_capped_newest_first() {
        let mut run = SyncRun::default();
        for i in 0..25 {
            run.push_event(SyncEvent::new(RunStatus::Success, &format!("run {}", i), Some(i)));
        }
        assert_eq!(run.history.len(), MAX_HISTORY);
        assert_eq!(run.history[0].message, "run 24");
        assert_eq!(run.history[MAX_HISTORY - 1].message, "run 5");
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let event = SyncEvent::new(RunStatus::Fail, &"x".repeat(500), None);
        assert_eq!(event.message.chars().count(), MAX_MESSAGE_CHARS);
        assert!(event.message.ends_with("..."));

        let short = SyncEvent::new(RunStatus::Success, "done", None);
        assert_eq!(short.message, "done");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let event = SyncEvent::new(RunStatus::Fail, &"设备".repeat(150), None);
        assert_eq!(event.message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_fail_records_stage_and_error() {
        let mut run = SyncRun::default();
        run.begin(Uuid::new_v4());
        assert_eq!(run.status, RunStatus::InProgress);

        run.complete(&RunOutcome::Fail {
            stage: "Connecting to source".into(),
            error: "no such file".into(),
            duration_ms: 12,
        });
        assert_eq!(run.status, RunStatus::Fail);
        assert_eq!(run.failed_stage.as_deref(), Some("Connecting to source"));
        assert_eq!(run.last_error.as_deref(), Some("no such file"));
        assert_eq!(run.last_duration_ms, Some(12));
        assert_eq!(
            run.history[0].message,
            "Failed during step: Connecting to source. Error: no such file"
        );

        run.begin(Uuid::new_v4());
        assert!(run.failed_stage.is_none());
    }
}
