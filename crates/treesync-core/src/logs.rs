//! Per-source live log broadcast.
//!
//! Subscribers get the INFO/WARN/ERROR lines of runs for one source.
//! Delivery is best-effort: a subscriber that falls more than
//! [`LOG_CHANNEL_CAPACITY`] lines behind misses the overflow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Lines buffered per source before slow subscribers start lagging.
pub const LOG_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line on a source's log stream.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    /// Text form sent to subscribers, e.g. `WARN: Missing detail record for D7`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.level, self.message)
    }
}

/// Receiver half handed to a subscriber.
pub type LogReceiver = broadcast::Receiver<LogLine>;

/// Registry of broadcast channels keyed by source identifier.
#[derive(Clone, Default)]
pub struct SyncLogHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<LogLine>>>>,
}

impl SyncLogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the log lines of one source.
    pub fn subscribe(&self, source_id: &str) -> LogReceiver {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(source_id.to_string())
            .or_insert_with(|| broadcast::channel(LOG_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send a line to the current subscribers of a source, if any.
    pub fn publish(&self, source_id: &str, level: LogLevel, message: impl Into<String>) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(source_id) else {
            return;
        };
        if tx.receiver_count() == 0 {
            channels.remove(source_id);
            return;
        }
        let _ = tx.send(LogLine {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }

    pub fn subscriber_count(&self, source_id: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(source_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_reach_subscribers_of_the_same_source() {
        let hub = SyncLogHub::new();
        let mut rx_a = hub.subscribe("a");
        let mut rx_b = hub.subscribe("b");

        hub.publish("a", LogLevel::Warn, "null child key");
        let line = rx_a.recv().await.unwrap();
        assert_eq!(line.render(), "WARN: null child key");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let hub = SyncLogHub::new();
        hub.publish("nobody", LogLevel::Info, "ignored");
        assert_eq!(hub.subscriber_count("nobody"), 0);
    }

    #[test]
    fn test_disconnected_subscribers_are_pruned() {
        let hub = SyncLogHub::new();
        let rx = hub.subscribe("a");
        assert_eq!(hub.subscriber_count("a"), 1);
        drop(rx);
        hub.publish("a", LogLevel::Error, "lost");
        assert_eq!(hub.subscriber_count("a"), 0);

        let mut rx = hub.subscribe("a");
        hub.publish("a", LogLevel::Info, "back");
        assert_eq!(rx.try_recv().unwrap().message, "back");
    }
}
