//! Pipeline log stream.
//!
//! Every entry is printed to stderr (stdout stays free for CLI output) and
//! broadcast to subscribers, which the HTTP server streams as Server-Sent
//! Events.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Pipeline stage an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Clean,
    Infer,
    Compute,
    Segment,
    Aggregate,
    Server,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Infer => "infer",
            Stage::Compute => "compute",
            Stage::Segment => "segment",
            Stage::Aggregate => "aggregate",
            Stage::Server => "server",
        };
        f.write_str(name)
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub stage: Stage,
    pub message: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            level,
            stage,
            message: message.into(),
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to stderr and every subscriber
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn log(&self, entry: LogEntry) {
        let marker = match entry.level {
            LogLevel::Info => " ",
            LogLevel::Success => "✓",
            LogLevel::Warning => "!",
            LogLevel::Error => "✗",
        };
        eprintln!("{} [{:>9}] {}", marker, entry.stage, entry.message);

        // No subscribers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(stage: Stage, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, stage, msg));
}

pub fn log_success(stage: Stage, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, stage, msg));
}

pub fn log_warning(stage: Stage, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, stage, msg));
}

pub fn log_error(stage: Stage, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, stage, msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LogEntry::new(LogLevel::Warning, Stage::Infer, "no income column");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["level"], "warning");
        assert_eq!(json["stage"], "infer");
        assert_eq!(json["message"], "no income column");
        assert!(json["at"].is_string());
    }

    #[test]
    fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::new(LogLevel::Info, Stage::Load, "read 3 rows"));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.stage, Stage::Load);
        assert_eq!(entry.message, "read 3 rows");
    }
}
