//! Plain-text activity log
//!
//! Every decision the publisher makes (skip, failure, success) is appended
//! here as a single timestamped line so site operators can see why a post
//! did or did not appear on Bluesky. The same message is also emitted as a
//! `tracing` event.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the activity log inside the log directory
pub const LOG_FILE_NAME: &str = "bluesky_poster_log.txt";

/// Append-only sink for activity messages
pub trait ActivityLog: Send + Sync {
    /// Record one message. Never fails from the caller's perspective.
    fn append(&self, message: &str);
}

/// Format a log line as `[YYYY-mm-dd HH:MM:SS] message` in UTC
pub fn format_line(timestamp: chrono::DateTime<chrono::Utc>, message: &str) -> String {
    format!(
        "{} {}\n",
        timestamp.format("[%Y-%m-%d %H:%M:%S]"),
        sanitize_message(message)
    )
}

/// Flatten a message to a single trimmed line
fn sanitize_message(message: &str) -> String {
    message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Activity log appending to `bluesky_poster_log.txt`
pub struct FileActivityLog {
    path: PathBuf,
}

impl FileActivityLog {
    /// Log into `LOG_FILE_NAME` inside `dir`, creating the directory if needed
    pub fn in_dir(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!("Failed to create log directory {}: {}", dir.display(), e);
        }
        Self {
            path: dir.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl ActivityLog for FileActivityLog {
    fn append(&self, message: &str) {
        tracing::info!(target: "skypost::activity", "{}", message);

        let line = format_line(chrono::Utc::now(), message);
        if let Err(e) = self.write_line(&line) {
            // Unwritable log directory: the line is dropped
            tracing::warn!("Failed to write activity log {}: {}", self.path.display(), e);
        }
    }
}

/// Activity log kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryActivityLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message appended so far
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// True if any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl ActivityLog for MemoryActivityLog {
    fn append(&self, message: &str) {
        tracing::info!(target: "skypost::activity", "{}", message);

        if let Ok(mut messages) = self.messages.lock() {
            messages.push(sanitize_message(message));
        }
    }
}
