//! Bounded, newest-first session log ring.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::constants::logs::MAX_SESSION_LOGS;
use crate::utils;

/// Subject used for engine-originated log entries.
pub const SYSTEM_SUBJECT: &str = "SYSTEM";

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Alert,
    Success,
}

/// One human-readable event, as published in the status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Clock time in the portal timezone, e.g. "03:12 PM"
    pub time: String,
    /// Agent name or [`SYSTEM_SUBJECT`]
    pub agent: String,
    pub msg: String,
    #[serde(rename = "type")]
    pub severity: LogSeverity,
}

/// Ring of at most [`MAX_SESSION_LOGS`] entries, newest first.
///
/// `append` is the only mutation path besides `clear`; the length
/// invariant holds after every append.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at the front, dropping the oldest entry when the
    /// buffer is full.
    pub fn append(
        &mut self,
        agent: impl Into<String>,
        msg: impl Into<String>,
        severity: LogSeverity,
        now: DateTime<Utc>,
    ) {
        self.entries.push_front(LogEntry {
            time: utils::format_clock(now),
            agent: agent.into(),
            msg: msg.into(),
            severity,
        });
        if self.entries.len() > MAX_SESSION_LOGS {
            self.entries.pop_back();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest entry, if any.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Snapshot copy for publication, newest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
