//! Queue backlog severity evaluation with edge-triggered alert logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::constants::queues;
use crate::domain::log_buffer::{LogBuffer, LogSeverity, SYSTEM_SUBJECT};
use crate::domain::snapshot::QueueCounts;

/// Aggregate queue-backlog severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Normal,
    Yellow,
    Red,
}

/// Result of one threshold evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvaluation {
    pub level: AlertLevel,
    /// Compact codes of the queues breaching their RED threshold
    pub red_queues: Vec<&'static str>,
}

fn count(counts: &QueueCounts, queue: &str) -> u64 {
    counts.get(queue).copied().unwrap_or(0)
}

/// Evaluate one queue snapshot against the fixed thresholds.
///
/// RED wins over YELLOW; the YELLOW bounds only apply to queues that are
/// not already RED on their own threshold.
pub fn evaluate(counts: &QueueCounts) -> AlertEvaluation {
    let mut red_queues = Vec::new();
    if count(counts, "member") > queues::RED_MEMBER {
        red_queues.push("M");
    }
    if count(counts, "listing_fee") > queues::RED_LISTING_FEE {
        red_queues.push("L");
    }
    if count(counts, "general") > queues::RED_GENERAL {
        red_queues.push("G");
    }
    if count(counts, "manager") > queues::RED_MANAGER {
        red_queues.push("MGR");
    }
    if count(counts, "fraud") > queues::RED_FRAUD {
        red_queues.push("FRD");
    }
    if count(counts, "edited") > queues::RED_EDITED {
        red_queues.push("E");
    }
    if count(counts, "verification") > queues::RED_VERIFICATION {
        red_queues.push("V");
    }

    let yellow = (!red_queues.contains(&"G") && count(counts, "general") >= queues::YELLOW_GENERAL)
        || (!red_queues.contains(&"E") && count(counts, "edited") >= queues::YELLOW_EDITED);

    let level = if !red_queues.is_empty() {
        AlertLevel::Red
    } else if yellow {
        AlertLevel::Yellow
    } else {
        AlertLevel::Normal
    };

    AlertEvaluation { level, red_queues }
}

/// Persists the last evaluated level across ticks and logs only on level
/// transitions. The triggering queue set changing while the level stays
/// RED produces no additional log.
#[derive(Debug, Clone)]
pub struct QueueAlertMonitor {
    last_level: AlertLevel,
}

impl Default for QueueAlertMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueAlertMonitor {
    pub fn new() -> Self {
        Self {
            last_level: AlertLevel::Normal,
        }
    }

    pub fn last_level(&self) -> AlertLevel {
        self.last_level
    }

    /// Forget prior state (applied on a `start` command).
    pub fn reset(&mut self) {
        self.last_level = AlertLevel::Normal;
    }

    /// Evaluate a snapshot and emit at most one log line per transition.
    pub fn apply(
        &mut self,
        counts: &QueueCounts,
        logs: &mut LogBuffer,
        now: DateTime<Utc>,
    ) -> AlertLevel {
        let evaluation = evaluate(counts);
        if evaluation.level != self.last_level {
            match evaluation.level {
                AlertLevel::Red => logs.append(
                    SYSTEM_SUBJECT,
                    format!("Need to clear {}", evaluation.red_queues.join(", ")),
                    LogSeverity::Alert,
                    now,
                ),
                AlertLevel::Yellow => logs.append(
                    SYSTEM_SUBJECT,
                    "Need to control the portal",
                    LogSeverity::Warning,
                    now,
                ),
                AlertLevel::Normal => logs.append(
                    SYSTEM_SUBJECT,
                    "Queues returned to normal",
                    LogSeverity::Success,
                    now,
                ),
            }
            self.last_level = evaluation.level;
        }
        evaluation.level
    }
}
