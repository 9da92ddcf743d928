//! Published status snapshot types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::agent::AgentMetrics;
use crate::domain::log_buffer::LogEntry;
use crate::utils;

/// Queue name -> observed backlog count, one per tick, transient.
pub type QueueCounts = HashMap<String, u64>;

/// Partial status snapshot pushed to the state sink.
///
/// All fields except `last_updated` are optional so the full tick
/// publication, the `refresh` queue-only push and the `clearLogs` push can
/// all target the same sink node with different field subsets.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Epoch milliseconds of this update
    pub last_updated: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    /// Human display of the current hour window in the portal timezone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_data: Option<BTreeMap<String, AgentMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_counts: Option<QueueCounts>,
    /// Newest first, at most 100 entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_logs: Option<Vec<LogEntry>>,
}

impl StatusUpdate {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now.timestamp_millis(),
            ..Self::default()
        }
    }

    /// Full per-tick snapshot.
    pub fn full(
        now: DateTime<Utc>,
        is_running: bool,
        agent_data: Option<BTreeMap<String, AgentMetrics>>,
        review_counts: Option<QueueCounts>,
        session_logs: Vec<LogEntry>,
    ) -> Self {
        Self {
            last_updated: now.timestamp_millis(),
            is_running: Some(is_running),
            time_label: Some(utils::hour_window_label(now)),
            agent_data,
            review_counts,
            session_logs: Some(session_logs),
        }
    }

    /// Ad hoc push after a one-off `refresh` scan.
    pub fn queues_only(now: DateTime<Utc>, review_counts: QueueCounts) -> Self {
        Self {
            review_counts: Some(review_counts),
            ..Self::at(now)
        }
    }

    /// Ad hoc push after `clearLogs`.
    pub fn logs_only(now: DateTime<Utc>, session_logs: Vec<LogEntry>) -> Self {
        Self {
            session_logs: Some(session_logs),
            ..Self::at(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn partial_updates_omit_unset_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let update = StatusUpdate::queues_only(now, QueueCounts::new());
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("reviewCounts").is_some());
        assert!(json.get("agentData").is_none());
        assert!(json.get("isRunning").is_none());
        assert_eq!(json["lastUpdated"], now.timestamp_millis());
    }

    #[test]
    fn full_update_uses_camel_case_wire_names() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let update = StatusUpdate::full(now, true, Some(BTreeMap::new()), None, vec![]);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["timeLabel"], "3 PM - 4 PM");
        assert!(json["sessionLogs"].as_array().unwrap().is_empty());
    }
}
