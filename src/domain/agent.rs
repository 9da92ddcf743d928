//! Per-agent counter state and derived activity metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::constants::tracking::IDLE_THRESHOLD_MINS;

/// Stable identifier for a tracked human agent (roster key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Roster entry resolved from configuration: how to locate one agent on
/// the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: AgentId,
    /// Portal-side admin user id used in the search filter
    pub admin_user: String,
    /// Permission listing page, when configured for this agent
    pub permission_url: Option<String>,
}

/// Two-state idle flag with the timestamp the current phase began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleState {
    pub is_idle: bool,
    pub idle_since: DateTime<Utc>,
}

/// Idle transition produced by a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEvent {
    /// No idle-state crossing this tick
    None,
    /// Count progressed while the agent was marked idle
    ReturnedFromIdle {
        idle_since: DateTime<Utc>,
        minutes: i64,
    },
    /// Inactivity crossed the idle threshold this tick
    WentIdle { minutes: i64 },
}

/// Counter state for one tracked agent, lazily initialized from the first
/// successful scrape after a (re)start and discarded wholesale on `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCounterState {
    /// Latest observed cumulative count (portal-side, assumed monotonic)
    pub total_ads: u64,
    pub session_start_count: u64,
    pub hour_start_count: u64,
    pub last_hour_delta: u64,
    pub last_active_at: DateTime<Utc>,
    pub idle: IdleState,
}

impl AgentCounterState {
    /// Seed all baselines from the first observed reading; counts are
    /// never assumed zero.
    pub fn seeded(raw_count: u64, now: DateTime<Utc>) -> Self {
        Self {
            total_ads: raw_count,
            session_start_count: raw_count,
            hour_start_count: raw_count,
            last_hour_delta: 0,
            last_active_at: now,
            idle: IdleState {
                is_idle: false,
                idle_since: now,
            },
        }
    }

    /// Apply one raw reading.
    ///
    /// Idle detection is a hysteresis machine: exactly one event fires on
    /// each crossing, and none while the state is unchanged. `total_ads`
    /// is updated unconditionally, so a (supposedly impossible) decreasing
    /// reading is absorbed without ever producing negative deltas.
    pub fn observe(&mut self, raw_count: u64, now: DateTime<Utc>) -> CounterEvent {
        let event = if raw_count > self.total_ads {
            let event = if self.idle.is_idle {
                let idle_since = self.idle.idle_since;
                self.idle.is_idle = false;
                CounterEvent::ReturnedFromIdle {
                    idle_since,
                    minutes: (now - idle_since).num_minutes().max(0),
                }
            } else {
                CounterEvent::None
            };
            self.last_active_at = now;
            self.idle.idle_since = now;
            event
        } else {
            let inactive_mins = (now - self.last_active_at).num_minutes();
            if inactive_mins >= IDLE_THRESHOLD_MINS && !self.idle.is_idle {
                self.idle.is_idle = true;
                self.idle.idle_since = self.last_active_at;
                CounterEvent::WentIdle {
                    minutes: inactive_mins,
                }
            } else {
                CounterEvent::None
            }
        };
        self.total_ads = raw_count;
        event
    }

    /// Close the current hour: store the hourly delta and rebase the hour
    /// baseline on the current total.
    pub fn finish_hour(&mut self) -> u64 {
        let delta = self.total_ads.saturating_sub(self.hour_start_count);
        self.last_hour_delta = delta;
        self.hour_start_count = self.total_ads;
        delta
    }

    /// Rebase the hour baseline without computing a delta (first rollover
    /// after a restart).
    pub fn seed_hour(&mut self) {
        self.hour_start_count = self.total_ads;
    }

    /// Derived per-tick metrics. All deltas clamp at zero.
    pub fn metrics(&self, permissions: &str) -> AgentMetrics {
        AgentMetrics {
            total_ads: self.total_ads,
            this_hour_ads: self.total_ads.saturating_sub(self.hour_start_count),
            last_hour_ads: self.last_hour_delta,
            cumulative_new_ads: self.total_ads.saturating_sub(self.session_start_count),
            last_active_time: self.last_active_at.timestamp_millis(),
            permissions: permissions.to_string(),
        }
    }
}

/// Published per-agent metrics for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub total_ads: u64,
    pub this_hour_ads: u64,
    pub last_hour_ads: u64,
    pub cumulative_new_ads: u64,
    /// Epoch milliseconds of the last observed progress
    pub last_active_time: i64,
    pub permissions: String,
}
