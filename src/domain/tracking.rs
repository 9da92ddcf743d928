//! Per-agent counter tracking: lazy initialization, idle hysteresis and
//! hourly rollover.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::agent::{AgentCounterState, AgentId, AgentMetrics, CounterEvent};
use crate::domain::constants::tracking::LOW_PERFORMANCE_HOURLY;
use crate::domain::log_buffer::{LogBuffer, LogSeverity};
use crate::utils;

/// Stateful tracking engine over the currently selected agents.
///
/// Counter states are created lazily from the first successful scrape
/// after a (re)start and discarded wholesale by [`TrackingEngine::reset`].
/// The cached permission strings survive a reset; the refresh cadence in
/// the scheduler repopulates them on the first tick anyway.
#[derive(Debug, Clone, Default)]
pub struct TrackingEngine {
    agents: HashMap<AgentId, AgentCounterState>,
    permissions: HashMap<AgentId, String>,
    current_hour_bucket: i32,
}

impl TrackingEngine {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            permissions: HashMap::new(),
            current_hour_bucket: -1,
        }
    }

    /// Discard all counter/idle state and the hour bucket (applied on a
    /// `start` command).
    pub fn reset(&mut self) {
        self.agents.clear();
        self.current_hour_bucket = -1;
    }

    pub fn current_hour_bucket(&self) -> i32 {
        self.current_hour_bucket
    }

    pub fn tracked_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent(&self, id: &AgentId) -> Option<&AgentCounterState> {
        self.agents.get(id)
    }

    pub fn set_permissions(&mut self, id: &AgentId, permissions: String) {
        self.permissions.insert(id.clone(), permissions);
    }

    pub fn permissions(&self, id: &AgentId) -> &str {
        self.permissions.get(id).map_or("-", String::as_str)
    }

    /// Roll the hour bucket over when the portal wall-clock hour changed.
    ///
    /// The first transition after a (re)start only seeds the hourly
    /// baselines; every subsequent transition stores each agent's hourly
    /// delta and logs a low-performance warning below the bound. Runs
    /// once per tick, before the per-agent scrape.
    pub fn rollover_hour(&mut self, now: DateTime<Utc>, logs: &mut LogBuffer) {
        let bucket = utils::hour_bucket(now);
        if bucket == self.current_hour_bucket {
            return;
        }
        if self.current_hour_bucket == -1 {
            for state in self.agents.values_mut() {
                state.seed_hour();
            }
        } else {
            for (id, state) in &mut self.agents {
                let delta = state.finish_hour();
                if delta < LOW_PERFORMANCE_HOURLY {
                    logs.append(
                        id.as_str(),
                        format!("📉 Low Performance: Only {delta} ads last hour."),
                        LogSeverity::Warning,
                        now,
                    );
                }
            }
        }
        self.current_hour_bucket = bucket;
    }

    /// Apply one raw reading for one agent and return its published
    /// metrics. Idle crossings produce exactly one log entry each.
    pub fn observe(
        &mut self,
        id: &AgentId,
        raw_count: u64,
        now: DateTime<Utc>,
        logs: &mut LogBuffer,
    ) -> AgentMetrics {
        let state = self
            .agents
            .entry(id.clone())
            .or_insert_with(|| AgentCounterState::seeded(raw_count, now));

        match state.observe(raw_count, now) {
            CounterEvent::ReturnedFromIdle {
                idle_since,
                minutes,
            } => logs.append(
                id.as_str(),
                format!(
                    "✅ Back after {minutes}m idle ({} - {})",
                    utils::format_clock(idle_since),
                    utils::format_clock(now)
                ),
                LogSeverity::Success,
                now,
            ),
            CounterEvent::WentIdle { minutes } => logs.append(
                id.as_str(),
                format!("⚠️ Is inactive for {minutes} mins."),
                LogSeverity::Alert,
                now,
            ),
            CounterEvent::None => {}
        }

        let permissions = self.permissions.get(id).map_or("-", String::as_str);
        state.metrics(permissions)
    }
}
