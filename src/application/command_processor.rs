//! Applies inbound control commands to the shared monitor state.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::application::state::MonitorState;
use crate::domain::agent::AgentId;
use crate::domain::command::Command;
use crate::domain::log_buffer::{LogSeverity, SYSTEM_SUBJECT};

/// Follow-up work a command requires beyond the state mutation. The
/// scheduler executes effects after `apply` returns, keeping the handlers
/// themselves total and synchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    None,
    /// Push the emptied log buffer to the sink without waiting for the
    /// next tick.
    PushClearedLogs,
    /// Run a one-off queue scan on an ephemeral page and push the result.
    RunRefreshScan,
}

/// Command handlers over [`MonitorState`].
///
/// Handlers run to completion on the scheduler's thread of control, so a
/// `start` reset can never interleave with a tick's aggregation step.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    /// Full configured roster, used when `start` carries no payload
    roster: Vec<AgentId>,
}

impl CommandProcessor {
    pub fn new(roster: Vec<AgentId>) -> Self {
        Self { roster }
    }

    pub fn apply(
        &self,
        state: &mut MonitorState,
        command: Command,
        now: DateTime<Utc>,
    ) -> CommandEffect {
        match command {
            Command::Start { agents } => {
                info!("🟢 START command");
                state.is_running = true;
                state.selected_agents = if agents.is_empty() {
                    self.roster.clone()
                } else {
                    agents
                };
                // Fresh session: counters re-seed lazily from the next
                // successful scrape.
                state.engine.reset();
                state.alert.reset();
                state.logs.clear();
                state
                    .logs
                    .append(SYSTEM_SUBJECT, "Tracking Started", LogSeverity::Info, now);
                CommandEffect::None
            }
            Command::Stop => {
                info!("🔴 STOP command");
                state.is_running = false;
                state.selected_agents.clear();
                state
                    .logs
                    .append(SYSTEM_SUBJECT, "Tracking Stopped", LogSeverity::Info, now);
                CommandEffect::None
            }
            Command::Refresh => CommandEffect::RunRefreshScan,
            Command::ClearLogs => {
                info!("🧹 Logs cleared");
                state.logs.clear();
                CommandEffect::PushClearedLogs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn processor() -> CommandProcessor {
        CommandProcessor::new(vec![AgentId::new("nila"), AgentId::new("rumi")])
    }

    #[test]
    fn start_without_payload_selects_full_roster() {
        let mut state = MonitorState::new();
        let effect = processor().apply(&mut state, Command::Start { agents: vec![] }, now());
        assert_eq!(effect, CommandEffect::None);
        assert!(state.is_running);
        assert_eq!(
            state.selected_agents,
            vec![AgentId::new("nila"), AgentId::new("rumi")]
        );
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs.latest().unwrap().msg, "Tracking Started");
    }

    #[test]
    fn start_resets_engine_alert_and_logs() {
        let mut state = MonitorState::new();
        state
            .engine
            .observe(&AgentId::new("nila"), 1000, now(), &mut state.logs);
        state.logs.append(SYSTEM_SUBJECT, "old entry", LogSeverity::Info, now());

        processor().apply(
            &mut state,
            Command::Start {
                agents: vec![AgentId::new("nila")],
            },
            now(),
        );

        assert_eq!(state.engine.tracked_count(), 0);
        assert_eq!(state.engine.current_hour_bucket(), -1);
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.selected_agents, vec![AgentId::new("nila")]);
    }

    #[test]
    fn stop_clears_selection_but_keeps_counters_frozen() {
        let mut state = MonitorState::new();
        processor().apply(&mut state, Command::Start { agents: vec![] }, now());
        state
            .engine
            .observe(&AgentId::new("nila"), 1000, now(), &mut state.logs);

        processor().apply(&mut state, Command::Stop, now());
        assert!(!state.is_running);
        assert!(state.selected_agents.is_empty());
        // frozen, not discarded
        assert_eq!(state.engine.tracked_count(), 1);
        assert_eq!(state.logs.latest().unwrap().msg, "Tracking Stopped");
    }

    #[test]
    fn clear_logs_empties_buffer_and_requests_immediate_push() {
        let mut state = MonitorState::new();
        state.logs.append(SYSTEM_SUBJECT, "x", LogSeverity::Info, now());
        let effect = processor().apply(&mut state, Command::ClearLogs, now());
        assert_eq!(effect, CommandEffect::PushClearedLogs);
        assert!(state.logs.is_empty());
    }

    #[test]
    fn refresh_only_requests_a_scan() {
        let mut state = MonitorState::new();
        let effect = processor().apply(&mut state, Command::Refresh, now());
        assert_eq!(effect, CommandEffect::RunRefreshScan);
        assert!(!state.is_running);
        assert!(state.logs.is_empty());
    }
}
