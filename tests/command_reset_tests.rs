//! Command lifecycle scenarios over the shared monitor state: restart
//! semantics, the stop freeze and log clearing.

use chrono::{DateTime, TimeZone, Utc};

use portal_sentinel::application::{CommandEffect, CommandProcessor, MonitorState};
use portal_sentinel::domain::{AgentId, Command};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 11, minute, 0).unwrap()
}

fn processor() -> CommandProcessor {
    CommandProcessor::new(vec![AgentId::new("nila"), AgentId::new("rumi")])
}

#[test]
fn restart_rebases_cumulative_counters() {
    let processor = processor();
    let mut state = MonitorState::new();
    let nila = AgentId::new("nila");

    processor.apply(&mut state, Command::Start { agents: vec![] }, at(0));
    state.engine.observe(&nila, 1000, at(1), &mut state.logs);
    let metrics = state.engine.observe(&nila, 1060, at(5), &mut state.logs);
    assert_eq!(metrics.cumulative_new_ads, 60);

    // a second start is a full restart: the session baseline moves to the
    // next observed reading
    processor.apply(&mut state, Command::Start { agents: vec![] }, at(10));
    assert_eq!(state.engine.tracked_count(), 0);
    let metrics = state.engine.observe(&nila, 1100, at(11), &mut state.logs);
    assert_eq!(metrics.cumulative_new_ads, 0);
    assert_eq!(metrics.total_ads, 1100);
}

#[test]
fn stop_freezes_state_and_start_wipes_the_log_history() {
    let processor = processor();
    let mut state = MonitorState::new();
    let rumi = AgentId::new("rumi");

    processor.apply(&mut state, Command::Start { agents: vec![] }, at(0));
    state.engine.observe(&rumi, 500, at(1), &mut state.logs);

    processor.apply(&mut state, Command::Stop, at(5));
    assert!(!state.is_running);
    assert!(state.selected_agents.is_empty());
    assert_eq!(state.engine.tracked_count(), 1);
    assert_eq!(state.logs.latest().unwrap().msg, "Tracking Stopped");

    processor.apply(&mut state, Command::Start { agents: vec![] }, at(6));
    assert_eq!(state.logs.len(), 1);
    assert_eq!(state.logs.latest().unwrap().msg, "Tracking Started");
}

#[test]
fn start_payload_overrides_the_roster() {
    let processor = processor();
    let mut state = MonitorState::new();

    let effect = processor.apply(
        &mut state,
        Command::Start {
            agents: vec![AgentId::new("rumi")],
        },
        at(0),
    );
    assert_eq!(effect, CommandEffect::None);
    assert_eq!(state.selected_agents, vec![AgentId::new("rumi")]);
}

#[test]
fn clear_logs_requests_an_immediate_push() {
    let processor = processor();
    let mut state = MonitorState::new();
    processor.apply(&mut state, Command::Start { agents: vec![] }, at(0));
    assert!(!state.logs.is_empty());

    let effect = processor.apply(&mut state, Command::ClearLogs, at(1));
    assert_eq!(effect, CommandEffect::PushClearedLogs);
    assert!(state.logs.is_empty());
    // clearing does not touch the running flag or the counters
    assert!(state.is_running);
}

#[test]
fn refresh_never_mutates_state() {
    let processor = processor();
    let mut state = MonitorState::new();
    let effect = processor.apply(&mut state, Command::Refresh, at(0));
    assert_eq!(effect, CommandEffect::RunRefreshScan);
    assert!(!state.is_running);
    assert!(state.logs.is_empty());
    assert_eq!(state.engine.tracked_count(), 0);
}
