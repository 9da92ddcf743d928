//! Shared monitor state.

use crate::domain::agent::AgentId;
use crate::domain::alert::QueueAlertMonitor;
use crate::domain::log_buffer::LogBuffer;
use crate::domain::tracking::TrackingEngine;

/// The single owned state object behind the whole engine.
///
/// Mutated only by the command processor, the tracking engine calls in the
/// tick body and the alert monitor; the scheduler owns it exclusively, so
/// command application never interleaves with an in-progress tick.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub is_running: bool,
    pub selected_agents: Vec<AgentId>,
    pub engine: TrackingEngine,
    pub alert: QueueAlertMonitor,
    pub logs: LogBuffer,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            is_running: false,
            selected_agents: Vec::new(),
            engine: TrackingEngine::new(),
            alert: QueueAlertMonitor::new(),
            logs: LogBuffer::new(),
        }
    }
}
