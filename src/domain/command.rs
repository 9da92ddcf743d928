//! Inbound control commands.
//!
//! Commands arrive as loose JSON from the realtime database and are
//! consumed destructively upstream, so each one fires at most once.
//! Malformed or unknown payloads are ignored rather than crashing the
//! loop.

use serde::Deserialize;

use crate::domain::agent::AgentId;

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin tracking. An empty agent list selects the full configured
    /// roster.
    Start { agents: Vec<AgentId> },
    Stop,
    /// One-off queue scan on an ephemeral page, independent of the
    /// running flag.
    Refresh,
    ClearLogs,
}

/// Wire shape of an inbound command node.
#[derive(Debug, Deserialize)]
struct CommandRequest {
    action: String,
    #[serde(default)]
    payload: Option<Vec<String>>,
}

/// Parse a raw command node. Returns `None` for anything malformed or
/// unrecognized.
pub fn parse_command(value: serde_json::Value) -> Option<Command> {
    let request: CommandRequest = serde_json::from_value(value).ok()?;
    match request.action.as_str() {
        "start" => Some(Command::Start {
            agents: request
                .payload
                .unwrap_or_default()
                .into_iter()
                .map(AgentId::new)
                .collect(),
        }),
        "stop" => Some(Command::Stop),
        "refresh" => Some(Command::Refresh),
        "clearLogs" => Some(Command::ClearLogs),
        _ => None,
    }
}
