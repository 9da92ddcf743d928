//! Domain layer
//!
//! Pure tracking/alerting state machines and the value types they operate
//! on. Nothing in here performs I/O; the infrastructure layer feeds these
//! types from the portal and the application layer sequences them.

pub mod agent;
pub mod alert;
pub mod command;
pub mod constants;
pub mod log_buffer;
pub mod services;
pub mod snapshot;
pub mod tracking;

pub use agent::{AgentCounterState, AgentId, AgentMetrics, AgentProfile};
pub use alert::{AlertLevel, QueueAlertMonitor};
pub use command::Command;
pub use log_buffer::{LogBuffer, LogEntry, LogSeverity, SYSTEM_SUBJECT};
pub use snapshot::{QueueCounts, StatusUpdate};
pub use tracking::TrackingEngine;
