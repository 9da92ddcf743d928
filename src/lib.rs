//! Portal Sentinel - Agent activity tracking and queue backlog alerting
//!
//! Long-running monitoring engine that scrapes an external admin portal,
//! derives per-agent session/hourly activity metrics with idle detection,
//! evaluates queue-backlog severity with edge-triggered alerting, and
//! publishes status snapshots to a realtime database.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod utils;
