//! Application layer
//!
//! Owns the shared monitor state and sequences the domain state machines:
//! command application, the tick body and the supervised main loop.

pub mod command_processor;
pub mod scheduler;
pub mod state;

pub use command_processor::{CommandEffect, CommandProcessor};
pub use scheduler::MonitorLoop;
pub use state::MonitorState;
