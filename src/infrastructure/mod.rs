//! Infrastructure layer
//!
//! Adapters around the engine: configuration management, logging setup,
//! the rate-limited HTTP client, the portal scraper and session manager,
//! and the realtime-database state sink.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod portal;
pub mod realtime_sink;
pub mod session;

pub use config::{AppConfig, ConfigManager};
pub use http_client::{HttpClient, HttpClientConfig};
pub use portal::PortalPage;
pub use realtime_sink::{RealtimeDbClient, spawn_command_poller};
pub use session::SessionManager;
