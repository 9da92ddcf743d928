//! Configuration infrastructure
//!
//! Loading and management of the deployment configuration: portal
//! location and credentials material, the tracked roster, sink endpoint
//! and behavioral/timing flags. The two historical deployment variants
//! (queue watch 24/7 vs only while tracking) are a configuration flag
//! here, not separate binaries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::domain::agent::{AgentId, AgentProfile};

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub sink: SinkConfig,
    pub behavior: BehaviorConfig,
    pub logging: LoggingConfig,
    /// Tracked roster: display name -> portal identifiers
    pub roster: BTreeMap<String, AgentEntry>,
}

/// Where and how to reach the admin portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin, e.g. "https://admin.example.com/"
    pub base_url: String,
    /// Optional browser-exported cookies.json used to seed the session
    pub cookie_file: Option<PathBuf>,
    pub user_agent: String,
    /// Per-call timeout guarding every scrape operation
    pub request_timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Portal-side admin user id used in the search filter
    pub id: String,
    /// Permission listing page for this agent, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_url: Option<String>,
}

/// Realtime database sink endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Database root URL; status and commands live under it
    pub database_url: String,
    /// Optional auth token appended as a query parameter
    pub auth_token: Option<String>,
    /// Command node poll cadence
    pub command_poll_seconds: u64,
}

/// Loop timing and behavioral flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Fixed poll interval between READY iterations
    pub poll_interval_seconds: u64,
    /// Backoff after a fatal tick error
    pub error_backoff_seconds: u64,
    /// Queue watch runs even while tracking is stopped
    pub queue_watch_while_stopped: bool,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// Module-specific log level filters (e.g. "reqwest": "warn")
    pub module_filters: BTreeMap<String, String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::PORTAL_BASE_URL.to_string(),
            cookie_file: None,
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::SINK_DATABASE_URL.to_string(),
            auth_token: None,
            command_poll_seconds: defaults::COMMAND_POLL_SECONDS,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            error_backoff_seconds: defaults::ERROR_BACKOFF_SECONDS,
            queue_watch_while_stopped: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: true,
            module_filters: {
                let mut filters = BTreeMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Roster display names in configured order.
    pub fn roster_ids(&self) -> Vec<AgentId> {
        self.roster.keys().map(AgentId::new).collect()
    }

    /// Resolve a roster entry into a scraping profile.
    pub fn agent_profile(&self, id: &AgentId) -> Option<AgentProfile> {
        self.roster.get(id.as_str()).map(|entry| AgentProfile {
            id: id.clone(),
            admin_user: entry.id.clone(),
            permission_url: entry.permission_url.clone(),
        })
    }
}

/// Configuration manager for loading and saving settings.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory.
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("portal-sentinel");
        Ok(config_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("portal_sentinel_config.json");
        Ok(Self { config_path })
    }

    /// Load the configuration, writing the default file on first run.
    pub async fn initialize_on_first_run(&self) -> Result<AppConfig> {
        let config_dir = self
            .config_path
            .parent()
            .context("Failed to get config directory")?;
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .await
                .context("Failed to create config directory")?;
        }

        if self.config_path.exists() {
            self.load_config().await
        } else {
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            info!("🎉 First run - wrote default configuration to {:?}", self.config_path);
            Ok(default_config)
        }
    }

    /// Load configuration from file, falling back to defaults when the
    /// file cannot be parsed.
    pub async fn load_config(&self) -> Result<AppConfig> {
        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️ Configuration file unreadable ({parse_error}); using defaults");
                Ok(AppConfig::default())
            }
        }
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write configuration file {:?}", self.config_path))
    }
}

/// Default configuration values.
pub mod defaults {
    pub const PORTAL_BASE_URL: &str = "https://admin.bikroy.com/";
    pub const USER_AGENT: &str = "portal-sentinel/0.3";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 4;

    pub const SINK_DATABASE_URL: &str = "http://localhost:9000/";
    pub const COMMAND_POLL_SECONDS: u64 = 2;

    pub const POLL_INTERVAL_SECONDS: u64 = 60;
    pub const ERROR_BACKOFF_SECONDS: u64 = 10;

    pub const LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager {
            config_path: dir.path().join("config.json"),
        };

        let mut config = AppConfig::default();
        config.roster.insert(
            "nila".to_string(),
            AgentEntry {
                id: "4421".to_string(),
                permission_url: Some("https://admin.example.com/users?name=nila".to_string()),
            },
        );
        manager.save_config(&config).await.unwrap();

        let loaded = manager.load_config().await.unwrap();
        assert_eq!(loaded.roster.len(), 1);
        assert_eq!(loaded.roster["nila"].id, "4421");
        assert_eq!(loaded.behavior.poll_interval_seconds, 60);
    }

    #[tokio::test]
    async fn unreadable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let manager = ConfigManager { config_path: path };
        let config = manager.load_config().await.unwrap();
        assert!(config.roster.is_empty());
        assert!(config.behavior.queue_watch_while_stopped);
    }

    #[test]
    fn agent_profile_resolves_roster_entry() {
        let mut config = AppConfig::default();
        config.roster.insert(
            "rumi".to_string(),
            AgentEntry {
                id: "7001".to_string(),
                permission_url: None,
            },
        );
        let profile = config.agent_profile(&AgentId::new("rumi")).unwrap();
        assert_eq!(profile.admin_user, "7001");
        assert!(profile.permission_url.is_none());
        assert!(config.agent_profile(&AgentId::new("ghost")).is_none());
    }
}
