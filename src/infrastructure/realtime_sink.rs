//! Realtime database sink and command stream.
//!
//! Speaks the Firebase-style REST dialect: partial status snapshots are
//! PATCHed under `status.json`, and control commands are read from
//! `commands.json` and destructively cleared with DELETE so each one
//! fires at most once. Commands are forwarded into a single-consumer
//! channel drained by the scheduler, which keeps command application
//! serialized with the tick body.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::command::{parse_command, Command};
use crate::domain::services::StatusSink;
use crate::domain::snapshot::StatusUpdate;
use crate::infrastructure::config::SinkConfig;

/// REST client for one realtime database root.
pub struct RealtimeDbClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RealtimeDbClient {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let base_url = Url::parse(&config.database_url)
            .with_context(|| format!("invalid sink database url {:?}", config.database_url))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create sink HTTP client")?;
        Ok(Self {
            http,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn node_url(&self, node: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("{node}.json"))
            .with_context(|| format!("invalid sink node {node:?}"))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    /// Read and destructively consume the pending command, if any.
    /// Malformed command payloads are dropped.
    pub async fn fetch_and_clear_command(&self) -> Result<Option<Command>> {
        let url = self.node_url("commands")?;
        let value: serde_json::Value = self
            .http
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("command node is not JSON")?;

        if value.is_null() {
            return Ok(None);
        }

        // clear before dispatch so the command fires at most once even if
        // the engine restarts mid-handling
        self.http.delete(url).send().await?.error_for_status()?;

        match parse_command(value) {
            Some(command) => Ok(Some(command)),
            None => {
                warn!("⚠️ Ignoring malformed command payload");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl StatusSink for RealtimeDbClient {
    async fn push_status(&self, update: &StatusUpdate) -> Result<()> {
        let url = self.node_url("status")?;
        self.http
            .patch(url)
            .json(update)
            .send()
            .await
            .context("status push failed")?
            .error_for_status()
            .context("status push rejected")?;
        Ok(())
    }
}

/// Spawn the command poller: a supervised task that forwards inbound
/// commands into the scheduler's channel until shutdown.
pub fn spawn_command_poller(
    client: Arc<RealtimeDbClient>,
    commands: mpsc::Sender<Command>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("📡 Command poller started ({poll_interval:?} cadence)");
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match client.fetch_and_clear_command().await {
                Ok(Some(command)) => {
                    debug!("Inbound command: {command:?}");
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                // transient sink trouble; next poll retries
                Err(err) => debug!("Command poll failed: {err:#}"),
            }
        }
        info!("📡 Command poller stopped");
    })
}
