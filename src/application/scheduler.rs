//! Supervised main loop.
//!
//! Drives one tick per poll interval: ensure the portal session is ready,
//! run the queue watch and alert evaluation, then (while tracking) the
//! hourly rollover and per-agent scrape, and publish the snapshot. Any
//! error escaping a tick degrades the loop to a backoff-and-retry state;
//! the loop never terminates on error, only via the shutdown token.
//!
//! Commands and ticks are serialized on this single owner: commands are
//! drained between ticks and during the inter-tick wait, never while a
//! tick is in flight.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::command_processor::{CommandEffect, CommandProcessor};
use crate::application::state::MonitorState;
use crate::domain::agent::AgentMetrics;
use crate::domain::command::Command;
use crate::domain::constants::tracking::PERMISSION_REFRESH_TICKS;
use crate::domain::services::{PageSource, PortalScraper, ScrapeError, StatusSink};
use crate::domain::snapshot::{QueueCounts, StatusUpdate};
use crate::infrastructure::config::AppConfig;

pub struct MonitorLoop<S: PageSource> {
    config: Arc<AppConfig>,
    sessions: S,
    sink: Arc<dyn StatusSink>,
    commands: mpsc::Receiver<Command>,
    commands_closed: bool,
    processor: CommandProcessor,
    state: MonitorState,
    /// Tick counter for the coarse permission refresh cadence
    perm_timer: u32,
    shutdown: CancellationToken,
}

impl<S: PageSource> MonitorLoop<S> {
    pub fn new(
        config: Arc<AppConfig>,
        sessions: S,
        sink: Arc<dyn StatusSink>,
        commands: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        let processor = CommandProcessor::new(config.roster_ids());
        Self {
            config,
            sessions,
            sink,
            commands,
            commands_closed: false,
            processor,
            state: MonitorState::new(),
            perm_timer: 0,
            shutdown,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(mut self) {
        info!(
            "🚀 Monitor loop starting ({}s poll interval)",
            self.config.behavior.poll_interval_seconds
        );
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.drain_commands().await;
            if self.shutdown.is_cancelled() {
                break;
            }

            let pause = match self.tick().await {
                Ok(()) => Duration::from_secs(self.config.behavior.poll_interval_seconds),
                Err(err) => {
                    error!("🔥 Fatal tick error: {err:#}");
                    if err
                        .downcast_ref::<ScrapeError>()
                        .is_some_and(ScrapeError::is_session_lost)
                    {
                        self.sessions.invalidate();
                    }
                    Duration::from_secs(self.config.behavior.error_backoff_seconds)
                }
            };

            if !self.wait(pause).await {
                break;
            }
        }
        info!("🛑 Monitor loop stopped");
    }

    /// One READY iteration.
    async fn tick(&mut self) -> anyhow::Result<()> {
        // Session first; creation failure backs the whole loop off.
        self.sessions.ensure_page().await?;
        let now = Utc::now();

        let watch_queues =
            self.state.is_running || self.config.behavior.queue_watch_while_stopped;
        let review_counts = if watch_queues {
            let page = self.sessions.ensure_page().await?;
            let counts = match page.fetch_queue_counts().await {
                Ok(counts) => counts,
                Err(err) if err.is_session_lost() => return Err(err.into()),
                Err(err) => {
                    warn!("⚠️ Queue scrape failed: {err}");
                    QueueCounts::new()
                }
            };
            self.state.alert.apply(&counts, &mut self.state.logs, now);
            Some(counts)
        } else {
            None
        };

        let mut agent_data = BTreeMap::new();
        if self.state.is_running {
            // Rollover uses last tick's totals, so it runs before the
            // per-agent scrape.
            self.state.engine.rollover_hour(now, &mut self.state.logs);

            let selected = self.state.selected_agents.clone();
            let refresh_permissions =
                self.perm_timer == 0 || self.perm_timer >= PERMISSION_REFRESH_TICKS;

            let page = self.sessions.ensure_page().await?;
            if refresh_permissions {
                for id in &selected {
                    let Some(profile) = self.config.agent_profile(id) else {
                        continue;
                    };
                    let permissions = match page.fetch_permissions(&profile).await {
                        Ok(permissions) => permissions,
                        Err(err) if err.is_session_lost() => return Err(err.into()),
                        Err(err) => {
                            warn!("⚠️ Permission scrape failed for {id}: {err}");
                            "Error".to_string()
                        }
                    };
                    self.state.engine.set_permissions(id, permissions);
                }
                self.perm_timer = 1;
            } else {
                self.perm_timer += 1;
            }

            for id in &selected {
                let Some(profile) = self.config.agent_profile(id) else {
                    warn!("⚠️ Agent {id} is selected but missing from the roster");
                    continue;
                };
                let raw_count = match page.fetch_agent_total(&profile).await {
                    Ok(count) => count,
                    Err(err) if err.is_session_lost() => return Err(err.into()),
                    Err(err) => {
                        // transient: skip this agent this tick, keep its
                        // previous state
                        warn!("⚠️ Scrape failed for {id}: {err}");
                        continue;
                    }
                };
                let metrics = self
                    .state
                    .engine
                    .observe(id, raw_count, now, &mut self.state.logs);
                agent_data.insert(id.to_string(), metrics);
            }
        }

        let agent_data: Option<BTreeMap<String, AgentMetrics>> =
            self.state.is_running.then_some(agent_data);
        let update = StatusUpdate::full(
            now,
            self.state.is_running,
            agent_data,
            review_counts,
            self.state.logs.to_vec(),
        );
        self.sink
            .push_status(&update)
            .await
            .context("failed to publish status snapshot")?;
        Ok(())
    }

    /// Apply everything already queued, without blocking.
    async fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command).await,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.commands_closed = true;
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        let now = Utc::now();
        match self.processor.apply(&mut self.state, command, now) {
            CommandEffect::None => {}
            CommandEffect::PushClearedLogs => {
                let update = StatusUpdate::logs_only(now, Vec::new());
                if let Err(err) = self.sink.push_status(&update).await {
                    warn!("⚠️ Failed to push cleared logs: {err:#}");
                }
            }
            CommandEffect::RunRefreshScan => self.run_one_off_scan().await,
        }
    }

    /// One-off queue scan on an ephemeral page, independent of the
    /// running flag. Never fails the loop; errors are logged.
    async fn run_one_off_scan(&mut self) {
        info!("⚡ Running one-off queue scan");
        let mut page = match self.sessions.ephemeral_page().await {
            Ok(page) => page,
            Err(err) => {
                warn!("⚠️ Manual refresh failed: {err}");
                return;
            }
        };
        let counts = match page.fetch_queue_counts().await {
            Ok(counts) => counts,
            Err(err) => {
                if err.is_session_lost() {
                    self.sessions.invalidate();
                }
                warn!("⚠️ Manual refresh failed: {err}");
                return;
            }
        };
        let update = StatusUpdate::queues_only(Utc::now(), counts);
        match self.sink.push_status(&update).await {
            Ok(()) => info!("✅ Manual refresh complete"),
            Err(err) => warn!("⚠️ Manual refresh push failed: {err:#}"),
        }
    }

    /// Wait out the inter-tick pause while staying responsive to inbound
    /// commands and shutdown. Returns false when shutdown fired. A
    /// `start` command cuts the wait short so tracking begins on a fresh
    /// tick immediately.
    async fn wait(&mut self, duration: Duration) -> bool {
        let shutdown = self.shutdown.clone();
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                command = self.commands.recv(), if !self.commands_closed => match command {
                    Some(command) => {
                        let tick_now = matches!(command, Command::Start { .. });
                        self.handle_command(command).await;
                        if tick_now {
                            return true;
                        }
                    }
                    None => self.commands_closed = true,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::agent::AgentProfile;
    use crate::infrastructure::config::AgentEntry;

    enum QueueScript {
        Lost,
        Counts(Vec<(&'static str, u64)>),
    }

    struct ScriptedPage {
        queue: Arc<Mutex<VecDeque<QueueScript>>>,
        agent_total: u64,
    }

    #[async_trait]
    impl PortalScraper for ScriptedPage {
        async fn fetch_queue_counts(&mut self) -> Result<QueueCounts, ScrapeError> {
            match self.queue.lock().unwrap().pop_front() {
                Some(QueueScript::Lost) => Err(ScrapeError::SessionLost),
                Some(QueueScript::Counts(pairs)) => Ok(pairs
                    .into_iter()
                    .map(|(name, count)| (name.to_string(), count))
                    .collect()),
                None => Ok(QueueCounts::new()),
            }
        }

        async fn fetch_agent_total(&mut self, _agent: &AgentProfile) -> Result<u64, ScrapeError> {
            Ok(self.agent_total)
        }

        async fn fetch_permissions(&mut self, _agent: &AgentProfile) -> Result<String, ScrapeError> {
            Ok("M G".to_string())
        }
    }

    struct ScriptedSessions {
        page: ScriptedPage,
        invalidations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageSource for ScriptedSessions {
        type Page = ScriptedPage;

        async fn ensure_page(&mut self) -> Result<&mut ScriptedPage, ScrapeError> {
            Ok(&mut self.page)
        }

        async fn ephemeral_page(&mut self) -> Result<ScriptedPage, ScrapeError> {
            Ok(ScriptedPage {
                queue: Arc::clone(&self.page.queue),
                agent_total: self.page.agent_total,
            })
        }

        fn invalidate(&mut self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<StatusUpdate>);

    #[async_trait]
    impl StatusSink for ChannelSink {
        async fn push_status(&self, update: &StatusUpdate) -> anyhow::Result<()> {
            let _ = self.0.send(update.clone());
            Ok(())
        }
    }

    /// Zero-delay timings so tests drive ticks as fast as the runtime
    /// polls them.
    fn fast_config(roster: &[(&str, &str)]) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.behavior.poll_interval_seconds = 0;
        config.behavior.error_backoff_seconds = 0;
        for (name, admin_user) in roster {
            config.roster.insert(
                name.to_string(),
                AgentEntry {
                    id: admin_user.to_string(),
                    permission_url: None,
                },
            );
        }
        Arc::new(config)
    }

    struct Harness {
        invalidations: Arc<AtomicUsize>,
        updates: mpsc::UnboundedReceiver<StatusUpdate>,
        commands: mpsc::Sender<Command>,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_loop(
        config: Arc<AppConfig>,
        script: Vec<QueueScript>,
        agent_total: u64,
    ) -> Harness {
        let invalidations = Arc::new(AtomicUsize::new(0));
        let sessions = ScriptedSessions {
            page: ScriptedPage {
                queue: Arc::new(Mutex::new(script.into())),
                agent_total,
            },
            invalidations: Arc::clone(&invalidations),
        };
        let (push_tx, updates) = mpsc::unbounded_channel();
        let (commands, command_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let monitor = MonitorLoop::new(
            config,
            sessions,
            Arc::new(ChannelSink(push_tx)),
            command_rx,
            shutdown.clone(),
        );
        let task = tokio::spawn(monitor.run());
        Harness {
            invalidations,
            updates,
            commands,
            shutdown,
            task,
        }
    }

    impl Harness {
        async fn stop(self) {
            self.shutdown.cancel();
            self.task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn session_lost_discards_the_handle_and_the_loop_continues() {
        let mut harness = spawn_loop(
            fast_config(&[]),
            vec![
                QueueScript::Lost,
                QueueScript::Counts(vec![("general", 10)]),
            ],
            0,
        );

        // the first tick dies on the lost session; the loop backs off,
        // invalidates and the next tick publishes normally
        let update = harness.updates.recv().await.unwrap();
        assert_eq!(harness.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(update.review_counts.unwrap().get("general"), Some(&10));

        harness.stop().await;
    }

    #[tokio::test]
    async fn stopped_tick_publishes_queues_but_no_agent_data() {
        let mut harness = spawn_loop(
            fast_config(&[("nila", "4421")]),
            vec![QueueScript::Counts(vec![("general", 300)])],
            1000,
        );

        let update = harness.updates.recv().await.unwrap();
        assert_eq!(update.is_running, Some(false));
        assert!(update.agent_data.is_none());
        assert_eq!(update.review_counts.unwrap().get("general"), Some(&300));
        // the queue watch still drives the alert machine while stopped
        let logs = update.session_logs.unwrap();
        assert_eq!(logs[0].msg, "Need to clear G");

        harness.stop().await;
    }

    #[tokio::test]
    async fn start_command_enables_agent_publication() {
        let mut harness = spawn_loop(fast_config(&[("nila", "4421")]), vec![], 1000);
        harness
            .commands
            .send(Command::Start { agents: vec![] })
            .await
            .unwrap();

        let update = loop {
            let update = harness.updates.recv().await.unwrap();
            if update.is_running == Some(true) {
                break update;
            }
        };
        let agent_data = update.agent_data.unwrap();
        let metrics = &agent_data["nila"];
        assert_eq!(metrics.total_ads, 1000);
        assert_eq!(metrics.cumulative_new_ads, 0);
        // the first running tick populates the permission cache
        assert_eq!(metrics.permissions, "M G");

        harness.stop().await;
    }
}
