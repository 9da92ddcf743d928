//! Portal sentinel binary: wire configuration, logging, the realtime
//! sink and the supervised monitor loop together, then run until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use portal_sentinel::application::MonitorLoop;
use portal_sentinel::infrastructure::{
    config::ConfigManager,
    logging::init_logging_with_config,
    realtime_sink::{spawn_command_poller, RealtimeDbClient},
    session::SessionManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = Arc::new(manager.initialize_on_first_run().await?);

    init_logging_with_config(&config.logging)?;
    info!("⚙️ Configuration loaded from {:?}", manager.config_path);
    if config.roster.is_empty() {
        info!("ℹ️ Roster is empty; tracking commands will have nothing to select");
    }

    let sink = Arc::new(RealtimeDbClient::new(&config.sink).context("sink setup failed")?);
    let shutdown = CancellationToken::new();

    let (command_tx, command_rx) = mpsc::channel(16);
    let poller = spawn_command_poller(
        Arc::clone(&sink),
        command_tx,
        Duration::from_secs(config.sink.command_poll_seconds),
        shutdown.clone(),
    );

    let sessions = SessionManager::new(Arc::clone(&config));
    let monitor = MonitorLoop::new(
        Arc::clone(&config),
        sessions,
        sink,
        command_rx,
        shutdown.clone(),
    );
    let monitor = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("🛑 Shutdown requested");
    shutdown.cancel();

    if let Err(err) = monitor.await {
        error!("Monitor task panicked: {err}");
    }
    if let Err(err) = poller.await {
        error!("Command poller task panicked: {err}");
    }
    info!("👋 Portal sentinel exited cleanly");
    Ok(())
}
