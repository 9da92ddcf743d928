//! Logging system configuration and initialization
//!
//! Console and rotating file output via tracing-subscriber, with
//! module-level filter control from the configuration file and timestamps
//! rendered in the portal timezone (Asia/Dhaka, UTC+6).

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use lazy_static::lazy_static;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::infrastructure::config::LoggingConfig;
use crate::utils;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Timestamps in the portal timezone so log lines line up with the
/// published snapshot labels.
struct PortalTimeFormatter;

impl FormatTime for PortalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let local = Utc::now().with_timezone(&utils::portal_offset());
        write!(w, "{}", local.format("%Y-%m-%d %H:%M:%S%.3f %z"))
    }
}

/// Log directory next to the executable.
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    exe_dir.join("logs")
}

/// Initialize logging with custom configuration.
///
/// `RUST_LOG` overrides the configured level and module filters entirely.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) => EnvFilter::new(spec),
        Err(_) => {
            let mut spec = config.level.clone();
            for (module, level) in &config.module_filters {
                spec.push_str(&format!(",{module}={level}"));
            }
            EnvFilter::new(spec)
        }
    };

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_timer(PortalTimeFormatter)
            .with_target(false)
    });

    let file_layer = if config.file_output {
        let log_dir = get_log_directory();
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {log_dir:?}: {e}"))?;
        let appender = rolling::daily(log_dir, "portal-sentinel.log");
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard mutex poisoned"))?
            .push(guard);
        Some(
            fmt::layer()
                .with_timer(PortalTimeFormatter)
                .with_ansi(false)
                .with_writer(writer),
        )
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}
