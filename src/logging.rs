//! File logging. Stdout belongs to the terminal UI, so everything goes to a
//! daily rolling file under the data directory.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TABVIEW_LOG";

pub fn log_directory() -> PathBuf {
  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("tabview")
    .join("logs")
}

/// Install the subscriber. The returned guard flushes on drop and must be
/// held until exit.
pub fn init() -> Result<WorkerGuard> {
  let log_dir = log_directory();
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let env_filter =
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  let file_appender = tracing_appender::rolling::daily(&log_dir, "tabview.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(env_filter)
    .with(
      fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  tracing::info!(log_dir = %log_dir.display(), "Logging initialized");
  Ok(guard)
}
