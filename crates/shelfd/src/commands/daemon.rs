//! Module for running the rescrape scheduler as a long-lived process.

use tracing_appender::non_blocking::WorkerGuard;

use super::*;

/// Name prefix of the daily log files.
const LOG_FILE_NAME: &str = "shelfd.log";

/// Logs to a daily rolling file in `log_dir`. Logging stops when the guard is dropped.
fn setup_file_logging(verbosity: u8, log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)?;
  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(log_filter(verbosity.max(2)))
    .with_writer(non_blocking)
    .with_ansi(false)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .init();
  Ok(guard)
}

/// Function for the [`Commands::Daemon`] in the CLI.
///
/// Logs go to a `logs` directory next to the library database, at info level or above.
pub async fn daemon<I: UserInteraction>(
  interaction: &I,
  config: Config,
  verbosity: u8,
) -> Result<()> {
  let log_dir = config
    .database_path
    .parent()
    .map(|dir| dir.join("logs"))
    .unwrap_or_else(|| Config::default_data_dir().join("logs"));
  let _guard = setup_file_logging(verbosity, &log_dir)?;

  let library = Library::open(config).await?;
  let task = library.scheduler.arm();
  interaction.reply(ResponseContent::Success(&format!(
    "Rescrape daemon running, logging to {}. Press Ctrl-C to stop.",
    log_dir.display()
  )))?;

  tokio::signal::ctrl_c().await?;
  info!("Shutting down rescrape daemon");
  task.abort();
  library.pipeline.flush_cache_refreshes().await;
  interaction.reply(ResponseContent::Info("Rescrape daemon stopped"))
}
