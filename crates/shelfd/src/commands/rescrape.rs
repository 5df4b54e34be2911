//! Module for running the preprint rescrape on demand.

use chrono::DateTime;
use shelf::{
  preference::{PreferenceKey, PreferenceValue},
  scheduler::RescrapeOutcome,
};

use super::*;

/// Options for [`Commands::Rescrape`].
#[derive(Args, Clone)]
pub struct RescrapeOptions {
  /// Run even if the last rescrape is recent
  #[arg(long)]
  pub force: bool,
}

/// Function for the [`Commands::Rescrape`] in the CLI.
pub async fn rescrape<I: UserInteraction>(
  interaction: &I,
  library: &Library,
  options: RescrapeOptions,
) -> Result<()> {
  if options.force {
    library.preferences.set(PreferenceKey::LastRematchTime, PreferenceValue::Integer(0)).await?;
  }

  let outcome = library.scheduler.fire().await;
  library.pipeline.flush_cache_refreshes().await;

  match outcome {
    RescrapeOutcome::Completed { count } => {
      interaction.reply(ResponseContent::Success(&format!("Rescraped {count} preprints")))
    },
    RescrapeOutcome::TooSoon => {
      let last = library.preferences.get(PreferenceKey::LastRematchTime).await?;
      let last = last
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();
      interaction.reply(ResponseContent::Info(&format!(
        "Preprints were last rescraped {last}, use --force to rescrape anyway"
      )))
    },
    RescrapeOutcome::Disabled => {
      interaction.reply(ResponseContent::Info("Routine rescrape is switched off"))
    },
    RescrapeOutcome::AlreadyRunning => {
      interaction.reply(ResponseContent::Info("A rescrape is already running"))
    },
    RescrapeOutcome::TimedOut => {
      interaction.reply(ResponseContent::Warning("Rescrape exceeded its timeout and was abandoned"))
    },
    RescrapeOutcome::Failed(reason) => {
      interaction.reply(ResponseContent::Warning(&format!("Rescrape failed: {reason}")))
    },
  }
}
