//! Module for copying records out of another library database.

use shelf::{database::SqliteStore, event::EventBus};

use super::*;

/// Options for [`Commands::Migrate`].
#[derive(Args, Clone)]
pub struct MigrateOptions {
  /// The library database to copy from
  #[arg(long)]
  pub from: PathBuf,
}

/// Function for the [`Commands::Migrate`] in the CLI.
///
/// Records keep their ids, so migrating the same source twice updates instead of duplicating.
/// File references are carried over as they are; both libraries are expected to share the
/// document storage.
pub async fn migrate<I: UserInteraction>(
  interaction: &I,
  library: &Library,
  options: MigrateOptions,
) -> Result<()> {
  if !tokio::fs::try_exists(&options.from).await? {
    return interaction.reply(ResponseContent::Warning(&format!(
      "No library database at {}",
      options.from.display()
    )));
  }
  let source = SqliteStore::open(&options.from, EventBus::default()).await?;

  let migrated = library.pipeline.migrate(&source).await;
  library.pipeline.flush_cache_refreshes().await;
  interaction.reply(ResponseContent::Success(&format!("Migrated {} papers", migrated.len())))
}
