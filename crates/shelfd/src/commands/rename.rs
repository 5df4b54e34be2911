//! Module for renaming managed files after their titles.

use super::*;

/// Function for the [`Commands::RenameAll`] in the CLI.
pub async fn rename_all<I: UserInteraction>(interaction: &I, library: &Library) -> Result<()> {
  if !interaction.confirm("Rename every stored document after its paper's title?")? {
    return interaction.reply(ResponseContent::Info("Nothing renamed"));
  }
  let renamed = library.pipeline.rename_all().await;
  library.pipeline.flush_cache_refreshes().await;
  interaction.reply(ResponseContent::Success(&format!("Renamed files of {} papers", renamed.len())))
}
