//! Module for removing papers from the library.

use uuid::Uuid;

use super::*;

/// Options for [`Commands::Remove`].
#[derive(Args, Clone)]
pub struct RemoveOptions {
  /// Ids of the papers to remove
  #[arg(required = true)]
  pub ids: Vec<String>,
}

/// Function for the [`Commands::Remove`] in the CLI.
pub async fn remove<I: UserInteraction>(
  interaction: &I,
  library: &Library,
  options: RemoveOptions,
) -> Result<()> {
  let ids =
    options.ids.iter().map(|id| Uuid::parse_str(id)).collect::<core::result::Result<Vec<_>, _>>()?;
  let papers = library.store.load_by_ids(&ids).await?;
  if papers.is_empty() {
    return interaction.reply(ResponseContent::Info("No papers found with the given ids"));
  }
  if papers.len() < ids.len() {
    interaction.reply(ResponseContent::Warning(&format!(
      "{} of the given ids are not in the library",
      ids.len() - papers.len()
    )))?;
  }

  interaction.reply(ResponseContent::Papers(&papers))?;
  if !interaction.confirm(&format!("Remove these {} papers and their files?", papers.len()))? {
    return interaction.reply(ResponseContent::Info("Nothing removed"));
  }

  let found: Vec<Uuid> = papers.iter().map(|paper| paper.id).collect();
  library.pipeline.delete(&found).await;
  interaction.reply(ResponseContent::Success(&format!("Removed {} papers", found.len())))
}
