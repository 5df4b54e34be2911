//! Module for setting up a [`shelf`] library

use super::*;

/// Options for [`Commands::Init`].
#[derive(Args, Clone)]
pub struct InitOptions {
  /// Where imported documents are stored
  #[arg(long)]
  pub storage_path: Option<PathBuf>,
}

/// Function for the [`Commands::Init`] in the CLI.
pub async fn init<I: UserInteraction>(
  interaction: &I,
  config: Config,
  config_file: &Path,
  options: InitOptions,
) -> Result<()> {
  let config = match options.storage_path {
    Some(storage_path) => config.with_storage_path(storage_path),
    None => config,
  };

  if tokio::fs::try_exists(&config.database_path).await?
    && !interaction.confirm(&format!(
      "A library already exists at {}. Keep using it?",
      config.database_path.display()
    ))?
  {
    interaction.reply(ResponseContent::Info(
      "Choose a different location for the new library using --path",
    ))?;
    return Ok(());
  }

  config.save(config_file).await?;
  let library = Library::open(config).await?;
  info!(config = %config_file.display(), "Initialized library");

  interaction.reply(ResponseContent::Success(&format!(
    "Library initialized\nConfig path: {}\nDatabase path: {}\nDocument storage path: {}",
    config_file.display(),
    library.config.database_path.display(),
    library.config.storage_path.display(),
  )))
}
