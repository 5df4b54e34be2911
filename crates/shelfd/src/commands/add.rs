//! Module for importing documents into the library.

use super::*;

/// Options for [`Commands::Add`].
#[derive(Args, Clone)]
pub struct AddOptions {
  /// Files or glob patterns to import, e.g. `"~/Downloads/*.pdf"`
  #[arg(required = true)]
  pub patterns: Vec<String>,

  /// Tag the imported papers with this name
  #[arg(long)]
  pub tag: Option<String>,
}

/// Expands glob patterns into the files they name.
///
/// A pattern without glob metacharacters names a file directly. Directories are skipped.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for pattern in patterns {
    let mut matched = false;
    for entry in glob::glob(pattern)? {
      match entry {
        Ok(path) if path.is_file() => {
          matched = true;
          if !files.contains(&path) {
            files.push(path);
          }
        },
        Ok(_) => {},
        Err(e) => warn!(pattern = %pattern, error = %e, "Unreadable path while expanding pattern"),
      }
    }
    if !matched {
      warn!(pattern = %pattern, "Pattern matched no files");
    }
  }
  Ok(files)
}

/// Function for the [`Commands::Add`] in the CLI.
pub async fn add<I: UserInteraction>(
  interaction: &I,
  library: &Library,
  options: AddOptions,
) -> Result<()> {
  let AddOptions { patterns, tag } = options;
  let files = expand_patterns(&patterns)?;
  if files.is_empty() {
    return interaction.reply(ResponseContent::Warning("No files matched the given patterns"));
  }
  interaction.reply(ResponseContent::Info(&format!("Importing {} files", files.len())))?;

  let requested = files.len();
  let created = match tag {
    Some(name) => {
      let tag = Categorizer::tag(name);
      library.pipeline.create_into_categorizer(files, &tag, CategorizerKind::Tag).await
    },
    None => library.pipeline.create(files).await,
  };
  library.pipeline.flush_cache_refreshes().await;

  if !created.is_empty() {
    interaction.reply(ResponseContent::Papers(&created))?;
  }
  if created.len() < requested {
    interaction.reply(ResponseContent::Warning(&format!(
      "{} of {requested} files could not be imported, run with -v for details",
      requested - created.len()
    )))?;
  }
  interaction.reply(ResponseContent::Success(&format!("Imported {} papers", created.len())))
}
