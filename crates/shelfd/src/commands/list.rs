//! Module for listing and searching papers.

use shelf::{
  filter::{FilterOptions, SearchMode},
  store::{SortKey, SortOrder},
};

use super::*;

/// Options for [`Commands::List`].
#[derive(Args, Clone)]
pub struct ListOptions {
  /// Search string, interpreted according to `--mode`
  #[arg(long, short)]
  pub search: Option<String>,

  /// Search mode: general, fulltext or advanced
  #[arg(long, default_value = "general")]
  pub mode: String,

  /// Only flagged papers
  #[arg(long)]
  pub flagged: bool,

  /// Only papers with this tag
  #[arg(long)]
  pub tag: Option<String>,

  /// Only papers in this folder
  #[arg(long)]
  pub folder: Option<String>,

  /// Show at most this many papers
  #[arg(long)]
  pub limit: Option<usize>,

  /// Sort key: added, title, authors, publication or year
  #[arg(long, default_value = "added")]
  pub sort: String,

  /// Sort in descending order
  #[arg(long)]
  pub desc: bool,

  /// Show every field of each paper
  #[arg(long)]
  pub detailed: bool,
}

impl ListOptions {
  /// The filter these options describe.
  pub fn filter(&self) -> Result<FilterOptions> {
    Ok(FilterOptions {
      search:       self.search.clone().unwrap_or_default(),
      search_mode:  self.mode.parse::<SearchMode>()?,
      flagged_only: self.flagged,
      tag:          self.tag.clone(),
      folder:       self.folder.clone(),
      limit:        self.limit,
    })
  }
}

/// Function for the [`Commands::List`] in the CLI.
pub async fn list<I: UserInteraction>(
  interaction: &I,
  library: &Library,
  options: ListOptions,
) -> Result<()> {
  let filter = options.filter()?;
  let sort_key = options.sort.parse::<SortKey>()?;
  let sort_order = if options.desc { SortOrder::Descending } else { SortOrder::Ascending };
  debug!(predicate = %filter.compile(), %sort_key, "Listing papers");

  let papers = library.pipeline.load(&filter, sort_key, sort_order).await;
  if papers.is_empty() {
    return interaction.reply(ResponseContent::Info("No papers found"));
  }
  if options.detailed {
    for paper in &papers {
      interaction.reply(ResponseContent::Paper(paper))?;
    }
    Ok(())
  } else {
    interaction.reply(ResponseContent::Papers(&papers))
  }
}
