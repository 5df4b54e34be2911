//! Terminal output and confirmations.

use console::style;
use dialoguer::Confirm;

use super::*;

/// Prefix for information messages
pub static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
pub static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
pub static WARNING_PREFIX: &str = "⚠️ ";
/// Prefix for error messages
pub static ERROR_PREFIX: &str = "✗ ";
/// Prefix for user prompts
pub static PROMPT_PREFIX: &str = "❯ ";
/// Branch character for tree structure
pub static TREE_BRANCH: &str = "├";
/// Leaf character for tree structure (end of branch)
pub static TREE_LEAF: &str = "└";

/// Something a command reports back to the user.
#[derive(Debug)]
pub enum ResponseContent<'a> {
  /// One paper with its details
  Paper(&'a PaperDraft),
  /// A list of papers, one line each
  Papers(&'a [PaperDraft]),
  /// The command did what it was asked
  Success(&'a str),
  /// Neutral information
  Info(&'a str),
  /// Something the user should look at
  Warning(&'a str),
}

/// How commands talk to the user.
pub trait UserInteraction {
  /// Asks a yes/no question.
  fn confirm(&self, message: &str) -> Result<bool>;

  /// Shows a response.
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

/// [`UserInteraction`] on the terminal.
pub struct Terminal {
  /// Answer every question with yes instead of prompting
  accept_defaults: bool,
}

impl Terminal {
  /// Creates a terminal interaction.
  pub fn new(accept_defaults: bool) -> Self { Self { accept_defaults } }
}

impl UserInteraction for Terminal {
  fn confirm(&self, message: &str) -> Result<bool> {
    if self.accept_defaults {
      return Ok(true);
    }
    Ok(
      Confirm::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .default(false)
        .interact()?,
    )
  }

  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Paper(paper) => print_paper(paper),
      ResponseContent::Papers(papers) => {
        for paper in papers {
          let (branch, title) = (style(TREE_BRANCH).dim(), style(&paper.title).bold());
          println!("{branch} {title} {}", style(paper.id).dim());
        }
        println!("{} {} papers", style(TREE_LEAF).dim(), papers.len());
      },
      ResponseContent::Success(message) => println!("{} {message}", style(SUCCESS_PREFIX).green()),
      ResponseContent::Info(message) => println!("{} {message}", style(INFO_PREFIX).cyan()),
      ResponseContent::Warning(message) => println!("{} {message}", style(WARNING_PREFIX).yellow()),
    }
    Ok(())
  }
}

/// Prints a paper as a small tree of its non-empty fields.
fn print_paper(paper: &PaperDraft) {
  let fields = [
    ("Authors", paper.authors.clone()),
    ("Publication", paper.publication.clone()),
    ("Year", paper.pub_time.clone()),
    ("File", paper.main_url.clone()),
    ("Tags", names(&paper.tags)),
    ("Folders", names(&paper.folders)),
    ("Id", paper.id.to_string()),
  ];
  let fields: Vec<_> = fields.into_iter().filter(|(_, value)| !value.is_empty()).collect();

  println!("{}{}", style(if paper.flag { "★ " } else { "" }).yellow(), style(&paper.title).bold());
  for (index, (label, value)) in fields.iter().enumerate() {
    let glyph = if index + 1 == fields.len() { TREE_LEAF } else { TREE_BRANCH };
    println!("{} {}: {value}", style(glyph).dim(), style(label).cyan());
  }
}

/// Comma separated categorizer names.
fn names(categorizers: &[Categorizer]) -> String {
  categorizers.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
}
