//! Paper drafts and the categorizers they can be filed under.
//!
//! A [`PaperDraft`] is the in-memory, not-yet-confirmed-persisted copy of a paper record. Drafts
//! are created by an import (a scrape of a new file) or by cloning a persisted record before
//! mutating it, and they are what every pipeline operation consumes and returns.
//!
//! File references on a draft go through a lifecycle:
//!
//! - an absolute filesystem path while the file is in transit (a fresh import),
//! - the managed base name once the file lives in managed storage and the record is persisted,
//! - the empty string when the draft has no file.
//!
//! # Examples
//!
//! ```
//! use shelf::entity::{Categorizer, PaperDraft};
//!
//! let mut draft = PaperDraft::new("Attention Is All You Need").with_main_url("/tmp/attention.pdf");
//! draft.tags.push(Categorizer::tag("transformers"));
//!
//! assert!(draft.has_transit_main_file());
//! assert_eq!(draft.tags.len(), 1);
//! ```

use super::*;

/// Maximum number of characters of a title kept in a managed file name.
pub const FILENAME_TITLE_LIMIT: usize = 50;

/// A mutable bibliographic record travelling through the update pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDraft {
  /// Stable identity of the record
  pub id:                 Uuid,
  /// The paper's full title
  pub title:              String,
  /// Author list as displayed, e.g. `"Ada Lovelace, Charles Babbage"`
  pub authors:            String,
  /// Publication venue; empty when unknown
  pub publication:        String,
  /// Publication year as text
  pub pub_time:           String,
  /// Optional DOI reference
  pub doi:                Option<String>,
  /// Optional arXiv identifier
  pub arxiv:              Option<String>,
  /// Free-form user note
  pub note:               String,
  /// User flag ("starred")
  pub flag:               bool,
  /// When the record was first created
  pub add_time:           DateTime<Utc>,
  /// Tag memberships, order irrelevant
  pub tags:               Vec<Categorizer>,
  /// Folder memberships, order irrelevant
  pub folders:            Vec<Categorizer>,
  /// Primary file reference
  pub main_url:           String,
  /// Supplementary file references
  pub supplementary_urls: Vec<String>,
}

impl Default for PaperDraft {
  fn default() -> Self {
    Self {
      id:                 Uuid::new_v4(),
      title:              String::new(),
      authors:            String::new(),
      publication:        String::new(),
      pub_time:           String::new(),
      doi:                None,
      arxiv:              None,
      note:               String::new(),
      flag:               false,
      add_time:           Utc::now(),
      tags:               Vec::new(),
      folders:            Vec::new(),
      main_url:           String::new(),
      supplementary_urls: Vec::new(),
    }
  }
}

impl PaperDraft {
  /// Creates an empty draft with a fresh identity and the given title.
  pub fn new(title: impl Into<String>) -> Self { Self { title: title.into(), ..Self::default() } }

  /// Sets the primary file reference.
  pub fn with_main_url(mut self, url: impl Into<String>) -> Self {
    self.main_url = url.into();
    self
  }

  /// Appends a supplementary file reference.
  pub fn with_supplementary(mut self, url: impl Into<String>) -> Self {
    self.supplementary_urls.push(url.into());
    self
  }

  /// Memberships of the given kind.
  pub fn memberships(&self, kind: CategorizerKind) -> &[Categorizer] {
    match kind {
      CategorizerKind::Tag => &self.tags,
      CategorizerKind::Folder => &self.folders,
    }
  }

  /// Mutable memberships of the given kind.
  pub fn memberships_mut(&mut self, kind: CategorizerKind) -> &mut Vec<Categorizer> {
    match kind {
      CategorizerKind::Tag => &mut self.tags,
      CategorizerKind::Folder => &mut self.folders,
    }
  }

  /// Whether the primary file reference is still an absolute (unmanaged) path.
  pub fn has_transit_main_file(&self) -> bool {
    !self.main_url.is_empty() && Path::new(&self.main_url).is_absolute()
  }

  /// Every non-empty file reference, primary first.
  pub fn file_urls(&self) -> Vec<String> {
    std::iter::once(&self.main_url)
      .chain(self.supplementary_urls.iter())
      .filter(|url| !url.is_empty())
      .cloned()
      .collect()
  }

  /// The stem every managed file of this draft is named after.
  ///
  /// Combines the formatted title with the first block of the id so two papers with the same
  /// title never share a managed name.
  pub fn filename_stem(&self) -> String {
    let id = self.id.simple().to_string();
    let title = format_title(&self.title, Some(FILENAME_TITLE_LIMIT));
    if title.is_empty() {
      id[..8].to_string()
    } else {
      format!("{}_{}", title, &id[..8])
    }
  }
}

/// Formats a title into a filesystem-safe string.
///
/// Alphanumeric characters are kept, every run of anything else collapses into one `_`, and the
/// result is truncated to `max_length` characters (default 50) without a trailing separator.
///
/// ```
/// use shelf::entity::format_title;
///
/// assert_eq!(format_title("Deep Learning: A Survey", None), "Deep_Learning_A_Survey");
/// assert_eq!(format_title("  ", None), "");
/// ```
pub fn format_title(title: &str, max_length: Option<usize>) -> String {
  let max_length = max_length.unwrap_or(FILENAME_TITLE_LIMIT);
  let mut formatted = String::with_capacity(title.len());
  for c in title.chars() {
    if c.is_alphanumeric() {
      formatted.push(c);
    } else if !formatted.is_empty() && !formatted.ends_with('_') {
      formatted.push('_');
    }
  }
  let truncated: String = formatted.chars().take(max_length).collect();
  truncated.trim_end_matches('_').to_string()
}

/// The two kinds of categorizer a draft can hold memberships of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategorizerKind {
  /// A free-form label
  Tag,
  /// A user folder
  Folder,
}

impl Display for CategorizerKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CategorizerKind::Tag => write!(f, "tag"),
      CategorizerKind::Folder => write!(f, "folder"),
    }
  }
}

impl FromStr for CategorizerKind {
  type Err = ShelfError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "tag" => Ok(CategorizerKind::Tag),
      "folder" => Ok(CategorizerKind::Folder),
      s => Err(ShelfError::Config(format!("Unknown categorizer kind: {s}"))),
    }
  }
}

/// A named classification entity (tag or folder).
///
/// Membership identity is the categorizer's `id`; two categorizers with the same name but
/// different ids are distinct until the record store resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Categorizer {
  /// Stable identity
  pub id:   Uuid,
  /// Display name
  pub name: String,
  /// Tag or folder
  pub kind: CategorizerKind,
}

impl Categorizer {
  /// Creates a categorizer with a fresh identity.
  pub fn new(kind: CategorizerKind, name: impl Into<String>) -> Self {
    Self { id: Uuid::new_v4(), name: name.into(), kind }
  }

  /// Creates a tag.
  pub fn tag(name: impl Into<String>) -> Self { Self::new(CategorizerKind::Tag, name) }

  /// Creates a folder.
  pub fn folder(name: impl Into<String>) -> Self { Self::new(CategorizerKind::Folder, name) }
}
