//! The record store seam.
//!
//! [`RecordStore`] is what the update pipeline persists drafts through. The crate ships
//! [`SqliteStore`](crate::database::SqliteStore); anything that can evaluate the predicate
//! language of [`predicate`](crate::predicate) can stand in for it.

use std::cmp::Ordering;

use super::*;

/// Field drafts are ordered by when loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
  /// Creation time
  #[default]
  AddTime,
  /// Title, case-insensitive
  Title,
  /// Author list, case-insensitive
  Authors,
  /// Publication venue, case-insensitive
  Publication,
  /// Publication year
  PubTime,
}

impl Display for SortKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SortKey::AddTime => write!(f, "addTime"),
      SortKey::Title => write!(f, "title"),
      SortKey::Authors => write!(f, "authors"),
      SortKey::Publication => write!(f, "publication"),
      SortKey::PubTime => write!(f, "pubTime"),
    }
  }
}

impl FromStr for SortKey {
  type Err = ShelfError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "addtime" | "added" => Ok(SortKey::AddTime),
      "title" => Ok(SortKey::Title),
      "authors" => Ok(SortKey::Authors),
      "publication" => Ok(SortKey::Publication),
      "pubtime" | "year" => Ok(SortKey::PubTime),
      s => Err(ShelfError::Config(format!("Unknown sort key: {s}"))),
    }
  }
}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
  /// Smallest first
  Ascending,
  /// Largest first
  #[default]
  Descending,
}

/// Sorts drafts in place. Ties keep their relative order.
pub fn sort_drafts(drafts: &mut [PaperDraft], key: SortKey, order: SortOrder) {
  drafts.sort_by(|a, b| {
    let ordering = compare(a, b, key);
    match order {
      SortOrder::Ascending => ordering,
      SortOrder::Descending => ordering.reverse(),
    }
  });
}

/// Ascending comparison of two drafts on one key.
fn compare(a: &PaperDraft, b: &PaperDraft, key: SortKey) -> Ordering {
  match key {
    SortKey::AddTime => a.add_time.cmp(&b.add_time),
    SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    SortKey::Authors => a.authors.to_lowercase().cmp(&b.authors.to_lowercase()),
    SortKey::Publication => a.publication.to_lowercase().cmp(&b.publication.to_lowercase()),
    SortKey::PubTime => a.pub_time.cmp(&b.pub_time),
  }
}

/// Persistence of paper records.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Whether the store is still starting up. Pipeline operations refuse to run while it is.
  fn is_initializing(&self) -> bool;

  /// Loads the drafts matching a predicate string, sorted.
  ///
  /// An empty predicate matches every record. A trailing `LIMIT(n)` caps the result after
  /// sorting.
  async fn load(
    &self,
    predicate: &str,
    sort_key: SortKey,
    sort_order: SortOrder,
  ) -> Result<Vec<PaperDraft>>;

  /// Loads the drafts with the given ids. Unknown ids are skipped.
  async fn load_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PaperDraft>>;

  /// Inserts or replaces a record.
  ///
  /// Returns the draft as persisted, which may carry a different `main_url` than the one passed
  /// in when the store had to resolve a name clash.
  async fn update(&self, draft: &PaperDraft) -> Result<PaperDraft>;

  /// Removes the records with the given ids and returns the file names they referenced.
  async fn delete(&self, ids: &[Uuid]) -> Result<Vec<String>>;
}
