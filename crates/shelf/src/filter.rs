//! Compiles structured filter options into a predicate string.
//!
//! [`FilterOptions`] is the typed description of what a user is looking at: a free-text search
//! in one of three [`SearchMode`]s plus optional flagged, tag, folder and limit constraints.
//! [`FilterOptions::compile`] renders it into the predicate language understood by
//! [`Predicate`](crate::predicate::Predicate) and the record store.
//!
//! Compilation is a pure function of the current options (and the clock, for relative dates):
//! every call recomputes the clause list from scratch, so compiling the same options twice never
//! double-applies anything.
//!
//! # Examples
//!
//! ```
//! use shelf::filter::{FilterOptions, SearchMode};
//!
//! let options = FilterOptions::default().with_search("graph networks").flagged();
//! let compiled = options.compile();
//! assert!(compiled.starts_with(r#"(title LIKE[c] "*graph*networks*" OR authors LIKE[c]"#));
//! assert!(compiled.ends_with(" AND (flag == true)"));
//!
//! assert_eq!(FilterOptions::default().compile(), "");
//! ```

use super::*;
use crate::predicate::TIMESTAMP_FORMAT;

lazy_static! {
  /// A comparison operator directly followed by a relative date macro.
  static ref OPERATOR_BEFORE_MACRO: Regex =
    Regex::new(r"(<=|>=|<|>)(\s*)(\[\s*\d+\s+DAYS\s*\])").unwrap();
  /// The relative date macro itself, `[<N> DAYS]`.
  static ref DAYS_MACRO: Regex = Regex::new(r"\[\s*(\d+)\s+DAYS\s*\]").unwrap();
  /// A trailing limit directive inside a raw advanced expression.
  static ref TRAILING_LIMIT: Regex = Regex::new(r"(?i)\s*LIMIT\s*\(\s*(\d+)\s*\)\s*$").unwrap();
}

/// Fields searched by general mode.
const GENERAL_FIELDS: [&str; 4] = ["title", "authors", "publication", "note"];

/// How the free-text search string is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
  /// Wildcard match across title, authors, publication and note
  #[default]
  General,
  /// Substring match against the extracted document text
  Fulltext,
  /// The search string is a raw predicate expression
  Advanced,
}

impl Display for SearchMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SearchMode::General => write!(f, "general"),
      SearchMode::Fulltext => write!(f, "fulltext"),
      SearchMode::Advanced => write!(f, "advanced"),
    }
  }
}

impl FromStr for SearchMode {
  type Err = ShelfError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "general" => Ok(SearchMode::General),
      "fulltext" => Ok(SearchMode::Fulltext),
      "advanced" => Ok(SearchMode::Advanced),
      s => Err(ShelfError::Config(format!("Unknown search mode: {s}"))),
    }
  }
}

/// Structured query state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
  /// Free-text search, interpreted according to `search_mode`
  pub search:       String,
  /// Interpretation of `search`
  pub search_mode:  SearchMode,
  /// Only flagged drafts
  pub flagged_only: bool,
  /// Only drafts holding a tag with this name
  pub tag:          Option<String>,
  /// Only drafts holding a folder with this name
  pub folder:       Option<String>,
  /// Maximum number of results
  pub limit:        Option<usize>,
}

/// A partial update of [`FilterOptions`]; `None` leaves a field untouched.
///
/// `tag` and `folder` are doubly optional so a patch can clear them (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
  /// New search string
  pub search:       Option<String>,
  /// New search mode
  pub search_mode:  Option<SearchMode>,
  /// New flagged toggle
  pub flagged_only: Option<bool>,
  /// New tag constraint
  pub tag:          Option<Option<String>>,
  /// New folder constraint
  pub folder:       Option<Option<String>>,
  /// New limit
  pub limit:        Option<Option<usize>>,
}

impl FilterOptions {
  /// Sets the search string.
  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = search.into();
    self
  }

  /// Sets the search mode.
  pub fn with_mode(mut self, mode: SearchMode) -> Self {
    self.search_mode = mode;
    self
  }

  /// Restricts to flagged drafts.
  pub fn flagged(mut self) -> Self {
    self.flagged_only = true;
    self
  }

  /// Restricts to drafts holding the named tag.
  pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
    self.tag = Some(tag.into());
    self
  }

  /// Restricts to drafts in the named folder.
  pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
    self.folder = Some(folder.into());
    self
  }

  /// Caps the number of results.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Applies a partial update field by field.
  pub fn apply(&mut self, patch: FilterPatch) {
    let FilterPatch { search, search_mode, flagged_only, tag, folder, limit } = patch;
    if let Some(search) = search {
      self.search = search;
    }
    if let Some(search_mode) = search_mode {
      self.search_mode = search_mode;
    }
    if let Some(flagged_only) = flagged_only {
      self.flagged_only = flagged_only;
    }
    if let Some(tag) = tag {
      self.tag = tag;
    }
    if let Some(folder) = folder {
      self.folder = folder;
    }
    if let Some(limit) = limit {
      self.limit = limit;
    }
  }

  /// The search string with newlines removed and surrounding whitespace trimmed.
  pub fn sanitized_search(&self) -> String {
    self.search.replace(['\r', '\n'], "").trim().to_string()
  }

  /// Compiles the options against the current time.
  pub fn compile(&self) -> String { self.compile_at(Utc::now()) }

  /// Compiles the options, resolving relative dates against `now`.
  pub fn compile_at(&self, now: DateTime<Utc>) -> String {
    let (clauses, limit) = self.clauses_at(now);

    let mut predicate =
      clauses.iter().map(|clause| format!("({clause})")).collect::<Vec<_>>().join(" AND ");

    if let Some(limit) = limit {
      if predicate.is_empty() {
        predicate.push_str("TRUEPREDICATE");
      }
      predicate.push_str(&format!(" LIMIT({limit})"));
    }

    trace!(predicate = %predicate, "Compiled filter options");
    predicate
  }

  /// The ordered predicate clauses and the effective limit.
  pub fn clauses_at(&self, now: DateTime<Utc>) -> (Vec<String>, Option<usize>) {
    let mut clauses = Vec::new();
    let mut limit = self.limit;
    let search = self.sanitized_search();

    if !search.is_empty() {
      match self.search_mode {
        SearchMode::General => {
          let pattern = format!("*{}*", search.split_whitespace().collect::<Vec<_>>().join("*"));
          let literal = quote(&pattern);
          clauses.push(
            GENERAL_FIELDS
              .iter()
              .map(|field| format!("{field} LIKE[c] {literal}"))
              .collect::<Vec<_>>()
              .join(" OR "),
          );
        },
        SearchMode::Fulltext => clauses.push(format!("fulltext CONTAINS[c] {}", quote(&search))),
        SearchMode::Advanced => {
          let (expression, inline_limit) = split_trailing_limit(&search);
          limit = limit.or(inline_limit);
          let expression = expand_relative_dates(&expression, now);
          if !expression.trim().is_empty() {
            clauses.push(expression);
          }
        },
      }
    }

    if self.flagged_only {
      clauses.push("flag == true".to_string());
    }
    if let Some(tag) = self.tag.as_deref().filter(|tag| !tag.is_empty()) {
      clauses.push(format!("ANY tags.name == {}", quote(tag)));
    }
    if let Some(folder) = self.folder.as_deref().filter(|folder| !folder.is_empty()) {
      clauses.push(format!("ANY folders.name == {}", quote(folder)));
    }

    (clauses, limit)
  }
}

impl From<FilterPatch> for FilterOptions {
  fn from(patch: FilterPatch) -> Self {
    let mut options = Self::default();
    options.apply(patch);
    options
  }
}

/// Renders a string literal with `"` and `\` escaped.
fn quote(value: &str) -> String {
  format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Lifts a trailing `LIMIT(n)` out of a raw expression.
fn split_trailing_limit(expression: &str) -> (String, Option<usize>) {
  match TRAILING_LIMIT.captures(expression) {
    Some(captures) => {
      let limit = captures.get(1).and_then(|m| m.as_str().parse().ok());
      let start = captures.get(0).map_or(expression.len(), |m| m.start());
      (expression[..start].to_string(), limit)
    },
    None => (expression.to_string(), None),
  }
}

/// Expands every `[<N> DAYS]` macro into the timestamp `now - N days`.
///
/// A comparison operator directly in front of a macro is inverted first, because the macro
/// resolves to a fixed point in the past while the user reads it relative to today: "added more
/// than 3 days ago" is written `addTime > [3 DAYS]` and means `addTime < (now - 3 days)`.
pub fn expand_relative_dates(expression: &str, now: DateTime<Utc>) -> String {
  let inverted = OPERATOR_BEFORE_MACRO.replace_all(expression, |captures: &regex::Captures| {
    let operator = match &captures[1] {
      "<" => ">",
      "<=" => ">=",
      ">" => "<",
      ">=" => "<=",
      other => other,
    }
    .to_string();
    format!("{operator}{}{}", &captures[2], &captures[3])
  });

  DAYS_MACRO
    .replace_all(&inverted, |captures: &regex::Captures| {
      let resolved = captures[1]
        .parse::<i64>()
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|delta| now.checked_sub_signed(delta));
      match resolved {
        Some(time) => time.format(TIMESTAMP_FORMAT).to_string(),
        // Left in place so the predicate parser rejects it.
        None => {
          warn!(days = &captures[1], "Relative date is out of range");
          captures[0].to_string()
        },
      }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::predicate::Predicate;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap() }

  #[test]
  fn test_empty_options_compile_to_empty_predicate() {
    assert_eq!(FilterOptions::default().compile(), "");
    assert_eq!(FilterOptions::default().with_search(" \n ").compile(), "");
    assert_eq!(FilterOptions::default().with_tag("").compile(), "");
  }

  #[test]
  fn test_general_mode_matches_tokens_in_order() {
    let predicate = Predicate::parse(&FilterOptions::default().with_search("foo bar").compile())
      .unwrap();

    let mut draft = PaperDraft::new("A FOO walks into a Bar");
    assert!(predicate.matches(&draft));

    draft.title = "bar before foo".into();
    assert!(!predicate.matches(&draft));

    draft.note = "some foo, then some bar".into();
    assert!(predicate.matches(&draft));
  }

  #[test]
  fn test_general_mode_strips_newlines() {
    let options = FilterOptions::default().with_search("\n graph \nnetworks \n");
    let (clauses, _) = options.clauses_at(now());
    assert!(clauses[0].starts_with(r#"title LIKE[c] "*graph*networks*""#));
  }

  #[test]
  fn test_general_mode_escapes_quotes() {
    let compiled = FilterOptions::default().with_search(r#"say "hi""#).compile();
    let predicate = Predicate::parse(&compiled).unwrap();
    assert!(predicate.matches(&PaperDraft::new(r#"They say "hi" a lot"#)));
  }

  #[test]
  fn test_fulltext_mode_ignores_general_fields() {
    let compiled =
      FilterOptions::default().with_search("entropy").with_mode(SearchMode::Fulltext).compile();
    assert_eq!(compiled, r#"(fulltext CONTAINS[c] "entropy")"#);
  }

  #[test]
  fn test_relative_date_inverts_greater_than() {
    let compiled = FilterOptions::default()
      .with_search("addTime > [3 DAYS]")
      .with_mode(SearchMode::Advanced)
      .compile_at(now());
    assert_eq!(compiled, "(addTime < 2024-03-07@12:00:00)");
  }

  #[test]
  fn test_relative_date_inverts_less_than() {
    let compiled = FilterOptions::default()
      .with_search("addTime < [3 DAYS]")
      .with_mode(SearchMode::Advanced)
      .compile_at(now());
    assert_eq!(compiled, "(addTime > 2024-03-07@12:00:00)");
  }

  #[test]
  fn test_relative_date_inverts_inclusive_operators() {
    assert_eq!(expand_relative_dates("addTime >= [1 DAYS]", now()), "addTime <= 2024-03-09@12:00:00");
    assert_eq!(expand_relative_dates("addTime <=[1 DAYS]", now()), "addTime >=2024-03-09@12:00:00");
  }

  #[test]
  fn test_relative_date_without_operator_is_only_substituted() {
    assert_eq!(expand_relative_dates("addTime == [0 DAYS]", now()), "addTime == 2024-03-10@12:00:00");
  }

  #[traced_test]
  #[test]
  fn test_out_of_range_relative_date_is_left_unexpanded() {
    let compiled = FilterOptions::default()
      .with_search("addTime > [100000000 DAYS]")
      .with_mode(SearchMode::Advanced)
      .compile_at(now());
    assert_eq!(compiled, "(addTime < [100000000 DAYS])");
    assert!(Predicate::parse(&compiled).is_err());
    assert!(logs_contain("Relative date is out of range"));

    let overflowing = "addTime > [99999999999999999999 DAYS]";
    assert_eq!(expand_relative_dates(overflowing, now()), "addTime < [99999999999999999999 DAYS]");
  }

  #[test]
  fn test_compile_is_idempotent_and_follows_the_clock() {
    let options =
      FilterOptions::default().with_search("addTime > [3 DAYS]").with_mode(SearchMode::Advanced);

    let first = options.compile_at(now());
    let second = options.compile_at(now());
    assert_eq!(first, second);
    assert_eq!(options.search, "addTime > [3 DAYS]");

    let later = options.compile_at(now() + TimeDelta::days(1));
    assert_eq!(later, "(addTime < 2024-03-08@12:00:00)");
  }

  #[test]
  fn test_compiled_relative_date_selects_old_entries() {
    let predicate = Predicate::parse(
      &FilterOptions::default()
        .with_search("addTime > [3 DAYS]")
        .with_mode(SearchMode::Advanced)
        .compile(),
    )
    .unwrap();

    let mut old = PaperDraft::new("old");
    old.add_time = Utc::now() - TimeDelta::days(10);
    let fresh = PaperDraft::new("fresh");

    assert!(predicate.matches(&old));
    assert!(!predicate.matches(&fresh));
  }

  #[test]
  fn test_additional_clauses_are_anded() {
    let compiled = FilterOptions::default()
      .flagged()
      .with_tag("gnn")
      .with_folder("Reading")
      .with_limit(5)
      .compile();
    assert_eq!(
      compiled,
      r#"(flag == true) AND (ANY tags.name == "gnn") AND (ANY folders.name == "Reading") LIMIT(5)"#
    );
  }

  #[test]
  fn test_limit_without_clauses() {
    assert_eq!(FilterOptions::default().with_limit(2).compile(), "TRUEPREDICATE LIMIT(2)");
  }

  #[test]
  fn test_advanced_inline_limit_is_lifted() {
    let compiled = FilterOptions::default()
      .with_search(r#"publication == "arXiv" LIMIT(4)"#)
      .with_mode(SearchMode::Advanced)
      .flagged()
      .compile();
    assert_eq!(compiled, r#"(publication == "arXiv") AND (flag == true) LIMIT(4)"#);
    assert_eq!(Predicate::parse(&compiled).unwrap().limit(), Some(4));
  }

  #[test]
  fn test_apply_patch() {
    let mut options = FilterOptions::default().with_tag("old");
    options.apply(FilterPatch {
      search: Some("query".into()),
      tag: Some(None),
      limit: Some(Some(10)),
      ..FilterPatch::default()
    });
    assert_eq!(options.search, "query");
    assert_eq!(options.tag, None);
    assert_eq!(options.limit, Some(10));
    assert_eq!(options.search_mode, SearchMode::General);
  }
}
