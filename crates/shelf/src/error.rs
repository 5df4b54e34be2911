//! Error types for the shelf library.
//!
//! Most failures inside the update pipeline are captured per item, logged, and never surface to
//! the caller of a public pipeline operation. The variants here are what those stages capture,
//! plus the ambient failures (SQLite, filesystem, parsing) that the concrete collaborators raise.
//!
//! # Examples
//!
//! ```
//! use shelf::error::ShelfError;
//!
//! let err = ShelfError::Access("/tmp/missing.pdf".into());
//! assert_eq!(err.to_string(), "File is not accessible: /tmp/missing.pdf");
//! ```

use thiserror::Error;

/// Error type alias used for the [`shelf`](crate) crate.
pub type Result<T> = core::result::Result<T, ShelfError>;

/// Errors that can occur when working with a shelf library.
#[derive(Error, Debug)]
pub enum ShelfError {
  /// A referenced file does not exist or cannot be read.
  #[error("File is not accessible: {0}")]
  Access(String),

  /// Moving or copying a file into managed storage failed.
  ///
  /// The string carries the source reference and the reason.
  #[error("Relocation failed: {0}")]
  Relocation(String),

  /// The record store rejected or failed a write.
  #[error("Persistence failed: {0}")]
  Persistence(String),

  /// Metadata extraction from a payload failed.
  #[error("Scrape failed: {0}")]
  Scrape(String),

  /// The record store is initializing or unreachable. Aborts the whole call.
  #[error("Record store is unavailable")]
  StoreUnavailable,

  /// An advanced query could not be parsed.
  ///
  /// `position` is the byte offset in the predicate where parsing stopped.
  #[error("Invalid predicate at {position}: {message}")]
  Predicate {
    /// Byte offset of the offending token
    position: usize,
    /// What the parser expected
    message:  String,
  },

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// JSON (de)serialization of a stored column failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// The configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// The configuration file could not be written.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// PDF parsing errors from the lopdf library, raised while building the full-text cache.
  #[error(transparent)]
  Lopdf(#[from] lopdf::Error),

  /// A background task panicked or was cancelled.
  #[error(transparent)]
  Join(#[from] tokio::task::JoinError),

  /// A stored value could not be interpreted.
  #[error("{0}")]
  Config(String),
}
