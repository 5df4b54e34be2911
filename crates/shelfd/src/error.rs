//! Error types for the `shelf` command line interface.

use thiserror::Error;

use super::*;

/// Error type alias used for the [`shelfd`](crate) binary.
pub type Result<T> = core::result::Result<T, ShelfdError>;

/// Errors that can occur while running a CLI command.
#[derive(Error, Debug)]
pub enum ShelfdError {
  /// The library reported an error.
  #[error(transparent)]
  Shelf(#[from] ShelfError),

  /// A confirmation prompt failed.
  #[error(transparent)]
  Dialog(#[from] dialoguer::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// An import pattern is not a valid glob.
  #[error(transparent)]
  Pattern(#[from] glob::PatternError),

  /// A paper id could not be parsed.
  #[error(transparent)]
  Uuid(#[from] uuid::Error),
}
