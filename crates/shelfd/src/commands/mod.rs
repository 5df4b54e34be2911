//! The CLI subcommands, one module each.

use super::*;

pub mod add;
pub mod daemon;
pub mod init;
pub mod list;
pub mod migrate;
pub mod remove;
pub mod rename;
pub mod rescrape;

pub use add::{add, AddOptions};
pub use daemon::daemon;
pub use init::{init, InitOptions};
pub use list::{list, ListOptions};
pub use migrate::{migrate, MigrateOptions};
pub use remove::{remove, RemoveOptions};
pub use rename::rename_all;
pub use rescrape::{rescrape, RescrapeOptions};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Create a library and write its configuration
  Init(InitOptions),

  /// Import documents into the library
  Add(AddOptions),

  /// List papers, optionally filtered
  List(ListOptions),

  /// Remove papers and their files
  Remove(RemoveOptions),

  /// Rename every managed file after its paper's current title
  RenameAll,

  /// Copy every record of another library database into this library
  Migrate(MigrateOptions),

  /// Rescrape preprints for publication updates now
  Rescrape(RescrapeOptions),

  /// Rescrape preprints periodically until interrupted
  Daemon,
}
