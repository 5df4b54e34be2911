//! Command line interface and rescrape daemon for the shelf paper library.
//!
//! This crate provides the `shelf` binary on top of the `shelf` library. It supports:
//! - Library initialization
//! - Importing documents, optionally straight into a tag
//! - Listing and searching papers
//! - Removing papers together with their files
//! - Renaming managed files after their titles
//! - Migrating records from another library database
//! - Running the preprint rescrape once or as a long-lived daemon
//!
//! # Usage
//!
//! ```bash
//! # Set up a library in the default location
//! shelf init
//!
//! # Import every PDF in a directory and tag the imports
//! shelf add "~/Downloads/*.pdf" --tag inbox
//!
//! # Search titles, authors, venues and notes
//! shelf list --search "graph networks"
//!
//! # Keep rescraping preprints in the background
//! shelf daemon
//! ```
//!
//! Every command accepts `--path <dir>` to work on a self-contained library directory instead
//! of the platform defaults, and `-v` (repeatable) to raise the log level.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use shelf::{config::CONFIG_FILE_NAME, prelude::*, Library};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Manage a local library of research papers")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Library directory. Holds the databases, the document storage and a `config.toml`. If not
  /// specified, uses the platform-specific default locations.
  #[arg(long, short, global = true)]
  path: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,

  /// Skip all prompts and accept defaults (mostly for testing)
  #[arg(long, hide = true, global = true)]
  accept_defaults: bool,
}

/// The log filter for a verbosity level, unless `RUST_LOG` overrides it.
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn log_filter(verbosity: u8) -> EnvFilter {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}

/// Configures console logging based on the verbosity level
fn setup_logging(verbosity: u8) {
  tracing_subscriber::fmt()
    .with_env_filter(log_filter(verbosity))
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .init();
}

/// Where the configuration for this invocation lives, and what it says.
///
/// With `--path`, the library is self-contained in that directory and a missing `config.toml`
/// means the default layout inside it. Otherwise the platform config file is used.
async fn resolve_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
  match path {
    Some(root) => {
      let file = root.join(CONFIG_FILE_NAME);
      let config = if tokio::fs::try_exists(&file).await? {
        Config::load(&file).await?
      } else {
        Config::rooted_at(root)
      };
      Ok((config, file))
    },
    None => {
      let file = Config::default_path();
      Ok((Config::load_or_default(&file).await?, file))
    },
  }
}

/// Runs one command. Every command but `init` and `daemon` works on an opened library.
async fn run(
  command: Commands,
  interaction: &Terminal,
  config: Config,
  config_file: &Path,
  verbosity: u8,
) -> Result<()> {
  match command {
    Commands::Init(options) => init(interaction, config, config_file, options).await,
    Commands::Daemon => daemon(interaction, config, verbosity).await,
    Commands::Add(options) => add(interaction, &Library::open(config).await?, options).await,
    Commands::List(options) => list(interaction, &Library::open(config).await?, options).await,
    Commands::Remove(options) => remove(interaction, &Library::open(config).await?, options).await,
    Commands::RenameAll => rename_all(interaction, &Library::open(config).await?).await,
    Commands::Migrate(options) => migrate(interaction, &Library::open(config).await?, options).await,
    Commands::Rescrape(options) => {
      rescrape(interaction, &Library::open(config).await?, options).await
    },
  }
}

/// Entry point for the shelf CLI application
///
/// Parses arguments, sets up logging and runs the requested command. The daemon installs its
/// own file logging instead of the console subscriber.
///
/// # Errors
///
/// Returns [`ShelfdError`] when the library cannot be opened, a prompt fails, or an argument
/// (glob pattern, paper id, search mode) is invalid. Per-paper failures inside a command are
/// reported and logged, not returned.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  if !matches!(cli.command, Commands::Daemon) {
    setup_logging(cli.verbose);
  }

  let interaction = Terminal::new(cli.accept_defaults);
  let (config, config_file) = resolve_config(cli.path.as_deref()).await?;
  debug!(config = ?config, file = %config_file.display(), "Resolved configuration");

  let outcome = run(cli.command, &interaction, config, &config_file, cli.verbose).await;
  if let Err(e) = &outcome {
    eprintln!("{} {e}", style(ERROR_PREFIX).red());
  }
  outcome
}
