//! A managed paper library with a synchronizing update pipeline.
//!
//! `shelf` keeps bibliographic records ("papers") together with their document files in a
//! managed storage folder, indexed in a local SQLite database:
//!
//! - Imports move or copy files into managed storage and persist metadata in one pass
//! - Failed writes never leave orphaned files behind
//! - Tags and folders are upserted, never duplicated
//! - Structured filters compile to a small predicate language, including relative dates
//! - Extracted document text feeds a full-text cache
//! - A periodic task rescrapes preprints whose metadata may have changed
//!
//! # Getting Started
//!
//! ```no_run
//! use shelf::{
//!   filter::FilterOptions,
//!   prelude::*,
//!   store::{SortKey, SortOrder},
//!   Library,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let library = Library::open(Config::default()).await?;
//!
//!   // Import a file; the scraper fills in what it can read from the PDF
//!   let papers = library.pipeline.create(vec!["/tmp/attention.pdf".into()]).await;
//!   println!("Imported {} paper(s)", papers.len());
//!
//!   // Query the library
//!   let options = FilterOptions::default().with_search("attention");
//!   let found = library.pipeline.load(&options, SortKey::Title, SortOrder::Ascending).await;
//!   for paper in found {
//!     println!("{}", paper.title);
//!   }
//!
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`entity`]: Paper drafts, tags and folders
//! - [`pipeline`]: The create/update/delete flows that keep files and records consistent
//! - [`filter`] and [`predicate`]: Structured queries and the language they compile to
//! - [`scheduler`]: Periodic rescrape of preprints
//! - [`store`], [`files`], [`cache`], [`scrape`], [`preference`]: Collaborator traits
//! - [`database`]: The SQLite record store
//! - [`config`]: On-disk application configuration

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::HashSet,
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod cache;
pub mod categorizer;
pub mod chunk;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod event;
pub mod files;
pub mod filter;
pub mod pdf;
pub mod pipeline;
pub mod predicate;
pub mod preference;
pub mod scheduler;
pub mod scrape;
pub mod store;

use crate::{entity::*, error::*, event::*, store::*};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use shelf::prelude::*;
///
/// async fn example() -> Result<(), ShelfError> {
///   let library = shelf::Library::open(Config::default()).await?;
///   let drafts = library.store.load("flag == true", Default::default(), Default::default()).await?;
///   println!("{} flagged papers", drafts.len());
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    cache::FullTextCache,
    config::Config,
    entity::{Categorizer, CategorizerKind, PaperDraft},
    error::ShelfError,
    files::FileAccess,
    preference::Preferences,
    scrape::Scraper,
    store::RecordStore,
  };
}

/// A fully wired library: the bundled collaborators behind one pipeline and one scheduler.
pub struct Library {
  /// The configuration the library was opened with
  pub config:      config::Config,
  /// Bus every component publishes on
  pub bus:         EventBus,
  /// The SQLite record store
  pub store:       Arc<database::SqliteStore>,
  /// Runtime preferences
  pub preferences: Arc<preference::SqlitePreferences>,
  /// Create/update/delete entry point
  pub pipeline:    Arc<pipeline::UpdatePipeline>,
  /// Periodic preprint rescrape
  pub scheduler:   Arc<scheduler::RescrapeScheduler>,
}

impl Library {
  /// Opens (or creates) every on-disk component named by `config`.
  ///
  /// Parent directories of the configured paths are created as needed.
  pub async fn open(config: config::Config) -> Result<Self> {
    config.ensure_directories().await?;
    let bus = EventBus::default();

    let preferences =
      Arc::new(preference::SqlitePreferences::open(&config.preferences_path).await?);
    let cache = Arc::new(cache::SqliteCache::open(&config.cache_path, &config.storage_path).await?);
    let files = Arc::new(files::LocalFileAccess::new(&config.storage_path));
    let scraper = Arc::new(scrape::LocalScraper::new(&config.storage_path));
    let store = Arc::new(database::SqliteStore::open(&config.database_path, bus.clone()).await?);

    let pipeline = Arc::new(pipeline::UpdatePipeline::new(
      store.clone(),
      files,
      cache,
      scraper.clone(),
      preferences.clone(),
      bus.clone(),
    ));
    let scheduler = Arc::new(scheduler::RescrapeScheduler::new(
      pipeline.clone(),
      store.clone(),
      scraper,
      preferences.clone(),
      bus.clone(),
    ));

    info!(database = %config.database_path.display(), "Opened library");
    Ok(Self { config, bus, store, preferences, pipeline, scheduler })
  }
}
