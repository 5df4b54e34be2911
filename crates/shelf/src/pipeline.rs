//! The update pipeline.
//!
//! Every write to the library funnels into [`UpdatePipeline::update`], which runs a batch of
//! drafts through five stages. Each stage finishes for the whole batch before the next starts,
//! and drafts correspond across stages by index.
//!
//! 1. **Relocation**: primary files that no longer exist are cleared, then every file still in
//!    transit is moved or copied into managed storage, a bounded number of drafts at a time. A
//!    draft whose relocation fails continues with its original references.
//! 2. **Normalization**: references are reduced to managed base names. Anything still absolute
//!    (a file that could not be relocated) is dropped.
//! 3. **Persistence**: drafts are written one after the other. A failed write marks that draft
//!    failed without stopping the others.
//! 4. **Reconciliation**: files relocated for a failed draft during this call are undone, and a
//!    managed file is renamed when the store persisted a different name than the one chosen in
//!    stage 1.
//! 5. **Cache refresh**: the full-text cache is refreshed in the background.
//!
//! Only successfully persisted drafts are returned. Public operations never fail: errors are
//! logged and the operation yields an empty result.

use tokio::{sync::Mutex, task::JoinHandle};

use super::*;
use crate::{
  cache::FullTextCache,
  categorizer::{apply_membership, replace_membership},
  chunk::ChunkedRunner,
  files::FileAccess,
  filter::{FilterOptions, SearchMode},
  preference::{cut_on_import, Preferences},
  scrape::{ScrapePayload, Scraper},
};

/// A file stage 1 brought into managed storage during one call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relocated {
  /// The reference before relocation
  from: String,
  /// The managed base name after relocation
  to:   String,
}

/// Orchestrates files, the record store and the full-text cache for every write.
pub struct UpdatePipeline {
  /// Where records are persisted
  store:           Arc<dyn RecordStore>,
  /// Managed storage
  files:           Arc<dyn FileAccess>,
  /// Full-text cache refreshed after writes
  cache:           Arc<dyn FullTextCache>,
  /// Metadata extraction for imports and refreshes
  scraper:         Arc<dyn Scraper>,
  /// Source of the cut/copy preference
  preferences:     Arc<dyn Preferences>,
  /// Bus entity notifications go out on
  bus:             EventBus,
  /// Bounded concurrency for relocation
  runner:          ChunkedRunner,
  /// Serializes operations that write
  write_lock:      Mutex<()>,
  /// Cache refreshes that may still be running
  cache_refreshes: Mutex<Vec<JoinHandle<()>>>,
}

impl UpdatePipeline {
  /// Creates a pipeline over the given collaborators.
  pub fn new(
    store: Arc<dyn RecordStore>,
    files: Arc<dyn FileAccess>,
    cache: Arc<dyn FullTextCache>,
    scraper: Arc<dyn Scraper>,
    preferences: Arc<dyn Preferences>,
    bus: EventBus,
  ) -> Self {
    Self {
      store,
      files,
      cache,
      scraper,
      preferences,
      bus,
      runner: ChunkedRunner::default(),
      write_lock: Mutex::new(()),
      cache_refreshes: Mutex::new(Vec::new()),
    }
  }

  /// Sets how many drafts are relocated concurrently.
  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.runner = ChunkedRunner::new(chunk_size);
    self
  }

  /// Persists drafts and their files. Returns the drafts as persisted.
  pub async fn update(&self, drafts: Vec<PaperDraft>) -> Vec<PaperDraft> {
    if !self.available("update") || drafts.is_empty() {
      return Vec::new();
    }
    let _guard = self.write_lock.lock().await;
    let cut = cut_on_import(self.preferences.as_ref()).await;
    self.persist(drafts, cut, false).await
  }

  /// Imports files: scrapes each path into a new draft and persists the result.
  pub async fn create(&self, paths: Vec<PathBuf>) -> Vec<PaperDraft> {
    if !self.available("create") {
      return Vec::new();
    }
    let drafts = self.scrape_files(paths).await;
    self.update(drafts).await
  }

  /// Imports files straight into a categorizer.
  ///
  /// The new drafts hold exactly one tag membership, `categorizer`. The membership is always
  /// installed as a tag, whatever `kind` is passed.
  pub async fn create_into_categorizer(
    &self,
    paths: Vec<PathBuf>,
    categorizer: &Categorizer,
    kind: CategorizerKind,
  ) -> Vec<PaperDraft> {
    if !self.available("create_into_categorizer") {
      return Vec::new();
    }
    if kind != CategorizerKind::Tag {
      debug!(%kind, name = %categorizer.name, "Importing into categorizer as a tag");
    }
    let drafts = self.scrape_files(paths).await;
    let drafts = replace_membership(drafts, categorizer, CategorizerKind::Tag);
    self.update(drafts).await
  }

  /// Adds a tag or folder membership to every draft and persists them.
  pub async fn categorize(
    &self,
    drafts: Vec<PaperDraft>,
    categorizer: &Categorizer,
    kind: CategorizerKind,
  ) -> Vec<PaperDraft> {
    if !self.available("categorize") {
      return Vec::new();
    }
    self.update(apply_membership(drafts, categorizer, kind)).await
  }

  /// Refreshes drafts through the scraper and persists the result.
  ///
  /// A non-empty `scrapers` list restricts the scrape to those sources.
  pub async fn scrape(&self, drafts: Vec<PaperDraft>, scrapers: &[String]) -> Vec<PaperDraft> {
    if !self.available("scrape") {
      return Vec::new();
    }
    let payloads = drafts.into_iter().map(ScrapePayload::Draft).collect();
    match self.scraper.scrape(payloads, scrapers, !scrapers.is_empty()).await {
      Ok(drafts) => self.update(drafts).await,
      Err(e) => {
        error!(error = %e, "Scrape failed");
        Vec::new()
      },
    }
  }

  /// Removes records, then their files, then their cache entries.
  pub async fn delete(&self, ids: &[Uuid]) {
    if !self.available("delete") || ids.is_empty() {
      return;
    }
    let _guard = self.write_lock.lock().await;

    let files = match self.store.delete(ids).await {
      Ok(files) => files,
      Err(e) => {
        error!(error = %e, "Failed to delete records");
        return;
      },
    };
    for url in files {
      if let Err(e) = self.files.remove_file(&url).await {
        warn!(url = %url, error = %e, "Failed to remove file of deleted record");
      }
    }
    if let Err(e) = self.cache.delete(ids).await {
      warn!(error = %e, "Failed to evict cache entries");
    }

    info!(count = ids.len(), "Deleted records");
    self.bus.publish(Event::EntitiesDeleted { ids: ids.to_vec() });
  }

  /// Removes one supplementary file from a draft and persists the draft.
  pub async fn delete_supplementary(&self, mut draft: PaperDraft, url: &str) -> Option<PaperDraft> {
    if !self.available("delete_supplementary") {
      return None;
    }
    if let Err(e) = self.files.remove_file(url).await {
      warn!(id = %draft.id, url, error = %e, "Failed to remove supplementary file");
    }
    draft.supplementary_urls.retain(|existing| existing != url);
    self.update(vec![draft]).await.into_iter().next()
  }

  /// Renames every managed file after its record's current title.
  pub async fn rename_all(&self) -> Vec<PaperDraft> {
    if !self.available("rename_all") {
      return Vec::new();
    }
    let _guard = self.write_lock.lock().await;

    match self.store.load("", SortKey::Title, SortOrder::Ascending).await {
      Ok(drafts) => {
        info!(count = drafts.len(), "Renaming managed files");
        self.persist(drafts, true, true).await
      },
      Err(e) => {
        error!(error = %e, "Failed to load records for renaming");
        Vec::new()
      },
    }
  }

  /// Copies every record of another store into this pipeline's store.
  pub async fn migrate(&self, source: &dyn RecordStore) -> Vec<PaperDraft> {
    if !self.available("migrate") {
      return Vec::new();
    }
    if source.is_initializing() {
      error!(error = %ShelfError::StoreUnavailable, "Migration source is not ready");
      return Vec::new();
    }
    match source.load("", SortKey::AddTime, SortOrder::Ascending).await {
      Ok(drafts) => {
        info!(count = drafts.len(), "Migrating records");
        self.update(drafts).await
      },
      Err(e) => {
        error!(error = %e, "Failed to load records from migration source");
        Vec::new()
      },
    }
  }

  /// Loads the records matching `options`.
  ///
  /// Fulltext searches query the store without the search clause and narrow the result through
  /// the full-text cache.
  pub async fn load(
    &self,
    options: &FilterOptions,
    sort_key: SortKey,
    sort_order: SortOrder,
  ) -> Vec<PaperDraft> {
    if !self.available("load") {
      return Vec::new();
    }
    match self.try_load(options, sort_key, sort_order).await {
      Ok(drafts) => drafts,
      Err(e) => {
        error!(error = %e, "Failed to load records");
        Vec::new()
      },
    }
  }

  /// Waits for every background cache refresh started so far.
  pub async fn flush_cache_refreshes(&self) {
    let handles = std::mem::take(&mut *self.cache_refreshes.lock().await);
    for handle in handles {
      if let Err(e) = handle.await {
        warn!(error = %e, "Cache refresh task failed");
      }
    }
  }

  /// Whether the store accepts operations; logs the refusal when it does not.
  fn available(&self, operation: &str) -> bool {
    if self.store.is_initializing() {
      error!(operation, error = %ShelfError::StoreUnavailable, "Skipping operation");
      return false;
    }
    true
  }

  /// Scrapes new drafts for imported files.
  async fn scrape_files(&self, paths: Vec<PathBuf>) -> Vec<PaperDraft> {
    let payloads = paths.into_iter().map(ScrapePayload::File).collect();
    match self.scraper.scrape(payloads, &[], false).await {
      Ok(drafts) => drafts,
      Err(e) => {
        error!(error = %e, "Failed to scrape imported files");
        Vec::new()
      },
    }
  }

  /// Fallible part of [`UpdatePipeline::load`].
  async fn try_load(
    &self,
    options: &FilterOptions,
    sort_key: SortKey,
    sort_order: SortOrder,
  ) -> Result<Vec<PaperDraft>> {
    let query = options.sanitized_search();
    if options.search_mode != SearchMode::Fulltext || query.is_empty() {
      return self.store.load(&options.compile(), sort_key, sort_order).await;
    }

    let structural = FilterOptions { search: String::new(), limit: None, ..options.clone() };
    let drafts = self.store.load(&structural.compile(), sort_key, sort_order).await?;
    let mut drafts = self.cache.full_text_filter(&query, drafts).await?;
    if let Some(limit) = options.limit {
      drafts.truncate(limit);
    }
    Ok(drafts)
  }

  /// The five update stages. Callers hold the write lock.
  async fn persist(&self, drafts: Vec<PaperDraft>, cut: bool, force: bool) -> Vec<PaperDraft> {
    trace!(count = drafts.len(), cut, force, "Updating drafts");

    // Stage 1: relocation
    let mut checked = Vec::with_capacity(drafts.len());
    for mut draft in drafts {
      if !draft.main_url.is_empty() && !self.files.access(&draft.main_url).await {
        warn!(id = %draft.id, main_url = %draft.main_url, "Primary file is missing, clearing it");
        draft.main_url.clear();
      }
      checked.push(draft);
    }

    let files = &self.files;
    let outcome = self
      .runner
      .run(
        checked.clone(),
        |draft: PaperDraft| async move {
          Ok(files.move_draft(&draft, cut, force).await?.unwrap_or(draft))
        },
        PaperDraft::clone,
      )
      .await;
    for (draft, e) in &outcome.errors {
      warn!(id = %draft.id, error = %e, "Failed to relocate files");
    }
    let relocated: Vec<Vec<Relocated>> = checked
      .iter()
      .zip(&outcome.results)
      .map(|(before, after)| relocations(before, after))
      .collect();

    // Stage 2: normalization
    let normalized: Vec<PaperDraft> = outcome.results.into_iter().map(normalize).collect();

    // Stage 3: persistence
    let mut persisted = Vec::with_capacity(normalized.len());
    for draft in &normalized {
      match self.store.update(draft).await {
        Ok(stored) => persisted.push(Some(stored)),
        Err(e) => {
          warn!(id = %draft.id, error = %e, "Failed to persist draft");
          persisted.push(None);
        },
      }
    }

    // Stage 4: reconciliation
    for ((draft, stored), moves) in normalized.iter().zip(&persisted).zip(&relocated) {
      match stored {
        None => self.undo_relocations(draft, moves, cut).await,
        Some(stored) if !draft.main_url.is_empty() && stored.main_url != draft.main_url => {
          if let Err(e) = self.files.move_file(&draft.main_url, &stored.main_url).await {
            warn!(id = %draft.id, error = %e, "Failed to rename file to its persisted name");
          }
        },
        Some(_) => {},
      }
    }

    // Stage 5: cache refresh
    let successes: Vec<PaperDraft> = persisted.into_iter().flatten().collect();
    if !successes.is_empty() {
      self.refresh_cache(successes.clone()).await;
      self.bus.publish(Event::EntitiesUpdated { ids: successes.iter().map(|d| d.id).collect() });
    }
    let failed = normalized.len() - successes.len();
    debug!(persisted = successes.len(), failed, "Updated drafts");
    successes
  }

  /// Undoes the relocations of a draft that failed to persist.
  ///
  /// Moved files go back where they came from; copies are removed.
  async fn undo_relocations(&self, draft: &PaperDraft, moves: &[Relocated], cut: bool) {
    for Relocated { from, to } in moves {
      let undone = if cut {
        self.files.move_file(to, from).await
      } else {
        self.files.remove_file(to).await
      };
      match undone {
        Ok(()) => debug!(id = %draft.id, file = %to, "Undid relocation of unpersisted draft"),
        Err(e) => warn!(id = %draft.id, file = %to, error = %e, "Failed to undo relocation"),
      }
    }
  }

  /// Starts a tracked background refresh of the full-text cache.
  async fn refresh_cache(&self, drafts: Vec<PaperDraft>) {
    let cache = self.cache.clone();
    let handle = tokio::spawn(async move {
      if let Err(e) = cache.update_full_text_cache(&drafts).await {
        warn!(error = %e, "Failed to refresh full-text cache");
      }
    });

    let mut refreshes = self.cache_refreshes.lock().await;
    refreshes.retain(|handle| !handle.is_finished());
    refreshes.push(handle);
  }
}

/// The files `after` holds in managed storage that `before` did not reference under that name.
fn relocations(before: &PaperDraft, after: &PaperDraft) -> Vec<Relocated> {
  let moved = |from: &String, to: &String| {
    (from != to && !to.is_empty() && !Path::new(to).is_absolute())
      .then(|| Relocated { from: from.clone(), to: to.clone() })
  };

  let main = moved(&before.main_url, &after.main_url);
  let supplementary = before
    .supplementary_urls
    .iter()
    .zip(&after.supplementary_urls)
    .filter_map(|(from, to)| moved(from, to));
  main.into_iter().chain(supplementary).collect()
}

/// Reduces references to managed base names, dropping any still pointing outside storage.
fn normalize(mut draft: PaperDraft) -> PaperDraft {
  draft.main_url = if draft.has_transit_main_file() {
    String::new()
  } else {
    base_name(&draft.main_url)
  };
  draft.supplementary_urls = draft
    .supplementary_urls
    .iter()
    .filter(|url| !Path::new(url).is_absolute())
    .map(|url| base_name(url))
    .filter(|url| !url.is_empty())
    .collect();
  draft
}

/// The last component of a reference.
fn base_name(url: &str) -> String {
  Path::new(url).file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}
