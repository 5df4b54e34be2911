//! Metadata scraping.
//!
//! A [`Scraper`] turns payloads (files being imported, or drafts to refresh) into drafts. The
//! bundled [`LocalScraper`] only reads what is on disk: the PDF document information
//! dictionary, falling back to the file name.

use super::*;

/// Name of the source that reads the PDF information dictionary.
pub const PDF_SCRAPER: &str = "pdf";

/// Name of the source that derives a title from the file name.
pub const FILENAME_SCRAPER: &str = "filename";

/// Something to scrape.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapePayload {
  /// A file to import
  File(PathBuf),
  /// A persisted record to refresh
  Draft(PaperDraft),
}

/// Metadata extraction.
#[async_trait]
pub trait Scraper: Send + Sync {
  /// Scrapes every payload.
  ///
  /// `scrapers` names the sources to use; when `exclusive` is set, no other source runs. A
  /// payload that cannot be scraped at all is skipped, so the result may be shorter than the
  /// input.
  async fn scrape(
    &self,
    payloads: Vec<ScrapePayload>,
    scrapers: &[String],
    exclusive: bool,
  ) -> Result<Vec<PaperDraft>>;
}

/// Scraper reading local files only.
#[derive(Debug, Clone)]
pub struct LocalScraper {
  /// Managed references of refreshed drafts resolve against this directory
  storage_dir: PathBuf,
}

impl LocalScraper {
  /// Creates a scraper for a library stored in `storage_dir`.
  pub fn new(storage_dir: impl AsRef<Path>) -> Self {
    Self { storage_dir: storage_dir.as_ref().to_path_buf() }
  }

  /// Whether the named source participates in a scrape.
  fn enabled(source: &str, scrapers: &[String], exclusive: bool) -> bool {
    !exclusive || scrapers.is_empty() || scrapers.iter().any(|s| s.eq_ignore_ascii_case(source))
  }

  /// PDF metadata of `path`, or `None` when it is not a readable PDF.
  async fn pdf_metadata(path: &Path) -> Option<pdf::PdfMetadata> {
    let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
      return None;
    }
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || pdf::read_metadata(owned)).await {
      Ok(Ok(metadata)) => Some(metadata),
      Ok(Err(e)) => {
        debug!(path = %path.display(), error = %e, "No PDF metadata");
        None
      },
      Err(e) => {
        warn!(path = %path.display(), error = %e, "PDF metadata task failed");
        None
      },
    }
  }

  /// Builds a new draft for an imported file.
  async fn scrape_file(
    &self,
    path: PathBuf,
    scrapers: &[String],
    exclusive: bool,
  ) -> Result<PaperDraft> {
    let path = tokio::fs::canonicalize(&path)
      .await
      .map_err(|e| ShelfError::Scrape(format!("{}: {e}", path.display())))?;
    let mut draft = PaperDraft::default().with_main_url(path.to_string_lossy());

    if Self::enabled(PDF_SCRAPER, scrapers, exclusive) {
      if let Some(metadata) = Self::pdf_metadata(&path).await {
        draft.title = metadata.title.unwrap_or_default();
        draft.authors = metadata.author.unwrap_or_default();
      }
    }
    if draft.title.is_empty() && Self::enabled(FILENAME_SCRAPER, scrapers, exclusive) {
      draft.title = title_from_path(&path);
    }
    Ok(draft)
  }

  /// Fills the blank fields of a persisted draft from its primary file.
  async fn scrape_draft(
    &self,
    mut draft: PaperDraft,
    scrapers: &[String],
    exclusive: bool,
  ) -> PaperDraft {
    if draft.main_url.is_empty() {
      return draft;
    }
    let path = self.storage_dir.join(&draft.main_url);

    if Self::enabled(PDF_SCRAPER, scrapers, exclusive) {
      if let Some(metadata) = Self::pdf_metadata(&path).await {
        if draft.title.is_empty() {
          draft.title = metadata.title.unwrap_or_default();
        }
        if draft.authors.is_empty() {
          draft.authors = metadata.author.unwrap_or_default();
        }
      }
    }
    if draft.title.is_empty() && Self::enabled(FILENAME_SCRAPER, scrapers, exclusive) {
      draft.title = title_from_path(&path);
    }
    draft
  }
}

/// A readable title from a file name: the stem with separators turned into spaces.
fn title_from_path(path: &Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().replace(['_', '-'], " ").trim().to_string())
    .unwrap_or_default()
}

#[async_trait]
impl Scraper for LocalScraper {
  async fn scrape(
    &self,
    payloads: Vec<ScrapePayload>,
    scrapers: &[String],
    exclusive: bool,
  ) -> Result<Vec<PaperDraft>> {
    let mut drafts = Vec::with_capacity(payloads.len());
    for payload in payloads {
      match payload {
        ScrapePayload::File(path) => match self.scrape_file(path, scrapers, exclusive).await {
          Ok(draft) => drafts.push(draft),
          Err(e) => warn!(error = %e, "Skipping payload"),
        },
        ScrapePayload::Draft(draft) => {
          drafts.push(self.scrape_draft(draft, scrapers, exclusive).await)
        },
      }
    }
    trace!(count = drafts.len(), "Scraped payloads");
    Ok(drafts)
  }
}
