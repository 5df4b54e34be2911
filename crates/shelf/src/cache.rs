//! Full-text cache of document contents.
//!
//! The cache is eventually consistent with the record store: the pipeline refreshes it in the
//! background after a write, and a fulltext query only sees documents whose refresh finished.

use rusqlite::params;
use tokio_rusqlite::Connection;

use super::*;

/// Text extraction cache used for fulltext search.
#[async_trait]
pub trait FullTextCache: Send + Sync {
  /// Extracts and stores the text of each draft's primary file.
  ///
  /// Failures for individual drafts are logged and skipped.
  async fn update_full_text_cache(&self, drafts: &[PaperDraft]) -> Result<()>;

  /// Evicts the entries of the given ids.
  async fn delete(&self, ids: &[Uuid]) -> Result<()>;

  /// Keeps the drafts whose cached text contains `query`, case-insensitively.
  async fn full_text_filter(&self, query: &str, drafts: Vec<PaperDraft>) -> Result<Vec<PaperDraft>>;
}

/// [`FullTextCache`] backed by a SQLite table.
pub struct SqliteCache {
  /// Connection to the cache database
  conn:        Connection,
  /// Directory managed file names resolve against
  storage_dir: PathBuf,
}

impl SqliteCache {
  /// Opens or creates a cache database at `path` for files stored in `storage_dir`.
  pub async fn open(path: impl AsRef<Path>, storage_dir: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path.as_ref()).await?;
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/cache.sql"
        )))?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, storage_dir: storage_dir.as_ref().to_path_buf() })
  }

  /// The managed file name currently cached for `id`.
  async fn cached_url(&self, id: Uuid) -> Result<Option<String>> {
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached("SELECT main_url FROM fulltext WHERE paper_id = ?1")?;
        match stmt.query_row([id.to_string()], |row| row.get::<_, String>(0)) {
          Ok(url) => Ok(Some(url)),
          Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await
      .map_err(ShelfError::from)
  }

  /// Extracts and stores the text of one draft.
  async fn refresh(&self, draft: &PaperDraft) -> Result<()> {
    if self.cached_url(draft.id).await?.as_deref() == Some(draft.main_url.as_str()) {
      trace!(id = %draft.id, "Full text already cached");
      return Ok(());
    }

    let path = self.storage_dir.join(&draft.main_url);
    let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let content = if is_pdf {
      tokio::task::spawn_blocking(move || pdf::extract_text(path)).await??
    } else {
      tokio::fs::read_to_string(&path).await?
    };

    let (id, url) = (draft.id.to_string(), draft.main_url.clone());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO fulltext (paper_id, main_url, content, updated_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![id, url, content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
      })
      .await?;
    debug!(id = %draft.id, "Cached full text");
    Ok(())
  }
}

#[async_trait]
impl FullTextCache for SqliteCache {
  async fn update_full_text_cache(&self, drafts: &[PaperDraft]) -> Result<()> {
    for draft in drafts.iter().filter(|draft| !draft.main_url.is_empty()) {
      if let Err(e) = self.refresh(draft).await {
        warn!(id = %draft.id, error = %e, "Failed to cache full text");
      }
    }
    Ok(())
  }

  async fn delete(&self, ids: &[Uuid]) -> Result<()> {
    let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached("DELETE FROM fulltext WHERE paper_id = ?1")?;
          for id in &ids {
            stmt.execute([id])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(ShelfError::from)
  }

  async fn full_text_filter(&self, query: &str, drafts: Vec<PaperDraft>) -> Result<Vec<PaperDraft>> {
    let query = query.to_lowercase();
    let matching: HashSet<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare_cached("SELECT paper_id FROM fulltext WHERE instr(lower(content), ?1) > 0")?;
        let ids = stmt
          .query_map([query], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
      })
      .await?;

    Ok(drafts.into_iter().filter(|draft| matching.contains(&draft.id.to_string())).collect())
  }
}
