//! The SQLite record store.
//!
//! Papers, categorizers and memberships live in three tables (see `migrations/init.sql`).
//! Queries are expressed in the predicate language of [`predicate`](crate::predicate) and
//! evaluated over the loaded rows, so every filter the compiler emits runs here unchanged.
//!
//! # Examples
//!
//! ```no_run
//! # use shelf::{database::SqliteStore, entity::PaperDraft, event::EventBus, store::*};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open("papers.db", EventBus::default()).await?;
//!
//! let stored = store.update(&PaperDraft::new("Attention Is All You Need")).await?;
//! let found = store.load(r#"title CONTAINS[c] "attention""#, SortKey::Title, SortOrder::Ascending).await?;
//! assert_eq!(found[0].id, stored.id);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{params, types::Type, OptionalExtension, Transaction};
use tokio_rusqlite::Connection;

use super::*;
use crate::predicate::Predicate;


/// Columns of the `papers` table in the order [`draft_from_row`] reads them.
const PAPER_COLUMNS: &str = "id, title, authors, publication, pub_time, doi, arxiv, note, flag, \
                             add_time, main_url, supplementary_urls";

/// [`RecordStore`] over a single SQLite connection.
pub struct SqliteStore {
  /// The one writer connection
  conn:         Connection,
  /// Set until migrations have run
  initializing: AtomicBool,
  /// Bus the ready notification goes out on
  bus:          EventBus,
}

impl SqliteStore {
  /// Opens or creates a store at `path` and runs migrations.
  ///
  /// Publishes [`Event::StoreReady`] once the store accepts operations.
  pub async fn open(path: impl AsRef<Path>, bus: EventBus) -> Result<Self> {
    let conn = Connection::open(path.as_ref()).await?;
    let store = Self { conn, initializing: AtomicBool::new(true), bus };

    store
      .conn
      .call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/init.sql"
        )))?;
        Ok(())
      })
      .await?;

    store.initializing.store(false, Ordering::SeqCst);
    debug!(path = %path.as_ref().display(), "Record store ready");
    store.bus.publish(Event::StoreReady);
    Ok(store)
  }

  /// Every stored record with its memberships, in insertion order.
  async fn load_all(&self) -> Result<Vec<PaperDraft>> {
    self
      .conn
      .call(|conn| {
        let mut drafts = {
          let mut stmt =
            conn.prepare_cached(&format!("SELECT {PAPER_COLUMNS} FROM papers ORDER BY rowid"))?;
          let rows = stmt.query_map([], draft_from_row)?;
          rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut stmt = conn.prepare_cached(
          "SELECT m.paper_id, c.id, c.name, c.kind
           FROM memberships m
           JOIN categorizers c ON c.id = m.categorizer_id
           ORDER BY c.name",
        )?;
        let memberships = stmt
          .query_map([], |row| {
            let paper_id = uuid_column(row, 0)?;
            let categorizer = Categorizer {
              id:   uuid_column(row, 1)?,
              name: row.get(2)?,
              kind: CategorizerKind::from_str(&row.get::<_, String>(3)?)
                .map_err(|e| conversion_error(3, e))?,
            };
            Ok((paper_id, categorizer))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for (paper_id, categorizer) in memberships {
          if let Some(draft) = drafts.iter_mut().find(|draft| draft.id == paper_id) {
            draft.memberships_mut(categorizer.kind).push(categorizer);
          }
        }
        Ok(drafts)
      })
      .await
      .map_err(ShelfError::from)
  }

  /// Fails with [`ShelfError::StoreUnavailable`] while migrations are running.
  fn ensure_ready(&self) -> Result<()> {
    if self.is_initializing() {
      return Err(ShelfError::StoreUnavailable);
    }
    Ok(())
  }
}

#[async_trait]
impl RecordStore for SqliteStore {
  fn is_initializing(&self) -> bool { self.initializing.load(Ordering::SeqCst) }

  async fn load(
    &self,
    predicate: &str,
    sort_key: SortKey,
    sort_order: SortOrder,
  ) -> Result<Vec<PaperDraft>> {
    self.ensure_ready()?;
    let predicate = Predicate::parse(predicate)?;

    let mut drafts = predicate.filter(self.load_all().await?);
    sort_drafts(&mut drafts, sort_key, sort_order);
    if let Some(limit) = predicate.limit() {
      drafts.truncate(limit);
    }
    trace!(count = drafts.len(), "Loaded records");
    Ok(drafts)
  }

  async fn load_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PaperDraft>> {
    self.ensure_ready()?;
    let wanted: HashSet<Uuid> = ids.iter().copied().collect();
    Ok(self.load_all().await?.into_iter().filter(|draft| wanted.contains(&draft.id)).collect())
  }

  async fn update(&self, draft: &PaperDraft) -> Result<PaperDraft> {
    self.ensure_ready()?;
    let mut stored = draft.clone();
    let supplementary = serde_json::to_string(&draft.supplementary_urls)?;

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        stored.main_url = free_main_url(&tx, stored.id, &stored.main_url)?;

        tx.execute(
          "INSERT INTO papers (id, title, authors, publication, pub_time, doi, arxiv, note, flag,
                               add_time, main_url, supplementary_urls)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             authors = excluded.authors,
             publication = excluded.publication,
             pub_time = excluded.pub_time,
             doi = excluded.doi,
             arxiv = excluded.arxiv,
             note = excluded.note,
             flag = excluded.flag,
             main_url = excluded.main_url,
             supplementary_urls = excluded.supplementary_urls",
          params![
            stored.id.to_string(),
            stored.title,
            stored.authors,
            stored.publication,
            stored.pub_time,
            stored.doi,
            stored.arxiv,
            stored.note,
            stored.flag,
            stored.add_time,
            stored.main_url,
            supplementary,
          ],
        )?;

        tx.execute("DELETE FROM memberships WHERE paper_id = ?1", [stored.id.to_string()])?;
        for kind in [CategorizerKind::Tag, CategorizerKind::Folder] {
          let mut resolved: Vec<Categorizer> = Vec::new();
          for categorizer in stored.memberships(kind) {
            let categorizer = resolve_categorizer(&tx, categorizer, kind)?;
            if resolved.iter().all(|existing| existing.id != categorizer.id) {
              tx.execute(
                "INSERT OR IGNORE INTO memberships (paper_id, categorizer_id) VALUES (?1, ?2)",
                params![stored.id.to_string(), categorizer.id.to_string()],
              )?;
              resolved.push(categorizer);
            }
          }
          *stored.memberships_mut(kind) = resolved;
        }

        tx.commit()?;
        Ok(stored)
      })
      .await
      .map_err(|e| ShelfError::Persistence(format!("{}: {e}", draft.id)))?;

    trace!(id = %stored.id, main_url = %stored.main_url, "Persisted record");
    Ok(stored)
  }

  async fn delete(&self, ids: &[Uuid]) -> Result<Vec<String>> {
    self.ensure_ready()?;
    let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

    let files = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut files = Vec::new();
        {
          let mut select =
            tx.prepare_cached("SELECT main_url, supplementary_urls FROM papers WHERE id = ?1")?;
          for id in &ids {
            let row = select
              .query_row([id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
              .optional()?;
            if let Some((main_url, supplementary)) = row {
              files.push(main_url);
              let supplementary: Vec<String> = serde_json::from_str(&supplementary)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
              files.extend(supplementary);
            }
          }
        }
        for id in &ids {
          tx.execute("DELETE FROM memberships WHERE paper_id = ?1", [id])?;
          tx.execute("DELETE FROM papers WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(files)
      })
      .await?;

    Ok(files.into_iter().filter(|url| !url.is_empty()).collect())
  }
}

/// Reads one `papers` row selected with [`PAPER_COLUMNS`]. Memberships are attached separately.
fn draft_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaperDraft> {
  let supplementary: String = row.get(11)?;
  Ok(PaperDraft {
    id:                 uuid_column(row, 0)?,
    title:              row.get(1)?,
    authors:            row.get(2)?,
    publication:        row.get(3)?,
    pub_time:           row.get(4)?,
    doi:                row.get(5)?,
    arxiv:              row.get(6)?,
    note:               row.get(7)?,
    flag:               row.get(8)?,
    add_time:           row.get(9)?,
    tags:               Vec::new(),
    folders:            Vec::new(),
    main_url:           row.get(10)?,
    supplementary_urls: serde_json::from_str(&supplementary)
      .map_err(|e| conversion_error(11, e))?,
  })
}

/// Reads a text column holding a UUID.
fn uuid_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
  let text: String = row.get(index)?;
  Uuid::parse_str(&text).map_err(|e| conversion_error(index, e))
}

/// A conversion failure of a text column.
fn conversion_error(index: usize, e: impl Display) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.to_string().into())
}

/// The categorizer a membership should point at.
///
/// An existing categorizer of the same kind and name wins, so importing a tag by name twice never
/// creates two tags. Otherwise the categorizer is inserted, or renamed if its id already exists.
fn resolve_categorizer(
  tx: &Transaction<'_>,
  categorizer: &Categorizer,
  kind: CategorizerKind,
) -> rusqlite::Result<Categorizer> {
  let existing = tx
    .query_row(
      "SELECT id FROM categorizers WHERE kind = ?1 AND name = ?2",
      params![kind.to_string(), categorizer.name],
      |row| uuid_column(row, 0),
    )
    .optional()?;
  if let Some(id) = existing {
    return Ok(Categorizer { id, name: categorizer.name.clone(), kind });
  }

  tx.execute(
    "INSERT INTO categorizers (id, name, kind) VALUES (?1, ?2, ?3)
     ON CONFLICT(id) DO UPDATE SET name = excluded.name",
    params![categorizer.id.to_string(), categorizer.name, kind.to_string()],
  )?;
  Ok(Categorizer { kind, ..categorizer.clone() })
}

/// `main_url`, or the first `<stem>_<n><ext>` variant no other record references.
fn free_main_url(tx: &Transaction<'_>, id: Uuid, main_url: &str) -> rusqlite::Result<String> {
  if main_url.is_empty() {
    return Ok(String::new());
  }

  let taken = |candidate: &str| -> rusqlite::Result<bool> {
    tx.query_row(
      "SELECT EXISTS(SELECT 1 FROM papers WHERE main_url = ?1 AND id != ?2)",
      params![candidate, id.to_string()],
      |row| row.get(0),
    )
  };
  if !taken(main_url)? {
    return Ok(main_url.to_string());
  }

  let path = Path::new(main_url);
  let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
  let mut n = 1;
  loop {
    let candidate = format!("{stem}_{n}{ext}");
    if !taken(&candidate)? {
      debug!(from = main_url, to = %candidate, "Resolved file name clash");
      return Ok(candidate);
    }
    n += 1;
  }
}
