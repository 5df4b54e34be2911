//! Moving document files into and around managed storage.
//!
//! Every managed file lives directly inside one storage directory and is referenced by its base
//! name. A draft's files are named after [`PaperDraft::filename_stem`]: the primary file keeps
//! the stem, supplementary files get a `_sup<n>` suffix, and both keep their original extension.
//!
//! References that are still absolute paths point at files outside managed storage (a fresh
//! import). [`FileAccess::move_draft`] brings them in, either by moving the source (`cut`) or by
//! copying it.

use super::*;

/// Filesystem operations the pipeline depends on.
#[async_trait]
pub trait FileAccess: Send + Sync {
  /// The managed storage directory relative references resolve against.
  fn storage_dir(&self) -> &Path;

  /// Whether the referenced file exists.
  async fn access(&self, url: &str) -> bool;

  /// Relocates a draft's files into managed storage.
  ///
  /// Returns the draft with its references replaced by managed base names, or `None` when
  /// nothing had to move. References that are already managed are only renamed when `force` is
  /// set.
  async fn move_draft(
    &self,
    draft: &PaperDraft,
    cut: bool,
    force: bool,
  ) -> Result<Option<PaperDraft>>;

  /// Removes a file.
  async fn remove_file(&self, url: &str) -> Result<()>;

  /// Renames or moves a file. Either reference may be managed or absolute.
  async fn move_file(&self, from: &str, to: &str) -> Result<()>;
}

/// [`FileAccess`] over a flat local storage directory.
#[derive(Debug, Clone)]
pub struct LocalFileAccess {
  /// Where managed files live
  storage_dir: PathBuf,
}

impl LocalFileAccess {
  /// Creates a file access rooted at `storage_dir`. The directory is created on first write.
  pub fn new(storage_dir: impl AsRef<Path>) -> Self {
    Self { storage_dir: storage_dir.as_ref().to_path_buf() }
  }

  /// Resolves a reference to a filesystem path.
  pub fn resolve(&self, url: &str) -> PathBuf {
    let path = Path::new(url);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.storage_dir.join(path)
    }
  }

  /// Brings one referenced file into storage under `stem` plus its extension.
  ///
  /// Returns the new base name, or `None` when the reference is already managed and `force` is
  /// not set.
  async fn relocate(&self, url: &str, stem: &str, cut: bool, force: bool) -> Result<Option<String>> {
    if !Path::new(url).is_absolute() && !force {
      return Ok(None);
    }

    let source = self.resolve(url);
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
      return Err(ShelfError::Access(source.display().to_string()));
    }

    let name = match source.extension() {
      Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
      None => stem.to_string(),
    };
    let target = self.storage_dir.join(&name);
    if source == target {
      return Ok(Some(name));
    }

    tokio::fs::create_dir_all(&self.storage_dir).await?;
    let outcome = if cut {
      move_path(&source, &target).await
    } else {
      tokio::fs::copy(&source, &target).await.map(|_| ())
    };
    outcome.map_err(|e| ShelfError::Relocation(format!("{}: {e}", source.display())))?;

    debug!(from = %source.display(), to = %name, cut, "Relocated file");
    Ok(Some(name))
  }

  /// Puts files relocated by a failed [`FileAccess::move_draft`] back the way they were: cut
  /// files return to their source, copies are removed.
  async fn undo_relocations(&self, relocated: &[(String, String)], cut: bool) {
    for (original, name) in relocated.iter().rev() {
      let (source, target) = (self.resolve(original), self.storage_dir.join(name));
      if source == target {
        continue;
      }
      let outcome = if cut {
        move_path(&target, &source).await
      } else {
        tokio::fs::remove_file(&target).await
      };
      if let Err(e) = outcome {
        error!(file = %target.display(), error = %e, "Failed to undo relocation");
      }
    }
  }
}

/// Renames a file, falling back to copy-and-remove across filesystems.
async fn move_path(from: &Path, to: &Path) -> std::io::Result<()> {
  if tokio::fs::rename(from, to).await.is_ok() {
    return Ok(());
  }
  tokio::fs::copy(from, to).await?;
  tokio::fs::remove_file(from).await
}

#[async_trait]
impl FileAccess for LocalFileAccess {
  fn storage_dir(&self) -> &Path { &self.storage_dir }

  async fn access(&self, url: &str) -> bool {
    if url.is_empty() {
      return false;
    }
    tokio::fs::try_exists(self.resolve(url)).await.unwrap_or(false)
  }

  async fn move_draft(
    &self,
    draft: &PaperDraft,
    cut: bool,
    force: bool,
  ) -> Result<Option<PaperDraft>> {
    let stem = draft.filename_stem();
    let mut moved = draft.clone();
    let mut changed = false;
    // Files brought in by this call, as (original reference, managed name)
    let mut relocated = Vec::new();

    if !draft.main_url.is_empty() {
      if let Some(name) = self.relocate(&draft.main_url, &stem, cut, force).await? {
        changed |= name != draft.main_url;
        relocated.push((draft.main_url.clone(), name.clone()));
        moved.main_url = name;
      }
    }

    for (index, url) in draft.supplementary_urls.iter().enumerate() {
      let sup_stem = format!("{stem}_sup{}", index + 1);
      match self.relocate(url, &sup_stem, cut, force).await {
        Ok(Some(name)) => {
          changed |= name != *url;
          relocated.push((url.clone(), name.clone()));
          moved.supplementary_urls[index] = name;
        },
        Ok(None) => {},
        // A missing supplementary file does not hold back the primary one.
        Err(ShelfError::Access(path)) => {
          warn!(id = %draft.id, path = %path, "Supplementary file is not accessible");
        },
        Err(e) => {
          self.undo_relocations(&relocated, cut).await;
          return Err(e);
        },
      }
    }

    Ok(changed.then_some(moved))
  }

  async fn remove_file(&self, url: &str) -> Result<()> {
    let path = self.resolve(url);
    tokio::fs::remove_file(&path).await?;
    trace!(path = %path.display(), "Removed file");
    Ok(())
  }

  async fn move_file(&self, from: &str, to: &str) -> Result<()> {
    let (from, to) = (self.resolve(from), self.resolve(to));
    if let Some(parent) = to.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    move_path(&from, &to)
      .await
      .map_err(|e| ShelfError::Relocation(format!("{} -> {}: {e}", from.display(), to.display())))
  }
}
