//! On-disk application configuration.
//!
//! [`Config`] holds the locations of everything a library consists of. It is stored as TOML,
//! by default in the platform configuration directory:
//!
//! ```toml
//! database_path    = "/home/ada/.local/share/shelf/shelf.db"
//! storage_path     = "/home/ada/Documents/shelf/papers"
//! cache_path       = "/home/ada/.local/share/shelf/cache.db"
//! preferences_path = "/home/ada/.local/share/shelf/preferences.db"
//! ```
//!
//! Fields missing from the file take their default.

use super::*;

/// File name of the configuration inside [`Config::default_dir`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Locations of a library's components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Record store database
  pub database_path:    PathBuf,
  /// Managed storage directory for document files
  pub storage_path:     PathBuf,
  /// Full-text cache database
  pub cache_path:       PathBuf,
  /// Runtime preferences database
  pub preferences_path: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    let data_dir = Self::default_data_dir();
    Self {
      database_path:    data_dir.join("shelf.db"),
      storage_path:     Self::default_storage_path(),
      cache_path:       data_dir.join("cache.db"),
      preferences_path: data_dir.join("preferences.db"),
    }
  }
}

impl Config {
  /// Directory holding the databases by default.
  ///
  /// - On Unix: `~/.local/share/shelf`
  /// - On macOS: `~/Library/Application Support/shelf`
  /// - On Windows: `%APPDATA%\shelf`
  /// - Fallback: `./shelf`
  pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("shelf")
  }

  /// Default managed storage directory, `~/Documents/shelf/papers` (or `./shelf/papers`).
  pub fn default_storage_path() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from(".")).join("shelf").join("papers")
  }

  /// Directory holding the configuration file, `<config dir>/shelf`.
  pub fn default_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("shelf")
  }

  /// Path of the default configuration file.
  pub fn default_path() -> PathBuf { Self::default_dir().join(CONFIG_FILE_NAME) }

  /// A configuration keeping every component inside `root`.
  ///
  /// Used for self-contained libraries, e.g. `shelf --path <dir>`.
  pub fn rooted_at(root: impl AsRef<Path>) -> Self {
    let root = root.as_ref();
    Self {
      database_path:    root.join("shelf.db"),
      storage_path:     root.join("papers"),
      cache_path:       root.join("cache.db"),
      preferences_path: root.join("preferences.db"),
    }
  }

  /// Sets the record store database path.
  pub fn with_database_path(mut self, path: impl AsRef<Path>) -> Self {
    self.database_path = path.as_ref().to_path_buf();
    self
  }

  /// Sets the managed storage directory.
  pub fn with_storage_path(mut self, path: impl AsRef<Path>) -> Self {
    self.storage_path = path.as_ref().to_path_buf();
    self
  }

  /// Sets the full-text cache database path.
  pub fn with_cache_path(mut self, path: impl AsRef<Path>) -> Self {
    self.cache_path = path.as_ref().to_path_buf();
    self
  }

  /// Sets the preferences database path.
  pub fn with_preferences_path(mut self, path: impl AsRef<Path>) -> Self {
    self.preferences_path = path.as_ref().to_path_buf();
    self
  }

  /// Reads a configuration file.
  pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(toml::from_str(&content)?)
  }

  /// Reads a configuration file, or returns the default when it does not exist.
  pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
    if tokio::fs::try_exists(path.as_ref()).await? {
      Self::load(path).await
    } else {
      debug!(path = %path.as_ref().display(), "No configuration file, using defaults");
      Ok(Self::default())
    }
  }

  /// Writes the configuration, creating the parent directory.
  pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, toml::to_string_pretty(self)?).await?;
    Ok(())
  }

  /// Creates the storage directory and the parent directories of every database.
  pub async fn ensure_directories(&self) -> Result<()> {
    tokio::fs::create_dir_all(&self.storage_path).await?;
    for db in [&self.database_path, &self.cache_path, &self.preferences_path] {
      if let Some(parent) = db.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
      }
    }
    Ok(())
  }
}
