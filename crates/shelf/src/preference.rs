//! Runtime preferences.
//!
//! Preferences are the settings a user changes while using the library (as opposed to the paths
//! in [`Config`](crate::config::Config)). They are stored as JSON values in a key/value table;
//! a key that was never set reads as its default.

use rusqlite::params;
use tokio_rusqlite::Connection;

use super::*;

/// The known preference keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
  /// `"cut"` to move imported files into storage, `"copy"` to leave the source in place
  SourceFileOperation,
  /// Whether the periodic preprint rescrape may run
  AllowRoutineRescrape,
  /// Unix seconds of the last completed rescrape
  LastRematchTime,
  /// Scraper names the periodic rescrape uses; empty means all
  RescrapeScrapers,
}

impl PreferenceKey {
  /// The key under which the value is stored.
  pub fn as_str(&self) -> &'static str {
    match self {
      PreferenceKey::SourceFileOperation => "source_file_operation",
      PreferenceKey::AllowRoutineRescrape => "allow_routine_rescrape",
      PreferenceKey::LastRematchTime => "last_rematch_time",
      PreferenceKey::RescrapeScrapers => "rescrape_scrapers",
    }
  }

  /// The value read when the key was never set.
  pub fn default_value(&self) -> PreferenceValue {
    match self {
      PreferenceKey::SourceFileOperation => PreferenceValue::Text("copy".into()),
      PreferenceKey::AllowRoutineRescrape => PreferenceValue::Bool(true),
      PreferenceKey::LastRematchTime => PreferenceValue::Integer(0),
      PreferenceKey::RescrapeScrapers => PreferenceValue::List(Vec::new()),
    }
  }
}

impl Display for PreferenceKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.as_str()) }
}

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
  /// A toggle
  Bool(bool),
  /// A number, e.g. a timestamp
  Integer(i64),
  /// A single string
  Text(String),
  /// A list of strings
  List(Vec<String>),
}

impl PreferenceValue {
  /// The toggle, if this is one.
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      PreferenceValue::Bool(value) => Some(*value),
      _ => None,
    }
  }

  /// The number, if this is one.
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      PreferenceValue::Integer(value) => Some(*value),
      _ => None,
    }
  }

  /// The string, if this is one.
  pub fn as_text(&self) -> Option<&str> {
    match self {
      PreferenceValue::Text(value) => Some(value),
      _ => None,
    }
  }

  /// The list, if this is one.
  pub fn as_list(&self) -> Option<&[String]> {
    match self {
      PreferenceValue::List(values) => Some(values),
      _ => None,
    }
  }
}

/// Reading and writing preferences.
#[async_trait]
pub trait Preferences: Send + Sync {
  /// Reads a preference, falling back to its default.
  async fn get(&self, key: PreferenceKey) -> Result<PreferenceValue>;

  /// Writes a preference.
  async fn set(&self, key: PreferenceKey, value: PreferenceValue) -> Result<()>;
}

/// Whether imports move their source files. Read failures fall back to copying.
pub async fn cut_on_import(preferences: &dyn Preferences) -> bool {
  match preferences.get(PreferenceKey::SourceFileOperation).await {
    Ok(value) => value.as_text() == Some("cut"),
    Err(e) => {
      warn!(error = %e, "Failed to read source file operation, copying");
      false
    },
  }
}

/// [`Preferences`] in a SQLite key/value table.
pub struct SqlitePreferences {
  /// Connection to the preferences database
  conn: Connection,
}

impl SqlitePreferences {
  /// Opens or creates a preferences database at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path.as_ref()).await?;
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/preferences.sql"
        )))?;
        Ok(())
      })
      .await?;
    Ok(Self { conn })
  }
}

#[async_trait]
impl Preferences for SqlitePreferences {
  async fn get(&self, key: PreferenceKey) -> Result<PreferenceValue> {
    let name = key.as_str();
    let stored = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached("SELECT value FROM config WHERE key = ?1")?;
        match stmt.query_row([name], |row| row.get::<_, String>(0)) {
          Ok(value) => Ok(Some(value)),
          Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match stored {
      Some(json) => Ok(serde_json::from_str(&json)?),
      None => Ok(key.default_value()),
    }
  }

  async fn set(&self, key: PreferenceKey, value: PreferenceValue) -> Result<()> {
    let (name, json) = (key.as_str(), serde_json::to_string(&value)?);
    self
      .conn
      .call(move |conn| {
        conn.execute("INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)", params![
          name, json
        ])?;
        Ok(())
      })
      .await?;
    debug!(key = %key, ?value, "Set preference");
    Ok(())
  }
}
