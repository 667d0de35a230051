use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use log::{debug, error};

use crate::engine::{Theme, ThemeMode};

pub const THEME_KEY: &str = "theme";
pub const LANGUAGE_KEY: &str = "language";
pub const SHOW_INDEX_DATA_KEY: &str = "showIndexData";
pub const SHOW_SUN_ILLUMINATION_KEY: &str = "showSunIllumination";

/// A persistent string to string store.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str);
  fn remove(&self, key: &str);
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    Self {
      values: Mutex::new(
        values
          .into_iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect(),
      ),
    }
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  fn set(&self, key: &str, value: &str) {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_string(), value.to_string());
  }

  fn remove(&self, key: &str) {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
  }
}

/// A JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
  path: PathBuf,
  values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Opens `path`. A missing or unreadable file starts out empty.
  #[must_use]
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let values = std::fs::read_to_string(&path)
      .inspect_err(|e| debug!("No preferences at {}: {e}", path.display()))
      .ok()
      .and_then(|data| {
        serde_json::from_str(&data)
          .inspect_err(|e| error!("Failed to read preferences {}: {e}", path.display()))
          .ok()
      })
      .unwrap_or_default();
    Self {
      path,
      values: Mutex::new(values),
    }
  }

  #[must_use]
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn persist(&self, values: &BTreeMap<String, String>) {
    if let Some(parent) = self.path.parent()
      && !parent.exists()
    {
      let _ = std::fs::create_dir_all(parent).inspect_err(|e| {
        error!("Failed to create preferences directory: {e}");
      });
    }
    match serde_json::to_string_pretty(values) {
      Ok(data) => {
        let _ = std::fs::write(&self.path, data).inspect_err(|e| {
          error!("Failed to write preferences: {e}");
        });
      }
      Err(e) => error!("Failed to serialize preferences: {e}"),
    }
  }

  fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut values);
    self.persist(&values);
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Option<String> {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  fn set(&self, key: &str, value: &str) {
    self.update(|values| {
      values.insert(key.to_string(), value.to_string());
    });
  }

  fn remove(&self, key: &str) {
    self.update(|values| {
      values.remove(key);
    });
  }
}

/// User preferences as read at start up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
  pub theme: ThemeMode,
  /// `None` follows the system language.
  pub language: Option<String>,
  pub show_index_data: bool,
  pub show_sun_illumination: bool,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      theme: ThemeMode::Auto,
      language: None,
      show_index_data: false,
      show_sun_illumination: true,
    }
  }
}

impl Preferences {
  #[must_use]
  pub fn load(store: &dyn KeyValueStore) -> Self {
    let theme = store
      .get(THEME_KEY)
      .and_then(|t| {
        t.parse::<Theme>()
          .inspect_err(|e| debug!("Ignoring stored theme: {e}"))
          .ok()
      })
      .map_or(ThemeMode::Auto, ThemeMode::Fixed);
    Self {
      theme,
      language: store
        .get(LANGUAGE_KEY)
        .filter(|l| !l.is_empty() && l != "auto"),
      show_index_data: store.get(SHOW_INDEX_DATA_KEY).as_deref() == Some("true"),
      show_sun_illumination: store.get(SHOW_SUN_ILLUMINATION_KEY).as_deref() != Some("false"),
    }
  }

  /// `Auto` is stored by removing the key.
  pub fn store_theme(store: &dyn KeyValueStore, theme: ThemeMode) {
    match theme {
      ThemeMode::Auto => store.remove(THEME_KEY),
      ThemeMode::Fixed(theme) => store.set(THEME_KEY, theme.as_str()),
    }
  }

  pub fn store_language(store: &dyn KeyValueStore, language: Option<&str>) {
    store.set(LANGUAGE_KEY, language.unwrap_or("auto"));
  }

  pub fn store_flag(store: &dyn KeyValueStore, key: &str, value: bool) {
    store.set(key, if value { "true" } else { "false" });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[test]
  fn defaults_on_empty_store() {
    assert_eq!(Preferences::load(&MemoryStore::new()), Preferences::default());
  }

  #[rstest]
  #[case(Some("true"), true, true)]
  #[case(Some("false"), false, false)]
  #[case(Some("yes"), false, true)]
  #[case(None, false, true)]
  fn flag_parsing(#[case] value: Option<&str>, #[case] index: bool, #[case] sun: bool) {
    let store = MemoryStore::new();
    if let Some(value) = value {
      store.set(SHOW_INDEX_DATA_KEY, value);
      store.set(SHOW_SUN_ILLUMINATION_KEY, value);
    }
    let prefs = Preferences::load(&store);
    assert_eq!(prefs.show_index_data, index);
    assert_eq!(prefs.show_sun_illumination, sun);
  }

  #[test]
  fn theme_roundtrip() {
    let store = MemoryStore::with_values([(THEME_KEY, "purple"), (LANGUAGE_KEY, "auto")]);
    let prefs = Preferences::load(&store);
    assert_eq!(prefs.theme, ThemeMode::Auto);
    assert_eq!(prefs.language, None);

    Preferences::store_theme(&store, ThemeMode::Fixed(Theme::HighContrast));
    assert_eq!(store.get(THEME_KEY).as_deref(), Some("high-contrast"));
    Preferences::store_theme(&store, ThemeMode::Auto);
    assert_eq!(store.get(THEME_KEY), None);

    Preferences::store_language(&store, Some("zh"));
    assert_eq!(Preferences::load(&store).language.as_deref(), Some("zh"));
  }

  #[test]
  fn file_store_persists() {
    let path = std::env::temp_dir()
      .join(format!("tzmap-prefs-{}", std::process::id()))
      .join("preferences.json");
    {
      let store = FileStore::open(&path);
      Preferences::store_flag(&store, SHOW_INDEX_DATA_KEY, true);
      store.set(THEME_KEY, "dark");
      store.remove(THEME_KEY);
    }
    let reopened = FileStore::open(&path);
    assert_eq!(reopened.get(SHOW_INDEX_DATA_KEY).as_deref(), Some("true"));
    assert_eq!(reopened.get(THEME_KEY), None);
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
  }
}
