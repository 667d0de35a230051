use std::{path::PathBuf, time::Duration};

use dirs::home_dir;
use log::error;

use crate::engine::{PaletteOverrides, Palettes};

pub const DEFAULT_PORT: u16 = 12346;
const DEFAULT_SHARE_URL: &str = "http://localhost:12346/";
const DEFAULT_ZOOM: u8 = 2;
const DEFAULT_CLOCK_INTERVAL_MS: u64 = 1000;
const DEFAULT_TERMINATOR_INTERVAL_SECS: u64 = 60;

/// Settings from the environment, `~/.config/tzmap/config.json` and built-in defaults, in
/// that order of precedence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
  pub config_path: Option<PathBuf>,
  /// Directory with one detail boundary `GeoJSON` per timezone.
  #[serde(default)]
  pub boundary_dir: Option<PathBuf>,
  /// Directory with one index `GeoJSON` per timezone.
  #[serde(default)]
  pub index_dir: Option<PathBuf>,
  #[serde(default)]
  pub share_base_url: Option<String>,
  #[serde(default)]
  pub port: Option<u16>,
  #[serde(default)]
  pub default_zoom: Option<u8>,
  #[serde(default)]
  pub clock_interval_ms: Option<u64>,
  #[serde(default)]
  pub terminator_interval_secs: Option<u64>,
  /// What the automatic theme resolves to.
  #[serde(default)]
  pub prefers_dark: Option<bool>,
  #[serde(default)]
  pub palettes: PaletteOverrides,
}

impl Config {
  #[must_use]
  pub fn new() -> Self {
    let from_env = Self::from_env();
    let from_file = Self::from_file();
    let default = Self::default();

    let mut merged = from_env;
    if let Some(from_file) = &from_file {
      merged = merged.merge(from_file);
    }
    merged = merged.merge(&default);

    if merged.config_path.is_some() && from_file.is_none() {
      merged.init_cfg_file();
    }

    merged
  }

  fn empty() -> Self {
    Self {
      config_path: None,
      boundary_dir: None,
      index_dir: None,
      share_base_url: None,
      port: None,
      default_zoom: None,
      clock_interval_ms: None,
      terminator_interval_secs: None,
      prefers_dark: None,
      palettes: PaletteOverrides::default(),
    }
  }

  fn from_env() -> Self {
    let env_path = |key: &str| std::env::var(key).ok().map(PathBuf::from);
    Self {
      config_path: env_path("TZMAP_CONFIG"),
      boundary_dir: env_path("TZMAP_BOUNDARY_DIR"),
      index_dir: env_path("TZMAP_INDEX_DIR"),
      share_base_url: std::env::var("TZMAP_SHARE_URL").ok(),
      port: std::env::var("TZMAP_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().inspect_err(|e| error!("Invalid TZMAP_PORT: {e}")).ok()),
      ..Self::empty()
    }
  }

  fn merge(mut self, other: &Self) -> Self {
    self.config_path = self.config_path.or(other.config_path.clone());
    self.boundary_dir = self.boundary_dir.or(other.boundary_dir.clone());
    self.index_dir = self.index_dir.or(other.index_dir.clone());
    self.share_base_url = self.share_base_url.or(other.share_base_url.clone());
    self.port = self.port.or(other.port);
    self.default_zoom = self.default_zoom.or(other.default_zoom);
    self.clock_interval_ms = self.clock_interval_ms.or(other.clock_interval_ms);
    self.terminator_interval_secs = self
      .terminator_interval_secs
      .or(other.terminator_interval_secs);
    self.prefers_dark = self.prefers_dark.or(other.prefers_dark);

    if self.palettes.light.is_empty() {
      self.palettes.light.clone_from(&other.palettes.light);
    }
    if self.palettes.dark.is_empty() {
      self.palettes.dark.clone_from(&other.palettes.dark);
    }
    if self.palettes.high_contrast.is_empty() {
      self
        .palettes
        .high_contrast
        .clone_from(&other.palettes.high_contrast);
    }

    self
  }

  fn from_file() -> Option<Self> {
    let config_path = std::env::var("TZMAP_CONFIG")
      .ok()
      .map(PathBuf::from)
      .or_else(|| home_dir().map(|p| p.join(".config").join("tzmap")))?;
    let config_path = config_path.join("config.json");

    serde_json::from_str(&std::fs::read_to_string(&config_path).ok()?)
      .inspect_err(|e| error!("Failed to read config file: {e}"))
      .ok()?
  }

  fn init_cfg_file(&self) {
    if let Some(path) = &self.config_path {
      if !path.exists() {
        let _ = std::fs::create_dir_all(path).inspect_err(|e| {
          error!("Failed to create config directory: {e}");
        });
      }

      let path = path.join("config.json");
      if !path.exists() {
        let config = serde_json::to_string_pretty(self);
        if let Ok(config) = config {
          let _ = std::fs::write(path, config).inspect_err(|e| {
            error!("Failed to write config file: {e}");
          });
        } else {
          error!("Failed to serialize config");
        }
      }
    }
  }

  /// File backing the user preferences, next to the config file.
  #[must_use]
  pub fn preferences_path(&self) -> Option<PathBuf> {
    self
      .config_path
      .as_ref()
      .map(|p| p.join("preferences.json"))
  }

  #[must_use]
  pub fn share_base_url(&self) -> &str {
    self.share_base_url.as_deref().unwrap_or(DEFAULT_SHARE_URL)
  }

  #[must_use]
  pub fn port(&self) -> u16 {
    self.port.unwrap_or(DEFAULT_PORT)
  }

  #[must_use]
  pub fn default_zoom(&self) -> u8 {
    self.default_zoom.unwrap_or(DEFAULT_ZOOM)
  }

  #[must_use]
  pub fn clock_interval(&self) -> Duration {
    Duration::from_millis(self.clock_interval_ms.unwrap_or(DEFAULT_CLOCK_INTERVAL_MS))
  }

  #[must_use]
  pub fn terminator_interval(&self) -> Duration {
    Duration::from_secs(
      self
        .terminator_interval_secs
        .unwrap_or(DEFAULT_TERMINATOR_INTERVAL_SECS),
    )
  }

  #[must_use]
  pub fn prefers_dark(&self) -> bool {
    self.prefers_dark.unwrap_or(false)
  }

  /// Built-in palettes with the configured overrides.
  #[must_use]
  pub fn palettes(&self) -> Palettes {
    Palettes::with_overrides(&self.palettes)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      config_path: home_dir().map(|p| p.join(".config").join("tzmap")),
      share_base_url: Some(DEFAULT_SHARE_URL.to_string()),
      port: Some(DEFAULT_PORT),
      default_zoom: Some(DEFAULT_ZOOM),
      clock_interval_ms: Some(DEFAULT_CLOCK_INTERVAL_MS),
      terminator_interval_secs: Some(DEFAULT_TERMINATOR_INTERVAL_SECS),
      prefers_dark: Some(false),
      ..Self::empty()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn earlier_sources_win() {
    let env = Config {
      port: Some(8080),
      ..Config::empty()
    };
    let file = Config {
      port: Some(9090),
      boundary_dir: Some(PathBuf::from("/data/tz")),
      palettes: PaletteOverrides {
        dark: vec!["#000".to_string()],
        ..PaletteOverrides::default()
      },
      ..Config::empty()
    };
    let merged = env.merge(&file).merge(&Config::default());

    assert_eq!(merged.port(), 8080);
    assert_eq!(merged.boundary_dir, Some(PathBuf::from("/data/tz")));
    assert_eq!(merged.share_base_url(), DEFAULT_SHARE_URL);
    assert_eq!(merged.palettes.dark, vec!["#000"]);
    assert_eq!(merged.terminator_interval(), Duration::from_secs(60));
  }

  #[test]
  fn partial_file_parses() {
    let config: Config =
      serde_json::from_str(r#"{"config_path": null, "prefers_dark": true}"#).unwrap();
    assert!(config.prefers_dark());
    assert_eq!(config.port(), DEFAULT_PORT);
    assert_eq!(config.clock_interval(), Duration::from_secs(1));
  }
}
