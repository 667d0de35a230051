use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use egui::Color32;
use log::{debug, info, warn};

use super::{
  color::{ColorAssigner, Theme},
  error::{AnnotationError, GeometryKind},
};
use crate::{
  map::{
    geometry_collection::{Geometry, Style},
    surface::{LayerId, RenderSurface},
  },
  timezone::TimezoneResolver,
};

/// Style of the precise boundary layer.
#[must_use]
pub fn detail_style(color: Color32) -> Style {
  Style::default()
    .with_color(color)
    .with_fill_color(color)
    .with_stroke_width(2.5)
    .with_opacity(0.9)
    .with_fill_opacity(0.15)
}

/// Style of the coarse index layer.
#[must_use]
pub fn index_style(color: Color32) -> Style {
  Style::default()
    .with_color(color)
    .with_fill_color(color)
    .with_stroke_width(1.5)
    .with_opacity(0.7)
    .with_fill_opacity(0.1)
    .with_interactive(false)
}

/// The cached layers of one timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct TimezoneLayerEntry {
  pub timezone_id: String,
  pub color: Color32,
  pub detail_geometry: Option<Geometry>,
  pub index_geometry: Option<Geometry>,
  /// `false` while the geometries are being fetched.
  pub loaded: bool,
}

impl TimezoneLayerEntry {
  fn loading(timezone_id: &str, color: Color32) -> Self {
    Self {
      timezone_id: timezone_id.to_string(),
      color,
      detail_geometry: None,
      index_geometry: None,
      loaded: false,
    }
  }
}

#[derive(Debug)]
struct CacheState {
  /// Insertion order is assignment order of the colors.
  entries: Vec<TimezoneLayerEntry>,
  colors: ColorAssigner,
  theme: Theme,
  show_index: bool,
}

impl CacheState {
  fn position(&self, timezone: &str) -> Option<usize> {
    self.entries.iter().position(|e| e.timezone_id == timezone)
  }
}

/// Timezone boundary layers currently on the map, at most one entry per timezone.
pub struct LayerCache {
  surface: Arc<dyn RenderSurface>,
  state: Mutex<CacheState>,
}

impl LayerCache {
  #[must_use]
  pub fn new(
    surface: Arc<dyn RenderSurface>,
    colors: ColorAssigner,
    theme: Theme,
    show_index: bool,
  ) -> Self {
    Self {
      surface,
      state: Mutex::new(CacheState {
        entries: Vec::new(),
        colors,
        theme,
        show_index,
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Fetches and displays the layers of `timezone` unless it is cached or being fetched.
  ///
  /// Returns `true` if this call fetched the geometry. Fetch failures are logged and leave
  /// the entry without the failed geometry.
  pub async fn ensure_loaded(&self, resolver: &dyn TimezoneResolver, timezone: &str) -> bool {
    {
      let mut state = self.state();
      if state.position(timezone).is_some() {
        debug!("Timezone {timezone} already cached.");
        return false;
      }
      let theme = state.theme;
      let color = state.colors.color_for(timezone, theme);
      state.entries.push(TimezoneLayerEntry::loading(timezone, color));
    }

    let (detail, index) = tokio::join!(
      resolver.detail_geometry(timezone),
      resolver.index_geometry(timezone)
    );
    let detail = Self::fetched(timezone, GeometryKind::Detail, detail);
    let index = Self::fetched(timezone, GeometryKind::Index, index);

    let mut state = self.state();
    let position = if let Some(position) = state.position(timezone) {
      position
    } else {
      debug!("Timezone {timezone} was evicted while loading, applying anyway.");
      let theme = state.theme;
      let color = state.colors.color_for(timezone, theme);
      state.entries.push(TimezoneLayerEntry::loading(timezone, color));
      state.entries.len() - 1
    };
    let show_index = state.show_index;
    let entry = &mut state.entries[position];
    entry.detail_geometry = detail;
    entry.index_geometry = index;
    entry.loaded = true;

    if let Some(geometry) = &entry.detail_geometry {
      self.surface.add_layer(
        LayerId::Detail(timezone.to_string()),
        geometry,
        &detail_style(entry.color),
      );
    }
    if show_index && let Some(geometry) = &entry.index_geometry {
      self.surface.add_layer(
        LayerId::Index(timezone.to_string()),
        geometry,
        &index_style(entry.color),
      );
    }
    info!("Loaded timezone {timezone}.");
    true
  }

  fn fetched(
    timezone: &str,
    kind: GeometryKind,
    result: anyhow::Result<Option<Geometry>>,
  ) -> Option<Geometry> {
    match result {
      Ok(Some(geometry)) => Some(geometry),
      Ok(None) if kind == GeometryKind::Index => {
        debug!("No index geometry for {timezone}.");
        None
      }
      Ok(None) => {
        warn!("No {kind} geometry for {timezone}.");
        None
      }
      Err(e) => {
        let err = match e.downcast::<AnnotationError>() {
          Ok(err) => err,
          Err(e) => AnnotationError::GeometryFetchFailed {
            timezone: timezone.to_string(),
            kind,
            reason: format!("{e:#}"),
          },
        };
        warn!("{err}");
        None
      }
    }
  }

  /// Removes both layers of `timezone` and forgets its color. Returns whether it was cached.
  pub fn evict(&self, timezone: &str) -> bool {
    let mut state = self.state();
    let Some(position) = state.position(timezone) else {
      return false;
    };
    state.entries.remove(position);
    state.colors.release(timezone);
    self
      .surface
      .remove_layer(&LayerId::Detail(timezone.to_string()));
    self
      .surface
      .remove_layer(&LayerId::Index(timezone.to_string()));
    debug!("Evicted timezone {timezone}.");
    true
  }

  /// Evicts every cached timezone not in `keep`. Returns the evicted identifiers.
  pub fn retain(&self, keep: &[String]) -> Vec<String> {
    let stale: Vec<String> = self
      .loaded_ids()
      .into_iter()
      .filter(|tz| !keep.contains(tz))
      .collect();
    for tz in &stale {
      self.evict(tz);
    }
    stale
  }

  /// Reassigns every color from the palette of `theme` in insertion order.
  pub fn restyle_all(&self, theme: Theme) {
    let mut state = self.state();
    state.theme = theme;
    state.colors.reset();
    let CacheState {
      entries, colors, ..
    } = &mut *state;
    for entry in entries.iter_mut() {
      entry.color = colors.color_for(&entry.timezone_id, theme);
      self.surface.set_style(
        &LayerId::Detail(entry.timezone_id.clone()),
        &detail_style(entry.color),
      );
      self.surface.set_style(
        &LayerId::Index(entry.timezone_id.clone()),
        &index_style(entry.color),
      );
    }
  }

  /// Shows or hides every cached index layer.
  pub fn toggle_index_visibility(&self, visible: bool) {
    let mut state = self.state();
    state.show_index = visible;
    for entry in &state.entries {
      let id = LayerId::Index(entry.timezone_id.clone());
      match (&entry.index_geometry, visible) {
        (Some(geometry), true) => {
          self
            .surface
            .add_layer(id, geometry, &index_style(entry.color));
        }
        (Some(_), false) => self.surface.remove_layer(&id),
        (None, _) => {}
      }
    }
  }

  /// Drops every layer and resets the colors.
  pub fn clear(&self) {
    let mut state = self.state();
    for entry in state.entries.drain(..) {
      self
        .surface
        .remove_layer(&LayerId::Detail(entry.timezone_id.clone()));
      self
        .surface
        .remove_layer(&LayerId::Index(entry.timezone_id));
    }
    state.colors.reset();
  }

  /// Cached identifiers in insertion order, including ones still loading.
  #[must_use]
  pub fn loaded_ids(&self) -> Vec<String> {
    self
      .state()
      .entries
      .iter()
      .map(|e| e.timezone_id.clone())
      .collect()
  }

  #[must_use]
  pub fn entry(&self, timezone: &str) -> Option<TimezoneLayerEntry> {
    let state = self.state();
    state.position(timezone).map(|p| state.entries[p].clone())
  }

  #[must_use]
  pub fn contains(&self, timezone: &str) -> bool {
    self.state().position(timezone).is_some()
  }

  #[must_use]
  pub fn color_table(&self) -> Vec<(String, Color32)> {
    self.state().colors.table()
  }

  #[must_use]
  pub fn theme(&self) -> Theme {
    self.state().theme
  }

  #[must_use]
  pub fn shows_index(&self) -> bool {
    self.state().show_index
  }
}
