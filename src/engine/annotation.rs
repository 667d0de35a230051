use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{
  EngineEvent, Toast,
  color::{ColorAssigner, Theme, ThemeMode},
  error::AnnotationError,
  layer_cache::LayerCache,
  marker::{Marker, MarkerId, MarkerInfo},
  terminator::SunOverlay,
  timer::RepeatingTask,
  view_state,
};
use crate::{
  config::Config,
  map::{
    coordinates::WGS84Coordinate,
    geometry_collection::{Geometry, Style},
    surface::{LayerId, MapView, RenderSurface},
  },
  preferences::{
    KeyValueStore, Preferences, SHOW_INDEX_DATA_KEY, SHOW_SUN_ILLUMINATION_KEY,
  },
  timezone::{TimePanel, TimezoneResolver},
};

/// Style of marker pins.
#[must_use]
pub fn marker_style(theme: Theme) -> Style {
  Style::default()
    .with_color(theme.marker_color())
    .with_fill_color(theme.marker_color())
    .with_stroke_width(2.0)
    .with_fill_opacity(1.0)
}

/// What a status readout shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
  /// `None` while the timezone data is not loaded.
  pub data_version: Option<String>,
  pub markers: usize,
  pub loaded_timezones: Vec<String>,
  pub theme: Theme,
  pub theme_mode: ThemeMode,
  pub language: Option<String>,
  pub show_index_layers: bool,
  pub show_sun_illumination: bool,
}

#[derive(Debug)]
struct EngineState {
  markers: Vec<Marker>,
  next_id: u64,
  theme_mode: ThemeMode,
  language: Option<String>,
  /// The live synced query string.
  query: String,
}

/// Owns the markers and keeps the timezone layers, colours and URL consistent with them.
pub struct AnnotationEngine {
  surface: Arc<dyn RenderSurface>,
  store: Arc<dyn KeyValueStore>,
  resolver: RwLock<Option<Arc<dyn TimezoneResolver>>>,
  layers: LayerCache,
  sun: SunOverlay,
  state: Mutex<EngineState>,
  events: UnboundedSender<EngineEvent>,
  config: Config,
}

impl AnnotationEngine {
  /// Creates the engine from the stored preferences. Events are delivered on the returned
  /// receiver.
  pub fn new(
    surface: Arc<dyn RenderSurface>,
    store: Arc<dyn KeyValueStore>,
    config: Config,
  ) -> (Self, UnboundedReceiver<EngineEvent>) {
    let (events, receiver) = unbounded_channel();
    let preferences = Preferences::load(store.as_ref());
    let theme = preferences.theme.resolve(config.prefers_dark());
    debug!("Starting with {preferences:?}, theme {theme}.");

    let layers = LayerCache::new(
      surface.clone(),
      ColorAssigner::new(config.palettes()),
      theme,
      preferences.show_index_data,
    );
    let sun = SunOverlay::new(surface.clone(), theme, config.terminator_interval());
    if preferences.show_sun_illumination {
      sun.enable();
    }

    let engine = Self {
      surface,
      store,
      resolver: RwLock::new(None),
      layers,
      sun,
      state: Mutex::new(EngineState {
        markers: Vec::new(),
        next_id: 1,
        theme_mode: preferences.theme,
        language: preferences.language,
        query: String::new(),
      }),
      events,
      config,
    };
    (engine, receiver)
  }

  /// Makes the timezone data available. Until then markers cannot be added.
  pub fn attach_resolver(&self, resolver: Arc<dyn TimezoneResolver>) {
    info!("Timezone data {} attached.", resolver.data_version());
    *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = Some(resolver);
  }

  fn resolver(&self) -> Option<Arc<dyn TimezoneResolver>> {
    self
      .resolver
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn state(&self) -> MutexGuard<'_, EngineState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn emit(&self, event: EngineEvent) {
    if self.events.send(event).is_err() {
      debug!("No listener for engine events.");
    }
  }

  fn toast(&self, toast: Toast) {
    self.emit(EngineEvent::Toast { toast });
  }

  /// Places a marker and loads the layers of every timezone covering it.
  ///
  /// Nothing is changed if the position is invalid or not covered by any timezone.
  pub async fn add_marker(&self, lat: f64, lng: f64) -> Result<MarkerId, AnnotationError> {
    let result = self.place_marker(lat, lng).await;
    if let Err(e) = &result {
      warn!("Cannot add marker at {lat}, {lng}: {e}");
      self.toast(Toast::Error(e.to_string()));
    }
    result
  }

  async fn place_marker(&self, lat: f64, lng: f64) -> Result<MarkerId, AnnotationError> {
    let position = WGS84Coordinate::new(lat, lng);
    if !position.is_valid() {
      return Err(AnnotationError::InvalidCoordinate { lat, lng });
    }
    let resolver = self.resolver().ok_or(AnnotationError::ResolverUnavailable)?;
    let timezones: Vec<String> = resolver
      .resolve_timezones(lng, lat)
      .into_iter()
      .unique()
      .collect();
    if timezones.is_empty() {
      return Err(AnnotationError::NoTimezoneFound { lat, lng });
    }

    let (id, position) = {
      let mut state = self.state();
      let id = MarkerId(state.next_id);
      state.next_id += 1;
      let mut marker = Marker::new(id, position, timezones.clone());
      let position = marker.position();

      self.surface.add_layer(
        LayerId::Marker(id),
        &Geometry::point(position).with_label(format!("{}, {}", position.lat, position.lon)),
        &marker_style(self.layers.theme()),
      );
      marker.place(Some(self.start_clock(id, position, &timezones)));
      state.markers.push(marker);
      (id, position)
    };
    info!("Added marker {id} at {}, {} in {timezones:?}.", position.lat, position.lon);
    self.emit(EngineEvent::MarkerAdded { id, position });

    for timezone in &timezones {
      self.layers.ensure_loaded(resolver.as_ref(), timezone).await;
    }

    self.sync_url();
    Ok(id)
  }

  fn start_clock(
    &self,
    id: MarkerId,
    position: WGS84Coordinate,
    timezones: &[String],
  ) -> RepeatingTask {
    let panel = TimePanel::new(position, timezones);
    let events = self.events.clone();
    RepeatingTask::spawn(format!("clock {id}"), self.config.clock_interval(), move || {
      let _ = events.send(EngineEvent::TimePanel {
        id,
        html: panel.html(Utc::now()),
      });
    })
  }

  /// Removes a marker, stops its clock and evicts the timezones no other marker needs.
  pub fn remove_marker(&self, id: MarkerId) -> Result<MarkerInfo, AnnotationError> {
    let (mut marker, remaining) = {
      let mut state = self.state();
      let position = state
        .markers
        .iter()
        .position(|m| m.id() == id)
        .ok_or(AnnotationError::UnknownMarker(id))?;
      let marker = state.markers.remove(position);
      let remaining: Vec<(WGS84Coordinate, Vec<String>)> = state
        .markers
        .iter()
        .map(|m| (m.position(), m.timezones().to_vec()))
        .collect();
      (marker, remaining)
    };

    marker.remove();
    self.surface.remove_layer(&LayerId::Marker(id));
    debug!("Removed marker {id}.");
    self.emit(EngineEvent::MarkerRemoved { id });

    self.evict_unreferenced(&remaining);
    self.sync_url();
    Ok(marker.info())
  }

  /// Removes the most recent marker, if any.
  pub fn remove_last(&self) -> Option<MarkerInfo> {
    let last = self.state().markers.last().map(Marker::id)?;
    self.remove_marker(last).ok()
  }

  fn evict_unreferenced(&self, remaining: &[(WGS84Coordinate, Vec<String>)]) {
    let resolver = self.resolver();
    let referenced: Vec<String> = remaining
      .iter()
      .flat_map(|(position, stored)| match &resolver {
        Some(resolver) => resolver.resolve_timezones(position.lon, position.lat),
        None => stored.clone(),
      })
      .unique()
      .collect();
    let evicted = self.layers.retain(&referenced);
    if !evicted.is_empty() {
      debug!("Evicted timezones {evicted:?}.");
    }
  }

  /// Removes every marker and layer and resets the colours.
  pub fn clear_all(&self) {
    let markers: Vec<Marker> = self.state().markers.drain(..).collect();
    for mut marker in markers {
      marker.remove();
      self.surface.remove_layer(&LayerId::Marker(marker.id()));
      self.emit(EngineEvent::MarkerRemoved { id: marker.id() });
    }
    self.layers.clear();
    info!("Cleared all markers.");
    self.sync_url();
  }

  fn sync_url(&self) {
    let mut state = self.state();
    let positions: Vec<WGS84Coordinate> = state.markers.iter().map(Marker::position).collect();
    let query = view_state::sync_markers(&state.query, &positions);
    if query != state.query {
      state.query.clone_from(&query);
      drop(state);
      self.emit(EngineEvent::UrlChanged { query });
    }
  }

  /// Seeds the engine from a shared link: index visibility, markers in order, then the view.
  pub async fn restore(&self, query: &str) -> Vec<MarkerId> {
    let view = view_state::decode(query);
    self.state().query = query.trim_start_matches('?').to_string();

    if let Some(show_index) = view.show_index {
      self.layers.toggle_index_visibility(show_index);
    }

    let mut added = Vec::new();
    if !view.markers.is_empty() {
      self.toast(Toast::Loading("Loading markers...".to_string()));
      for marker in &view.markers {
        if let Ok(id) = self.add_marker(marker.lat, marker.lon).await {
          added.push(id);
        }
      }
      self.toast(Toast::Hidden);
    }

    if let Some(center) = view.center() {
      self.surface.set_view(MapView {
        center,
        zoom: view.zoom.unwrap_or(self.config.default_zoom()),
      });
    }
    added
  }

  /// Link reproducing the current markers, view and index visibility.
  #[must_use]
  pub fn shareable_url(&self) -> String {
    let view = self.surface.view();
    let query = view_state::encode(
      &self.marker_positions(),
      Some(view.center),
      Some(view.zoom),
      self.layers.shows_index(),
    );
    format!("{}?{query}", self.config.share_base_url())
  }

  /// Shows or hides the index layers and remembers the choice.
  pub fn set_index_layers(&self, visible: bool) {
    self.layers.toggle_index_visibility(visible);
    Preferences::store_flag(self.store.as_ref(), SHOW_INDEX_DATA_KEY, visible);
  }

  /// Flips index layer visibility. Returns the new state.
  pub fn toggle_index_layers(&self) -> bool {
    let visible = !self.layers.shows_index();
    self.set_index_layers(visible);
    visible
  }

  /// Switches the theme: recolours layers and pins and redraws the night overlay.
  pub fn set_theme(&self, mode: ThemeMode) {
    Preferences::store_theme(self.store.as_ref(), mode);
    let theme = mode.resolve(self.config.prefers_dark());
    self.layers.restyle_all(theme);

    let mut state = self.state();
    state.theme_mode = mode;
    let style = marker_style(theme);
    for marker in &state.markers {
      self.surface.set_style(&LayerId::Marker(marker.id()), &style);
    }
    drop(state);

    self.sun.set_theme(theme);
    info!("Theme set to {theme}.");
  }

  pub fn set_sun_illumination(&self, enabled: bool) {
    Preferences::store_flag(self.store.as_ref(), SHOW_SUN_ILLUMINATION_KEY, enabled);
    if enabled {
      self.sun.enable();
    } else {
      self.sun.disable();
    }
  }

  /// `None` follows the system language.
  pub fn set_language(&self, language: Option<String>) {
    Preferences::store_language(self.store.as_ref(), language.as_deref());
    self.state().language = language;
  }

  /// The data version of the attached resolver.
  #[must_use]
  pub fn data_version(&self) -> Option<String> {
    self.resolver().map(|r| r.data_version())
  }

  #[must_use]
  pub fn markers(&self) -> Vec<MarkerInfo> {
    self.state().markers.iter().map(Marker::info).collect()
  }

  #[must_use]
  pub fn marker_positions(&self) -> Vec<WGS84Coordinate> {
    self.state().markers.iter().map(Marker::position).collect()
  }

  /// The live clock of a marker.
  #[must_use]
  pub fn time_panel(&self, id: MarkerId) -> Option<TimePanel> {
    self
      .state()
      .markers
      .iter()
      .find(|m| m.id() == id)
      .map(|m| TimePanel::new(m.position(), m.timezones()))
  }

  /// Number of markers with a running clock.
  #[must_use]
  pub fn running_clocks(&self) -> usize {
    self
      .state()
      .markers
      .iter()
      .filter(|m| m.has_running_clock())
      .count()
  }

  #[must_use]
  pub fn layers(&self) -> &LayerCache {
    &self.layers
  }

  /// The live synced query string.
  #[must_use]
  pub fn current_query(&self) -> String {
    self.state().query.clone()
  }

  #[must_use]
  pub fn status(&self) -> EngineStatus {
    let state = self.state();
    EngineStatus {
      data_version: self.data_version(),
      markers: state.markers.len(),
      loaded_timezones: self.layers.loaded_ids(),
      theme: self.layers.theme(),
      theme_mode: state.theme_mode,
      language: state.language.clone(),
      show_index_layers: self.layers.shows_index(),
      show_sun_illumination: self.sun.is_enabled(),
    }
  }
}
