use std::{fmt::Display, sync::Mutex};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{
  coordinates::WGS84Coordinate,
  geometry_collection::{Geometry, Style},
};
use crate::engine::MarkerId;

/// Identifies a layer on the render surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerId {
  /// Precise boundary of a timezone.
  Detail(String),
  /// Coarse index geometry of a timezone.
  Index(String),
  /// The pin of a placed marker.
  Marker(MarkerId),
  /// The day/night overlay.
  Terminator,
}

impl Display for LayerId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LayerId::Detail(tz) => write!(f, "detail:{tz}"),
      LayerId::Index(tz) => write!(f, "index:{tz}"),
      LayerId::Marker(id) => write!(f, "marker:{id}"),
      LayerId::Terminator => write!(f, "terminator"),
    }
  }
}

/// Center and zoom of the visible map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
  pub center: WGS84Coordinate,
  pub zoom: u8,
}

impl Default for MapView {
  fn default() -> Self {
    Self {
      center: WGS84Coordinate::new(0.0, 0.0),
      zoom: 2,
    }
  }
}

/// The map the engine draws on. Implementations are expected to be cheap and non-blocking.
pub trait RenderSurface: Send + Sync {
  /// Adds a layer or replaces the layer with the same id.
  fn add_layer(&self, id: LayerId, geometry: &Geometry, style: &Style);
  /// Removes a layer. Unknown ids are ignored.
  fn remove_layer(&self, id: &LayerId);
  /// Restyles a displayed layer. Unknown ids are ignored.
  fn set_style(&self, id: &LayerId, style: &Style);
  fn view(&self) -> MapView;
  fn set_view(&self, view: MapView);
}

/// A displayed layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLayer {
  pub id: LayerId,
  pub geometry: Geometry,
  pub style: Style,
}

/// A headless render surface that keeps the displayed layers in drawing order.
#[derive(Debug, Default)]
pub struct LayerStore {
  layers: Mutex<Vec<StoredLayer>>,
  view: Mutex<MapView>,
}

impl LayerStore {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of all displayed layers.
  #[must_use]
  pub fn layers(&self) -> Vec<StoredLayer> {
    self.layers.lock().map(|l| l.clone()).unwrap_or_default()
  }

  #[must_use]
  pub fn layer(&self, id: &LayerId) -> Option<StoredLayer> {
    self
      .layers
      .lock()
      .ok()?
      .iter()
      .find(|l| &l.id == id)
      .cloned()
  }

  #[must_use]
  pub fn contains(&self, id: &LayerId) -> bool {
    self.layer(id).is_some()
  }

  #[must_use]
  pub fn layer_ids(&self) -> Vec<LayerId> {
    self.layers().into_iter().map(|l| l.id).collect()
  }
}

impl RenderSurface for LayerStore {
  fn add_layer(&self, id: LayerId, geometry: &Geometry, style: &Style) {
    let Ok(mut layers) = self.layers.lock() else {
      return;
    };
    let layer = StoredLayer {
      id,
      geometry: geometry.clone(),
      style: style.clone(),
    };
    if let Some(existing) = layers.iter_mut().find(|l| l.id == layer.id) {
      debug!("Replacing layer {}.", layer.id);
      *existing = layer;
    } else {
      layers.push(layer);
    }
  }

  fn remove_layer(&self, id: &LayerId) {
    if let Ok(mut layers) = self.layers.lock() {
      layers.retain(|l| &l.id != id);
    }
  }

  fn set_style(&self, id: &LayerId, style: &Style) {
    if let Ok(mut layers) = self.layers.lock()
      && let Some(layer) = layers.iter_mut().find(|l| &l.id == id)
    {
      layer.style = style.clone();
    }
  }

  fn view(&self) -> MapView {
    self.view.lock().map(|v| *v).unwrap_or_default()
  }

  fn set_view(&self, view: MapView) {
    if let Ok(mut v) = self.view.lock() {
      *v = view;
    }
  }
}

#[cfg(test)]
mod tests {
  use egui::Color32;

  use super::*;

  #[test]
  fn add_replace_remove() {
    let store = LayerStore::new();
    let point = Geometry::point(WGS84Coordinate::new(1.0, 2.0));
    let id = LayerId::Detail("Europe/Berlin".to_string());

    store.add_layer(id.clone(), &point, &Style::default());
    store.add_layer(id.clone(), &point, &Style::default().with_color(Color32::RED));
    assert_eq!(store.layers().len(), 1);
    assert_eq!(store.layer(&id).unwrap().style.color(), Color32::RED);

    store.set_style(&id, &Style::default().with_color(Color32::GREEN));
    assert_eq!(store.layer(&id).unwrap().style.color(), Color32::GREEN);

    store.remove_layer(&id);
    assert!(!store.contains(&id));
    store.remove_layer(&id);
  }

  #[test]
  fn set_style_on_missing_layer_is_ignored() {
    let store = LayerStore::new();
    store.set_style(&LayerId::Terminator, &Style::default());
    assert!(store.layers().is_empty());
  }

  #[test]
  fn view_roundtrip() {
    let store = LayerStore::new();
    assert_eq!(store.view(), MapView::default());
    let view = MapView {
      center: WGS84Coordinate::new(48.1, 11.5),
      zoom: 7,
    };
    store.set_view(view);
    assert_eq!(store.view(), view);
  }

  #[test]
  fn layer_id_display() {
    assert_eq!(
      LayerId::Index("Asia/Tokyo".to_string()).to_string(),
      "index:Asia/Tokyo"
    );
    assert_eq!(LayerId::Terminator.to_string(), "terminator");
  }
}
