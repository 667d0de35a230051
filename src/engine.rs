use serde::{Deserialize, Serialize};

use crate::map::coordinates::WGS84Coordinate;

/// Marker lifecycle and the wiring of all parts.
pub mod annotation;
/// Timezone colours and themes.
pub mod color;
pub mod error;
/// Loaded timezone boundary layers.
pub mod layer_cache;
pub mod marker;
/// Day/night boundary.
pub mod terminator;
pub mod timer;
/// Query string encoding of the map state.
pub mod view_state;

pub use annotation::{AnnotationEngine, EngineStatus};
pub use color::{ColorAssigner, PaletteOverrides, Palettes, Theme, ThemeMode};
pub use error::{AnnotationError, GeometryKind};
pub use layer_cache::{LayerCache, TimezoneLayerEntry};
pub use marker::{Marker, MarkerId, MarkerInfo, MarkerState};
pub use terminator::{SolarPosition, SunOverlay};
pub use view_state::ViewState;

/// Transient notification for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Toast {
  Loading(String),
  Error(String),
  Hidden,
}

/// Everything the engine tells the user interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
  MarkerAdded {
    id: MarkerId,
    position: WGS84Coordinate,
  },
  MarkerRemoved {
    id: MarkerId,
  },
  /// New content of the live clock of a marker.
  TimePanel {
    id: MarkerId,
    html: String,
  },
  Toast {
    toast: Toast,
  },
  /// The live query string changed.
  UrlChanged {
    query: String,
  },
}
