use log::warn;
use serde::{Deserialize, Serialize};

use super::error::AnnotationError;
use crate::map::coordinates::WGS84Coordinate;

pub const MARKERS_KEY: &str = "markers";
pub const LAT_KEY: &str = "lat";
pub const LNG_KEY: &str = "lng";
pub const ZOOM_KEY: &str = "zoom";
pub const SHOW_INDEX_KEY: &str = "showIndex";

/// The state carried in a shared link. Missing keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
  pub markers: Vec<WGS84Coordinate>,
  pub lat: Option<f64>,
  pub lng: Option<f64>,
  pub zoom: Option<u8>,
  pub show_index: Option<bool>,
}

impl ViewState {
  /// The map center if both components are present.
  #[must_use]
  pub fn center(&self) -> Option<WGS84Coordinate> {
    Some(WGS84Coordinate::new(self.lat?, self.lng?))
  }
}

/// Builds a query string. `center` and `zoom` are only written when given, `showIndex` only
/// when enabled, and `markers` only when there are any.
#[must_use]
pub fn encode(
  markers: &[WGS84Coordinate],
  center: Option<WGS84Coordinate>,
  zoom: Option<u8>,
  show_index: bool,
) -> String {
  let mut params = QueryParams::default();
  params.set_markers(markers);
  if let Some(center) = center {
    params.set(LAT_KEY, format!("{:.6}", center.lat));
    params.set(LNG_KEY, format!("{:.6}", center.lon));
  }
  if let Some(zoom) = zoom {
    params.set(ZOOM_KEY, zoom.to_string());
  }
  if show_index {
    params.set(SHOW_INDEX_KEY, "true".to_string());
  }
  params.to_string()
}

/// Reads a query string, with or without the leading `?`. Never fails: malformed values are
/// logged and treated as missing.
#[must_use]
pub fn decode(query: &str) -> ViewState {
  let params = QueryParams::parse(query);
  let markers = params
    .get(MARKERS_KEY)
    .map(|raw| {
      decode_markers(raw)
        .inspect_err(|e| warn!("{e}"))
        .unwrap_or_default()
    })
    .unwrap_or_default();
  ViewState {
    markers,
    lat: params.get(LAT_KEY).and_then(|v| v.trim().parse().ok()),
    lng: params.get(LNG_KEY).and_then(|v| v.trim().parse().ok()),
    zoom: params.get(ZOOM_KEY).and_then(|v| v.trim().parse().ok()),
    show_index: params.get(SHOW_INDEX_KEY).map(|v| v == "true"),
  }
}

/// Parses the JSON marker list of a link.
pub fn decode_markers(raw: &str) -> Result<Vec<WGS84Coordinate>, AnnotationError> {
  serde_json::from_str(raw).map_err(|e| AnnotationError::MalformedViewState(e.to_string()))
}

/// Rewrites only the `markers` key of `query`, keeping all other keys in place.
#[must_use]
pub fn sync_markers(query: &str, markers: &[WGS84Coordinate]) -> String {
  let mut params = QueryParams::parse(query);
  params.set_markers(markers);
  params.to_string()
}

/// Ordered `key=value` pairs of a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
  /// Accepts a bare query, `?query` or a full URL. A fragment is ignored.
  fn parse(query: &str) -> Self {
    let query = query.split_once('?').map_or(query, |(_, q)| q);
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    Self(form_urlencoded::parse(query.as_bytes()).into_owned().collect())
  }

  fn get(&self, key: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  /// Replaces the first `key` in place, dropping later duplicates, or appends it.
  fn set(&mut self, key: &str, value: String) {
    match self.0.iter().position(|(k, _)| k == key) {
      Some(first) => {
        self.0[first].1 = value;
        let mut index = 0;
        self.0.retain(|(k, _)| {
          let keep = k != key || index == first;
          index += 1;
          keep
        });
      }
      None => self.0.push((key.to_string(), value)),
    }
  }

  fn remove(&mut self, key: &str) {
    self.0.retain(|(k, _)| k != key);
  }

  fn set_markers(&mut self, markers: &[WGS84Coordinate]) {
    if markers.is_empty() {
      self.remove(MARKERS_KEY);
      return;
    }
    match serde_json::to_string(markers) {
      Ok(json) => self.set(MARKERS_KEY, json),
      Err(e) => warn!("Failed to serialize markers: {e}"),
    }
  }
}

impl std::fmt::Display for QueryParams {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(
      &form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&self.0)
        .finish(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;

  fn c(lat: f64, lng: f64) -> WGS84Coordinate {
    WGS84Coordinate::new(lat, lng)
  }

  #[test]
  fn empty_markers_are_omitted() {
    let query = encode(&[], None, None, true);
    assert_eq!(query, "showIndex=true");
    let state = decode(&query);
    assert!(state.markers.is_empty());
    assert_eq!(state.show_index, Some(true));
  }

  #[test]
  fn markers_roundtrip() {
    let markers = vec![c(40.7128, -74.006), c(51.5074, -0.1278), c(-33.8688, 151.2093)];
    let query = encode(&markers, None, None, false);
    assert!(query.starts_with("markers=%5B%7B%22lat%22"));
    assert_eq!(decode(&query).markers, markers);
  }

  #[test]
  fn share_link_has_center_and_zoom() {
    let query = encode(&[c(1.0, 2.0)], Some(c(48.137_154_3, 11.575_382)), Some(5), false);
    assert!(query.contains("lat=48.137154"));
    assert!(query.contains("lng=11.575382"));
    assert!(query.contains("zoom=5"));
    assert!(!query.contains("showIndex"));

    let state = decode(&format!("https://example.org/?{query}"));
    assert_approx_eq!(state.center().unwrap().lat, 48.137_154);
    assert_eq!(state.zoom, Some(5));
    assert_eq!(state.show_index, None);
  }

  #[test]
  fn malformed_markers_decode_to_empty() {
    let state = decode("?markers=%5B%7Bbroken&zoom=3&showIndex=false");
    assert!(state.markers.is_empty());
    assert_eq!(state.zoom, Some(3));
    assert_eq!(state.show_index, Some(false));
    assert!(matches!(
      decode_markers("[{"),
      Err(AnnotationError::MalformedViewState(_))
    ));
  }

  #[test]
  fn missing_keys_are_none() {
    assert_eq!(decode(""), ViewState::default());
    assert_eq!(decode("?lat=abc").lat, None);
    assert!(decode("?lat=1").center().is_none());
  }

  #[test]
  fn sync_keeps_other_keys() {
    let query = "lat=10.000000&markers=old&zoom=4";
    let synced = sync_markers(query, &[c(1.0, 2.0)]);
    assert!(synced.starts_with("lat=10.000000&markers="));
    assert!(synced.ends_with("&zoom=4"));
    assert_eq!(decode(&synced).markers, vec![c(1.0, 2.0)]);

    assert_eq!(sync_markers(&synced, &[]), "lat=10.000000&zoom=4");
  }

  #[test]
  fn form_encoding_rules_apply() {
    let state = decode("?zoom=+7&showIndex=true&markers=%5B%5D#map");
    assert_eq!(state.zoom, Some(7));
    assert_eq!(state.show_index, Some(true));
    assert!(state.markers.is_empty());

    let synced = sync_markers("markers=a&other=x%26y&markers=b", &[c(0.5, -0.5)]);
    assert!(synced.ends_with("&other=x%26y"));
    assert_eq!(synced.matches("markers=").count(), 1);
    assert_eq!(decode(&synced).markers, vec![c(0.5, -0.5)]);
  }

  #[test]
  fn plain_json_is_accepted() {
    let state = decode(r#"markers=[{"lat":1.5,"lng":2.5}]"#);
    assert_eq!(state.markers, vec![c(1.5, 2.5)]);
  }
}
