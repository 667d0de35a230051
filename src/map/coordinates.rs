use serde::{Deserialize, Serialize};

/// Number of decimal places markers are rounded to for display and storage.
pub const MARKER_PRECISION: i32 = 4;

/// The standard WGS84 coordinate system.
///
/// Serialized as `{"lat": .., "lng": ..}`, the shape used in shared links.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct WGS84Coordinate {
  #[serde(alias = "latitude")]
  pub lat: f64,
  #[serde(rename = "lng", alias = "lon", alias = "longitude")]
  pub lon: f64,
}

impl WGS84Coordinate {
  #[must_use]
  pub fn new(lat: f64, lon: f64) -> Self {
    Self { lat, lon }
  }

  /// Both components finite, `lat` in `[-90, 90]` and `lon` in `[-180, 180]`.
  #[must_use]
  pub fn is_valid(&self) -> bool {
    self.lat.is_finite()
      && self.lon.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lon)
  }

  #[must_use]
  pub fn rounded(&self) -> Self {
    Self {
      lat: round_to(self.lat, MARKER_PRECISION),
      lon: round_to(self.lon, MARKER_PRECISION),
    }
  }
}

/// Rounds half away from zero to `places` decimals.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
  let factor = 10f64.powi(places);
  (value * factor).round() / factor
}

/// Wraps a longitude into `[-180, 180)`.
#[must_use]
pub fn normalize_longitude(lon: f64) -> f64 {
  (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_approx_eq::assert_approx_eq;
  use rstest::rstest;

  #[rstest]
  #[case(0.0, 0.0, true)]
  #[case(90.0, 180.0, true)]
  #[case(-90.0, -180.0, true)]
  #[case(90.1, 0.0, false)]
  #[case(0.0, -180.5, false)]
  #[case(f64::NAN, 0.0, false)]
  #[case(0.0, f64::INFINITY, false)]
  fn validity(#[case] lat: f64, #[case] lon: f64, #[case] valid: bool) {
    assert_eq!(WGS84Coordinate::new(lat, lon).is_valid(), valid);
  }

  #[test]
  fn rounding_keeps_four_decimals() {
    let c = WGS84Coordinate::new(40.712_776, -74.005_974).rounded();
    assert_approx_eq!(c.lat, 40.7128, 1e-12);
    assert_approx_eq!(c.lon, -74.006, 1e-12);
  }

  #[test]
  fn serializes_with_lng_key() {
    let json = serde_json::to_string(&WGS84Coordinate::new(1.5, -2.25)).unwrap();
    assert_eq!(json, r#"{"lat":1.5,"lng":-2.25}"#);

    let parsed: WGS84Coordinate = serde_json::from_str(r#"{"latitude":3.0,"lon":4.0}"#).unwrap();
    assert_eq!(parsed, WGS84Coordinate::new(3.0, 4.0));
  }

  #[test]
  fn longitude_wraps() {
    assert_approx_eq!(normalize_longitude(190.0), -170.0);
    assert_approx_eq!(normalize_longitude(-190.0), 170.0);
    assert_approx_eq!(normalize_longitude(45.0), 45.0);
  }
}
