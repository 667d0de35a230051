use std::{
  f64::consts::PI,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use egui::Color32;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{color::Theme, timer::RepeatingTask};
use crate::map::{
  coordinates::{WGS84Coordinate, normalize_longitude},
  geometry_collection::{Geometry, Style},
  surface::{LayerId, RenderSurface},
};

/// Longitude resolution of the day/night boundary in degrees.
pub const DEFAULT_STEP: f64 = 0.5;

const DEG: f64 = PI / 180.0;

/// Low precision position of the sun. All angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
  pub julian_date: f64,
  pub julian_century: f64,
  pub mean_longitude: f64,
  pub mean_anomaly: f64,
  pub eccentricity: f64,
  pub equation_of_center: f64,
  pub true_longitude: f64,
  pub true_anomaly: f64,
  /// Sun to earth distance in astronomical units.
  pub distance: f64,
  pub obliquity: f64,
  pub declination: f64,
  pub sidereal_time: f64,
  pub hour_angle: f64,
  /// The point with the sun in its zenith.
  pub subsolar: WGS84Coordinate,
}

impl SolarPosition {
  #[must_use]
  #[allow(clippy::cast_precision_loss)]
  pub fn at(time: DateTime<Utc>) -> Self {
    let julian_date = time.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5;
    let t = (julian_date - 2_451_545.0) / 36525.0;

    let mean_longitude = (280.466_46 + t * (36_000.769_83 + t * 0.000_303_2)).rem_euclid(360.0);
    let mean_anomaly = (357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t)).rem_euclid(360.0);
    let eccentricity = 0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t);

    let m = mean_anomaly * DEG;
    let equation_of_center = (1.914_602 - t * (0.004_817 + 0.000_014 * t)) * m.sin()
      + (0.019_993 - 0.000_101 * t) * (2.0 * m).sin()
      + 0.000_289 * (3.0 * m).sin();

    let true_longitude = mean_longitude + equation_of_center;
    let true_anomaly = mean_anomaly + equation_of_center;
    let distance = 1.000_001_018 * (1.0 - eccentricity * eccentricity)
      / (1.0 + eccentricity * (true_anomaly * DEG).cos());

    let obliquity =
      23.439_291_11 - t * (0.013_004_167 + t * (0.000_000_163_9 + t * 0.000_000_503_6));
    let declination = ((obliquity * DEG).sin() * (true_longitude * DEG).sin()).asin() / DEG;

    let sidereal_time = 280.460_618_37
      + 360.985_647_366_29 * (julian_date - 2_451_545.0)
      + t * t * 0.000_387_933;
    let hour_angle = (sidereal_time % 360.0 - true_longitude) % 360.0;

    Self {
      julian_date,
      julian_century: t,
      mean_longitude,
      mean_anomaly,
      eccentricity,
      equation_of_center,
      true_longitude,
      true_anomaly,
      distance,
      obliquity,
      declination,
      sidereal_time,
      hour_angle,
      subsolar: WGS84Coordinate::new(declination, normalize_longitude(-hour_angle)),
    }
  }
}

/// The night side of the earth at `time` as a closed ring.
#[must_use]
pub fn terminator_polygon(time: DateTime<Utc>, step: f64) -> Vec<WGS84Coordinate> {
  terminator_for_subsolar(SolarPosition::at(time).subsolar, step)
}

/// The night side for a given subsolar point.
///
/// Samples without a finite boundary latitude are dropped, so a sun exactly above the equator
/// yields an empty ring.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn terminator_for_subsolar(subsolar: WGS84Coordinate, step: f64) -> Vec<WGS84Coordinate> {
  let step = if step.is_finite() && step > 0.0 && step <= 180.0 {
    step
  } else {
    DEFAULT_STEP
  };
  // Steps not dividing 360 stop short of the antimeridian instead of passing it.
  let samples = (360.0 / step + 1e-9).floor() as usize;
  let tan_lat = (subsolar.lat * DEG).tan();

  let mut ring: Vec<WGS84Coordinate> = (0..=samples)
    .filter_map(|i| {
      let lng = -180.0 + i as f64 * step;
      let ratio = -((lng - subsolar.lon) * DEG).cos() / tan_lat;
      if !ratio.is_finite() {
        return None;
      }
      let lat = ratio.atan() / DEG;
      (lat.abs() <= 90.0).then_some(WGS84Coordinate::new(lat, lng))
    })
    .collect();

  let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) else {
    debug!("Sun above the equator, no terminator.");
    return ring;
  };
  let pole = if subsolar.lat > 0.0 { -90.0 } else { 90.0 };
  ring.push(WGS84Coordinate::new(pole, last.lon));
  ring.extend((0..=samples).map(|i| WGS84Coordinate::new(pole, 180.0 - i as f64 * step)));
  ring.push(WGS84Coordinate::new(pole, first.lon));
  ring.push(first);
  ring
}

/// Style of the night overlay.
#[must_use]
pub fn night_style(theme: Theme) -> Style {
  let (fill, opacity) = match theme {
    Theme::Light => (Color32::from_rgb(0x1a, 0x20, 0x2c), 0.2),
    Theme::Dark => (Color32::BLACK, 0.4),
    Theme::HighContrast => (Color32::from_rgb(0x00, 0x00, 0x80), 0.5),
  };
  Style::default()
    .with_color(fill)
    .with_fill_color(fill)
    .with_stroke_width(0.0)
    .with_opacity(0.0)
    .with_fill_opacity(opacity)
    .with_interactive(false)
}

/// Draws the night overlay and keeps it current while enabled.
pub struct SunOverlay {
  surface: Arc<dyn RenderSurface>,
  style: Arc<Mutex<Style>>,
  interval: Duration,
  task: Mutex<Option<RepeatingTask>>,
}

impl SunOverlay {
  #[must_use]
  pub fn new(surface: Arc<dyn RenderSurface>, theme: Theme, interval: Duration) -> Self {
    Self {
      surface,
      style: Arc::new(Mutex::new(night_style(theme))),
      interval,
      task: Mutex::new(None),
    }
  }

  fn draw(surface: &dyn RenderSurface, style: &Mutex<Style>, time: DateTime<Utc>) {
    let ring = terminator_polygon(time, DEFAULT_STEP);
    let style = style.lock().unwrap_or_else(PoisonError::into_inner).clone();
    if ring.is_empty() {
      surface.remove_layer(&LayerId::Terminator);
    } else {
      surface.add_layer(
        LayerId::Terminator,
        &Geometry::polygon(ring).with_label("Night".to_string()),
        &style,
      );
    }
  }

  /// Draws the overlay now and redraws it every interval. Does nothing if already enabled.
  pub fn enable(&self) {
    let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
    if task.is_some() {
      return;
    }
    Self::draw(self.surface.as_ref(), &self.style, Utc::now());
    let surface = self.surface.clone();
    let style = self.style.clone();
    *task = Some(RepeatingTask::spawn("terminator", self.interval, move || {
      Self::draw(surface.as_ref(), &style, Utc::now());
    }));
  }

  /// Stops the timer and removes the overlay.
  pub fn disable(&self) {
    if let Some(task) = self
      .task
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
    {
      task.cancel();
    }
    self.surface.remove_layer(&LayerId::Terminator);
  }

  #[must_use]
  pub fn is_enabled(&self) -> bool {
    self
      .task
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  /// Redraws the overlay for `time` if enabled.
  pub fn redraw(&self, time: DateTime<Utc>) {
    if self.is_enabled() {
      Self::draw(self.surface.as_ref(), &self.style, time);
    }
  }

  /// Switches the overlay style, redrawing if enabled.
  pub fn set_theme(&self, theme: Theme) {
    *self.style.lock().unwrap_or_else(PoisonError::into_inner) = night_style(theme);
    self.redraw(Utc::now());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::map::surface::LayerStore;
  use assert_approx_eq::assert_approx_eq;
  use chrono::TimeZone;
  use rstest::rstest;

  fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
  }

  #[test]
  fn solstice_position() {
    let sun = SolarPosition::at(utc(2024, 6, 21, 12, 0));
    assert_approx_eq!(sun.julian_date, 2_460_483.0, 1e-9);
    assert_approx_eq!(sun.declination, 23.4347, 1e-3);
    assert_approx_eq!(sun.subsolar.lon, 0.4332, 1e-2);
    assert_approx_eq!(sun.distance, 1.016_27, 1e-4);
  }

  #[test]
  fn winter_solstice_position() {
    let sun = SolarPosition::at(utc(2024, 12, 21, 12, 0));
    assert_approx_eq!(sun.declination, -23.436, 1e-2);
    assert_approx_eq!(sun.subsolar.lon, -0.427, 1e-2);
  }

  #[test]
  fn subsolar_longitude_is_normalized() {
    let sun = SolarPosition::at(utc(2024, 6, 20, 20, 51));
    assert_approx_eq!(sun.subsolar.lon, -132.297, 1e-2);
    for hour in 0..24 {
      let lon = SolarPosition::at(utc(2024, 3, 1, hour, 0)).subsolar.lon;
      assert!((-180.0..=180.0).contains(&lon), "{lon}");
    }
  }

  #[test]
  fn june_ring_closes_over_south_pole() {
    let ring = terminator_polygon(utc(2024, 6, 21, 12, 0), DEFAULT_STEP);
    assert_eq!(ring.len(), 721 + 1 + 721 + 1 + 1);
    assert_eq!(ring.first(), ring.last());
    assert_approx_eq!(ring[721].lat, -90.0);
    assert_approx_eq!(ring[722].lon, 180.0);
    assert!(ring[..721].iter().all(|c| c.lat.abs() <= 90.0));
  }

  #[test]
  fn december_ring_closes_over_north_pole() {
    let ring = terminator_polygon(utc(2024, 12, 21, 0, 0), 1.0);
    assert_eq!(ring.len(), 361 + 1 + 361 + 1 + 1);
    assert_approx_eq!(ring[361].lat, 90.0);
  }

  #[test]
  fn equator_sun_gives_empty_ring() {
    let ring = terminator_for_subsolar(WGS84Coordinate::new(0.0, 10.0), DEFAULT_STEP);
    assert!(ring.is_empty());
  }

  #[test]
  fn invalid_step_uses_default() {
    let ring = terminator_for_subsolar(WGS84Coordinate::new(10.0, 0.0), -1.0);
    assert_eq!(ring.len(), 1445);
  }

  #[rstest]
  #[case(80.0, 4)]
  #[case(100.0, 3)]
  #[case(0.7, 514)]
  #[case(7.0, 51)]
  #[case(180.0, 2)]
  fn uneven_steps_stay_on_the_map(#[case] step: f64, #[case] samples: usize) {
    let ring = terminator_for_subsolar(WGS84Coordinate::new(20.0, 0.0), step);
    assert!(ring.iter().all(WGS84Coordinate::is_valid), "{ring:?}");
    assert_eq!(ring.len(), 2 * (samples + 1) + 3);
    assert_eq!(ring.first(), ring.last());
    assert!(ring.iter().all(|c| c.lon <= 180.0 && c.lon >= -180.0));
  }

  #[test]
  fn overlay_draws_and_removes() {
    let store = Arc::new(LayerStore::new());
    let overlay = SunOverlay::new(store.clone(), Theme::Light, Duration::from_secs(60));
    overlay.enable();
    assert!(overlay.is_enabled());
    assert!(store.contains(&LayerId::Terminator));

    overlay.set_theme(Theme::Dark);
    let layer = store.layer(&LayerId::Terminator).unwrap();
    assert_eq!(layer.style, night_style(Theme::Dark));

    overlay.disable();
    assert!(!overlay.is_enabled());
    assert!(!store.contains(&LayerId::Terminator));
  }
}
