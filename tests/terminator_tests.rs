use assert_approx_eq::assert_approx_eq;
use chrono::{DateTime, TimeZone, Utc};
use rstest::rstest;
use tzmap::engine::terminator::{SolarPosition, terminator_polygon};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[rstest]
#[case(utc(2024, 6, 21, 12, 0))]
#[case(utc(2024, 12, 21, 12, 0))]
#[case(utc(2025, 2, 3, 4, 5))]
#[case(utc(2026, 8, 30, 18, 45))]
#[case(utc(2031, 11, 11, 23, 59))]
fn test_boundary_points_have_the_sun_on_the_horizon(#[case] time: DateTime<Utc>) {
  let sun = SolarPosition::at(time);
  let ring = terminator_polygon(time, 1.0);
  let (declination, subsolar_lng) = (sun.subsolar.lat.to_radians(), sun.subsolar.lon);

  for point in ring.iter().take(361) {
    let lat = point.lat.to_radians();
    let elevation = lat.sin() * declination.sin()
      + lat.cos() * declination.cos() * (point.lon - subsolar_lng).to_radians().cos();
    assert_approx_eq!(elevation, 0.0, 1e-9);
  }
}

#[rstest]
#[case(utc(2024, 6, 21, 12, 0), -90.0)]
#[case(utc(2024, 12, 21, 12, 0), 90.0)]
#[case(utc(2025, 5, 1, 0, 0), -90.0)]
#[case(utc(2025, 11, 1, 0, 0), 90.0)]
fn test_ring_is_closed_over_the_dark_pole(#[case] time: DateTime<Utc>, #[case] pole: f64) {
  let ring = terminator_polygon(time, 1.0);
  assert_eq!(ring.len(), 725);
  assert_eq!(ring.first(), ring.last());
  assert!(ring.iter().all(|p| p.is_valid()));
  assert!(ring[361..723].iter().all(|p| p.lat == pole));
  assert_eq!(ring[362].lon, 180.0);
  assert_eq!(ring[722].lon, -180.0);
}

#[test]
fn test_sun_moves_west_by_fifteen_degrees_an_hour() {
  let noon = SolarPosition::at(utc(2024, 3, 1, 12, 0));
  let later = SolarPosition::at(utc(2024, 3, 1, 13, 0));
  let moved = (noon.subsolar.lon - later.subsolar.lon).rem_euclid(360.0);
  assert_approx_eq!(moved, 15.0, 0.05);
}

#[test]
fn test_subsolar_point_stays_in_the_tropics() {
  for day in 0..365 {
    let time = utc(2025, 1, 1, 12, 0) + chrono::Duration::days(day);
    let sun = SolarPosition::at(time);
    assert!(sun.declination.abs() < 23.45, "{time}: {}", sun.declination);
    assert!((-180.0..=180.0).contains(&sun.subsolar.lon));
    assert!((0.98..1.02).contains(&sun.distance));
  }
}
