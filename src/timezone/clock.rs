use chrono::{DateTime, Offset, TimeDelta, Utc};
use chrono_tz::Tz;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::map::coordinates::WGS84Coordinate;

pub const SOLAR_TIME_LABEL: &str = "Solar Time";

/// One line of a time panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRow {
  pub name: String,
  pub time: String,
}

/// Live clock content shown next to a marker.
#[derive(Debug, Clone)]
pub struct TimePanel {
  position: WGS84Coordinate,
  zones: Vec<Tz>,
}

impl TimePanel {
  /// Unknown identifiers are dropped, the order of the remaining ones is kept.
  #[must_use]
  pub fn new(position: WGS84Coordinate, timezones: &[String]) -> Self {
    let zones = timezones
      .iter()
      .filter_map(|name| {
        name
          .parse::<Tz>()
          .inspect_err(|e| debug!("Skipping timezone {name}: {e}"))
          .ok()
      })
      .collect();
    Self { position, zones }
  }

  #[must_use]
  pub fn position(&self) -> WGS84Coordinate {
    self.position
  }

  /// One zone per distinct UTC offset at `now`. Ties go to the zone listed first.
  #[must_use]
  pub fn unique_zones(&self, now: DateTime<Utc>) -> Vec<Tz> {
    self
      .zones
      .iter()
      .copied()
      .unique_by(|tz| utc_offset_seconds(now, *tz))
      .collect()
  }

  #[must_use]
  pub fn rows(&self, now: DateTime<Utc>) -> Vec<TimeRow> {
    self
      .unique_zones(now)
      .into_iter()
      .map(|tz| TimeRow {
        name: display_name(tz.name()),
        time: format_time(now, tz),
      })
      .chain(std::iter::once(TimeRow {
        name: SOLAR_TIME_LABEL.to_string(),
        time: solar_time(now, self.position.lon),
      }))
      .collect()
  }

  /// The panel as HTML.
  #[must_use]
  pub fn html(&self, now: DateTime<Utc>) -> String {
    let entries: String = self
      .rows(now)
      .iter()
      .map(|row| {
        format!(
          "<div class=\"time-entry\"><div class=\"timezone-name\">{}</div><div class=\"time-value\">{}</div></div>",
          row.name, row.time
        )
      })
      .collect();
    format!(
      "<div class=\"marker-popup\"><strong>Location:</strong><br><div class=\"coordinate-info\">Latitude:  {}<br>Longitude: {}</div><div class=\"marker-time\">{entries}</div></div>",
      self.position.lat, self.position.lon
    )
  }
}

#[must_use]
pub fn utc_offset_seconds(now: DateTime<Utc>, tz: Tz) -> i32 {
  now.with_timezone(&tz).offset().fix().local_minus_utc()
}

/// `Jun 21, 08:00:00 EDT`
#[must_use]
pub fn format_time(now: DateTime<Utc>, tz: Tz) -> String {
  now.with_timezone(&tz).format("%b %-d, %H:%M:%S %Z").to_string()
}

/// Apparent sun time: UTC shifted by four minutes per degree of longitude.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn solar_time(now: DateTime<Utc>, lng: f64) -> String {
  let offset = TimeDelta::milliseconds((lng * 4.0 * 60_000.0).round() as i64);
  (now + offset).format("%H:%M:%S").to_string()
}

fn display_name(name: &str) -> String {
  name.replace('_', " ")
}
