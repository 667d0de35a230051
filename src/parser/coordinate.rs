use log::debug;
use regex::{Captures, Regex};

use crate::map::coordinates::WGS84Coordinate;

/// One angle: signed degrees, optional minutes and seconds, and a hemisphere letter in front
/// or behind. `{p}` is replaced by the group prefix of the axis.
const ANGLE: &str = r#"(?:(?P<{p}pre>[NSEW])\s*)?(?P<{p}deg>-?\d+(?:\.\d+)?)(?:\s*°)?(?:\s*(?P<{p}min>\d+(?:\.\d+)?)\s*['′])?(?:\s*(?P<{p}sec>\d+(?:\.\d+)?)\s*(?:"|″|''))?(?:\s*(?P<{p}post>[NSEW]))?"#;

/// Parses coordinates typed into the location box.
///
/// Accepted forms, latitude first unless hemisphere letters say otherwise:
/// `40.7128, -74.0060`, `40.7128 N 74.0060 W`, `N40.7128 W74.0060`, `40°42.768'N 74°0.36'W`
/// and `40°42'46"N, 74°0'22"W`.
pub struct CoordinateParser {
  pair: Regex,
}

impl Default for CoordinateParser {
  fn default() -> Self {
    Self::new()
  }
}

/// A parsed angle with the axis its hemisphere letter names, if any.
#[derive(Debug, Clone, Copy)]
struct Angle {
  degrees: f64,
  hemisphere: Option<char>,
}

impl Angle {
  fn from_captures(caps: &Captures<'_>, prefix: &str) -> Option<Self> {
    let group = |name: &str| caps.name(&format!("{prefix}{name}")).map(|m| m.as_str());
    let number = |name: &str| -> Option<Option<f64>> {
      match group(name) {
        Some(raw) => raw.parse().ok().map(Some),
        None => Some(None),
      }
    };

    let raw_degrees = group("deg")?;
    let degrees: f64 = raw_degrees.parse().ok()?;
    let minutes = number("min")?;
    let seconds = number("sec")?;
    if minutes.is_some_and(|m| m >= 60.0) || seconds.is_some_and(|s| s >= 60.0) {
      debug!("Minutes or seconds out of range in '{}'", caps.get(0)?.as_str());
      return None;
    }
    // Fractional degrees followed by minutes are ambiguous.
    if minutes.is_some() && raw_degrees.contains('.') {
      return None;
    }

    let hemisphere = match (group("pre"), group("post")) {
      (Some(_), Some(_)) => return None,
      (Some(h), None) | (None, Some(h)) => h.chars().next(),
      (None, None) => None,
    };
    let negative = raw_degrees.starts_with('-');
    if negative && hemisphere.is_some() {
      return None;
    }

    let magnitude =
      degrees.abs() + minutes.unwrap_or(0.0) / 60.0 + seconds.unwrap_or(0.0) / 3600.0;
    let sign = if negative || matches!(hemisphere, Some('S' | 'W')) {
      -1.0
    } else {
      1.0
    };
    Some(Self {
      degrees: sign * magnitude,
      hemisphere,
    })
  }

  fn is_longitude(&self) -> Option<bool> {
    self.hemisphere.map(|h| matches!(h, 'E' | 'W'))
  }
}

impl CoordinateParser {
  #[must_use]
  #[allow(clippy::missing_panics_doc)]
  pub fn new() -> Self {
    let pattern = format!(
      r"^\s*{}\s*[,;\s]\s*{}\s*$",
      ANGLE.replace("{p}", "a"),
      ANGLE.replace("{p}", "b")
    );
    Self {
      pair: Regex::new(&pattern).expect("static regex"),
    }
  }

  /// Parses `input` into a position. Hemisphere letters may be lower case. Out of range values
  /// are rejected.
  #[must_use]
  pub fn parse(&self, input: &str) -> Option<WGS84Coordinate> {
    let Some(coord) = self.parse_pair(&input.to_uppercase()) else {
      debug!("Could not parse '{input}' as coordinate");
      return None;
    };
    if coord.is_valid() {
      Some(coord)
    } else {
      debug!("Coordinate out of range: {}, {}", coord.lat, coord.lon);
      None
    }
  }

  fn parse_pair(&self, input: &str) -> Option<WGS84Coordinate> {
    let caps = self.pair.captures(input)?;
    let first = Angle::from_captures(&caps, "a")?;
    let second = Angle::from_captures(&caps, "b")?;

    let (lat, lon) = match (first.is_longitude(), second.is_longitude()) {
      (Some(true), Some(true)) | (Some(false), Some(false)) => return None,
      (Some(true), _) | (_, Some(false)) => (second, first),
      _ => (first, second),
    };
    Some(WGS84Coordinate::new(lat.degrees, lon.degrees))
  }
}
