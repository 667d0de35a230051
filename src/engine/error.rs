use thiserror::Error;

use super::marker::MarkerId;

/// Which geometry of a timezone is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
  Detail,
  Index,
}

impl std::fmt::Display for GeometryKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      GeometryKind::Detail => write!(f, "detail"),
      GeometryKind::Index => write!(f, "index"),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
  #[error("Coordinates out of valid range: {lat}, {lng}")]
  InvalidCoordinate { lat: f64, lng: f64 },
  #[error("No timezone found for this location: {lat}, {lng}")]
  NoTimezoneFound { lat: f64, lng: f64 },
  #[error("Failed to load {kind} geometry for {timezone}: {reason}")]
  GeometryFetchFailed {
    timezone: String,
    kind: GeometryKind,
    reason: String,
  },
  #[error("Failed to parse markers from URL: {0}")]
  MalformedViewState(String),
  #[error("Timezone data not loaded yet. Please wait...")]
  ResolverUnavailable,
  #[error("No marker with id {0}")]
  UnknownMarker(MarkerId),
}

impl AnnotationError {
  /// Errors that go away by retrying later.
  #[must_use]
  pub fn is_retryable(&self) -> bool {
    matches!(self, AnnotationError::ResolverUnavailable)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages() {
    let err = AnnotationError::GeometryFetchFailed {
      timezone: "Europe/Berlin".to_string(),
      kind: GeometryKind::Index,
      reason: "broken".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "Failed to load index geometry for Europe/Berlin: broken"
    );
    assert_eq!(
      AnnotationError::UnknownMarker(MarkerId(3)).to_string(),
      "No marker with id 3"
    );
    assert!(AnnotationError::ResolverUnavailable.is_retryable());
    assert!(!AnnotationError::InvalidCoordinate { lat: 91., lng: 0. }.is_retryable());
  }
}
