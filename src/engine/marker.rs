use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timer::RepeatingTask;
use crate::map::coordinates::WGS84Coordinate;

/// Opaque handle of a placed marker. Ids are never reused by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

impl Display for MarkerId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A marker only moves forward through these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerState {
  Pending,
  Placed,
  Removed,
}

/// A user placed marker together with its live clock.
#[derive(Debug)]
pub struct Marker {
  id: MarkerId,
  position: WGS84Coordinate,
  created_at: DateTime<Utc>,
  timezones: Vec<String>,
  state: MarkerState,
  clock: Option<RepeatingTask>,
}

impl Marker {
  /// A new pending marker. The position is rounded to marker precision.
  #[must_use]
  pub fn new(id: MarkerId, position: WGS84Coordinate, timezones: Vec<String>) -> Self {
    Self {
      id,
      position: position.rounded(),
      created_at: Utc::now(),
      timezones,
      state: MarkerState::Pending,
      clock: None,
    }
  }

  /// Moves the marker to `Placed`, taking ownership of its clock task.
  pub fn place(&mut self, clock: Option<RepeatingTask>) {
    if self.state == MarkerState::Pending {
      self.clock = clock;
      self.state = MarkerState::Placed;
    }
  }

  /// Stops the clock and marks the marker as removed.
  pub fn remove(&mut self) {
    if let Some(clock) = self.clock.take() {
      clock.cancel();
    }
    self.state = MarkerState::Removed;
  }

  #[must_use]
  pub fn id(&self) -> MarkerId {
    self.id
  }

  #[must_use]
  pub fn position(&self) -> WGS84Coordinate {
    self.position
  }

  #[must_use]
  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  /// Timezones resolved when the marker was added.
  #[must_use]
  pub fn timezones(&self) -> &[String] {
    &self.timezones
  }

  #[must_use]
  pub fn state(&self) -> MarkerState {
    self.state
  }

  #[must_use]
  pub fn has_running_clock(&self) -> bool {
    self.clock.as_ref().is_some_and(RepeatingTask::is_running)
  }

  #[must_use]
  pub fn info(&self) -> MarkerInfo {
    MarkerInfo {
      id: self.id,
      position: self.position,
      created_at: self.created_at,
      timezones: self.timezones.clone(),
    }
  }
}

/// Serializable snapshot of a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerInfo {
  pub id: MarkerId,
  pub position: WGS84Coordinate,
  pub created_at: DateTime<Utc>,
  pub timezones: Vec<String>,
}
