use egui::Color32;
use itertools::Either;
use serde::{Deserialize, Serialize};
use std::iter::once;

use super::coordinates::WGS84Coordinate;

pub type Color = Color32;

const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// How a layer is painted by the render surface.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Style {
  interactive: bool,
  color: Option<Color>,
  fill_color: Option<Color>,
  stroke_width: f32,
  opacity: f32,
  fill_opacity: f32,
}

pub const DEFAULT_STYLE: Style = Style {
  interactive: true,
  color: Some(Color32::BLUE),
  fill_color: None,
  stroke_width: DEFAULT_STROKE_WIDTH,
  opacity: 1.0,
  fill_opacity: 0.2,
};

impl Default for Style {
  fn default() -> Self {
    DEFAULT_STYLE.clone()
  }
}

impl Style {
  #[must_use]
  pub fn with_color(mut self, color: Color) -> Self {
    self.color = Some(color);
    self
  }

  #[must_use]
  pub fn with_fill_color(mut self, fill_color: Color) -> Self {
    self.fill_color = Some(fill_color);
    self
  }

  #[must_use]
  pub fn with_interactive(mut self, interactive: bool) -> Self {
    self.interactive = interactive;
    self
  }

  #[must_use]
  pub fn with_stroke_width(mut self, stroke_width: f32) -> Self {
    self.stroke_width = stroke_width;
    self
  }

  /// Stroke opacity, clamped to `[0, 1]`.
  #[must_use]
  pub fn with_opacity(mut self, opacity: f32) -> Self {
    self.opacity = opacity.clamp(0.0, 1.0);
    self
  }

  #[must_use]
  pub fn with_fill_opacity(mut self, fill_opacity: f32) -> Self {
    self.fill_opacity = fill_opacity.clamp(0.0, 1.0);
    self
  }

  #[must_use]
  pub fn color(&self) -> Color {
    self.color.unwrap_or(Color32::BLUE)
  }

  #[must_use]
  pub fn fill_color(&self) -> Color {
    self.fill_color.unwrap_or(Color32::TRANSPARENT)
  }

  #[must_use]
  pub fn stroke_width(&self) -> f32 {
    self.stroke_width
  }

  #[must_use]
  pub fn opacity(&self) -> f32 {
    self.opacity
  }

  #[must_use]
  pub fn fill_opacity(&self) -> f32 {
    self.fill_opacity
  }

  #[must_use]
  pub fn is_interactive(&self) -> bool {
    self.interactive
  }
}

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Metadata {
  pub label: Option<String>,
}

impl Metadata {
  #[must_use]
  pub fn with_label(mut self, label: String) -> Self {
    self.label = Some(label);
    self
  }
}

/// Geometry in geographic coordinates. Polygons hold an exterior ring and any number of holes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Geometry {
  GeometryCollection(Vec<Geometry>, Metadata),
  Point(WGS84Coordinate, Metadata),
  LineString(Vec<WGS84Coordinate>, Metadata),
  Polygon(Vec<WGS84Coordinate>, Vec<Vec<WGS84Coordinate>>, Metadata),
}

impl Geometry {
  #[must_use]
  pub fn point(coord: WGS84Coordinate) -> Self {
    Geometry::Point(coord, Metadata::default())
  }

  #[must_use]
  pub fn polygon(ring: Vec<WGS84Coordinate>) -> Self {
    Geometry::Polygon(ring, Vec::new(), Metadata::default())
  }

  /// A polygon with interior rings, e.g. a zone surrounding an enclave.
  #[must_use]
  pub fn polygon_with_holes(
    exterior: Vec<WGS84Coordinate>,
    holes: Vec<Vec<WGS84Coordinate>>,
  ) -> Self {
    Geometry::Polygon(exterior, holes, Metadata::default())
  }

  #[must_use]
  pub fn metadata(&self) -> &Metadata {
    match self {
      Geometry::GeometryCollection(_, metadata)
      | Geometry::Point(_, metadata)
      | Geometry::Polygon(_, _, metadata)
      | Geometry::LineString(_, metadata) => metadata,
    }
  }

  #[must_use]
  pub fn with_label(mut self, label: String) -> Self {
    match &mut self {
      Geometry::GeometryCollection(_, metadata)
      | Geometry::Point(_, metadata)
      | Geometry::Polygon(_, _, metadata)
      | Geometry::LineString(_, metadata) => {
        metadata.label = Some(label);
      }
    }
    self
  }

  /// Iterates over all coordinates of the geometry, depth first.
  pub fn coordinates(&self) -> impl Iterator<Item = WGS84Coordinate> + '_ {
    let iter: Box<dyn Iterator<Item = WGS84Coordinate> + '_> = match self {
      Geometry::GeometryCollection(geometries, _) => {
        Box::new(geometries.iter().flat_map(|g| g.coordinates()))
      }
      Geometry::Point(coord, _) => Box::new(once(*coord)),
      Geometry::LineString(coords, _) => Box::new(coords.iter().copied()),
      Geometry::Polygon(exterior, holes, _) => Box::new(
        exterior
          .iter()
          .chain(holes.iter().flatten())
          .copied(),
      ),
    };
    iter
  }

  /// Flattens collections, yielding only leaf geometries.
  pub fn leaves(&self) -> impl Iterator<Item = &Geometry> + '_ {
    if let Geometry::GeometryCollection(geometries, _) = self {
      Either::Left(
        geometries
          .iter()
          .flat_map(|g| g.leaves().collect::<Vec<_>>()),
      )
    } else {
      Either::Right(once(self))
    }
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.coordinates().next().is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn c(lat: f64, lon: f64) -> WGS84Coordinate {
    WGS84Coordinate::new(lat, lon)
  }

  #[test]
  fn collection_leaves_are_flattened() {
    let geometry = Geometry::GeometryCollection(
      vec![
        Geometry::point(c(1., 2.)),
        Geometry::GeometryCollection(
          vec![Geometry::polygon(vec![c(0., 0.), c(0., 1.), c(1., 1.), c(0., 0.)])],
          Metadata::default(),
        ),
      ],
      Metadata::default(),
    );

    assert_eq!(geometry.leaves().count(), 2);
    assert_eq!(geometry.coordinates().count(), 5);
    assert!(!geometry.is_empty());
  }

  #[test]
  fn empty_collection() {
    let geometry = Geometry::GeometryCollection(vec![], Metadata::default());
    assert!(geometry.is_empty());
  }

  #[test]
  fn style_builder() {
    let style = Style::default()
      .with_color(Color32::RED)
      .with_fill_color(Color32::GREEN)
      .with_interactive(false)
      .with_stroke_width(1.5)
      .with_fill_opacity(1.5);
    assert_eq!(style.color(), Color32::RED);
    assert_eq!(style.fill_color(), Color32::GREEN);
    assert!(!style.is_interactive());
    assert!((style.stroke_width() - 1.5).abs() < f32::EPSILON);
    assert!((style.fill_opacity() - 1.0).abs() < f32::EPSILON);
    assert!((style.opacity() - 1.0).abs() < f32::EPSILON);
  }
}
