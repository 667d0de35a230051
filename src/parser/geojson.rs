use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};

use super::style::StyleParser;
use crate::map::{
  coordinates::WGS84Coordinate,
  geometry_collection::{Geometry, Metadata, Style},
};

/// Turns `GeoJSON` documents into [`Geometry`] and back.
pub struct GeoJsonParser;

impl GeoJsonParser {
  /// Parses a `GeoJSON` document. Feature collections become a geometry collection.
  pub fn parse_str(data: &str) -> Result<Geometry> {
    let value: Value = serde_json::from_str(data)?;
    Self::parse_value(&value)
  }

  pub fn parse_value(value: &Value) -> Result<Geometry> {
    let obj = value
      .as_object()
      .ok_or_else(|| anyhow!("GeoJSON must be an object"))?;
    let Some(geotype) = obj.get("type").and_then(Value::as_str) else {
      bail!("Missing 'type' field for GeoJSON");
    };

    match geotype {
      "FeatureCollection" => {
        let geometries = obj
          .get("features")
          .and_then(Value::as_array)
          .map(|features| {
            features
              .iter()
              .filter_map(|feature| {
                Self::parse_feature(feature)
                  .inspect_err(|e| log::warn!("Error parsing feature: {e}"))
                  .ok()
                  .flatten()
              })
              .collect()
          })
          .unwrap_or_default();
        Ok(Geometry::GeometryCollection(geometries, Metadata::default()))
      }
      "Feature" => Self::parse_feature(value)?.ok_or_else(|| anyhow!("Feature without geometry")),
      "Point" | "LineString" | "Polygon" | "MultiPoint" | "MultiLineString" | "MultiPolygon"
      | "GeometryCollection" => Self::parse_geometry(value, &Metadata::default())
        .ok_or_else(|| anyhow!("Invalid {geotype} geometry")),
      _ => Err(anyhow!("Unknown GeoJSON type: {geotype}")),
    }
  }

  fn parse_feature(feature: &Value) -> Result<Option<Geometry>> {
    let obj = feature
      .as_object()
      .ok_or_else(|| anyhow!("Feature must be an object"))?;
    let metadata = StyleParser::extract_metadata_from_json(obj.get("properties"));
    Ok(
      obj
        .get("geometry")
        .and_then(|geometry| Self::parse_geometry(geometry, &metadata)),
    )
  }

  fn parse_geometry(geometry: &Value, metadata: &Metadata) -> Option<Geometry> {
    let obj = geometry.as_object()?;
    let geom_type = obj.get("type")?.as_str()?;

    if geom_type == "GeometryCollection" {
      let geometries = obj
        .get("geometries")?
        .as_array()?
        .iter()
        .filter_map(|geom| Self::parse_geometry(geom, &Metadata::default()))
        .collect();
      return Some(Geometry::GeometryCollection(geometries, metadata.clone()));
    }

    let coordinates = obj.get("coordinates")?;
    match geom_type {
      "Point" => Some(Geometry::Point(
        Self::parse_coordinate(coordinates)?,
        metadata.clone(),
      )),
      "LineString" => Self::parse_line(coordinates).map(|c| Geometry::LineString(c, metadata.clone())),
      "Polygon" => Self::parse_polygon(coordinates)
        .map(|(exterior, holes)| Geometry::Polygon(exterior, holes, metadata.clone())),
      "MultiPoint" => {
        let geometries = coordinates
          .as_array()?
          .iter()
          .filter_map(Self::parse_coordinate)
          .map(Geometry::point)
          .collect();
        Some(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      "MultiLineString" => {
        let geometries = coordinates
          .as_array()?
          .iter()
          .filter_map(Self::parse_line)
          .map(|c| Geometry::LineString(c, Metadata::default()))
          .collect();
        Some(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      "MultiPolygon" => {
        let geometries = coordinates
          .as_array()?
          .iter()
          .filter_map(Self::parse_polygon)
          .map(|(exterior, holes)| Geometry::polygon_with_holes(exterior, holes))
          .collect();
        Some(Geometry::GeometryCollection(geometries, metadata.clone()))
      }
      _ => None,
    }
  }

  fn parse_line(coords: &Value) -> Option<Vec<WGS84Coordinate>> {
    let coords = Self::parse_coordinate_array(coords)?;
    (coords.len() >= 2).then_some(coords)
  }

  /// The exterior ring and the holes. Degenerate holes are skipped.
  fn parse_polygon(rings: &Value) -> Option<(Vec<WGS84Coordinate>, Vec<Vec<WGS84Coordinate>>)> {
    let (exterior, holes) = rings.as_array()?.split_first()?;
    let exterior = Self::parse_coordinate_array(exterior)?;
    if exterior.len() < 3 {
      return None;
    }
    let holes = holes
      .iter()
      .filter_map(Self::parse_coordinate_array)
      .filter(|hole| hole.len() >= 3)
      .collect();
    Some((exterior, holes))
  }

  /// Parse a single coordinate [lon, lat] or [lon, lat, elevation]
  fn parse_coordinate(coord: &Value) -> Option<WGS84Coordinate> {
    if let Some(array) = coord.as_array()
      && array.len() >= 2
    {
      let lon = array[0].as_f64()?;
      let lat = array[1].as_f64()?;
      return Some(WGS84Coordinate::new(lat, lon));
    }
    None
  }

  /// Parse an array of coordinates [[lon, lat], [lon, lat], ...]
  fn parse_coordinate_array(coords: &Value) -> Option<Vec<WGS84Coordinate>> {
    Some(
      coords
        .as_array()?
        .iter()
        .filter_map(Self::parse_coordinate)
        .collect(),
    )
  }

  /// Serializes a geometry as a `GeoJSON` geometry object.
  #[must_use]
  pub fn to_geometry_value(geometry: &Geometry) -> Value {
    let position = |c: &WGS84Coordinate| json!([c.lon, c.lat]);
    match geometry {
      Geometry::Point(c, _) => json!({"type": "Point", "coordinates": position(c)}),
      Geometry::LineString(coords, _) => json!({
        "type": "LineString",
        "coordinates": coords.iter().map(position).collect::<Vec<_>>(),
      }),
      Geometry::Polygon(exterior, holes, _) => {
        let ring = |ring: &Vec<WGS84Coordinate>| ring.iter().map(position).collect::<Vec<_>>();
        json!({
          "type": "Polygon",
          "coordinates": std::iter::once(exterior).chain(holes).map(ring).collect::<Vec<_>>(),
        })
      }
      Geometry::GeometryCollection(geometries, _) => json!({
        "type": "GeometryCollection",
        "geometries": geometries.iter().map(Self::to_geometry_value).collect::<Vec<_>>(),
      }),
    }
  }

  /// Serializes a geometry as a `GeoJSON` feature carrying its style as simplestyle properties.
  #[must_use]
  pub fn to_feature(id: &str, geometry: &Geometry, style: &Style) -> Value {
    let mut properties = json!({
      "id": id,
      "stroke": StyleParser::to_hex(style.color()),
      "stroke-width": style.stroke_width(),
      "stroke-opacity": style.opacity(),
      "fill": StyleParser::to_hex(style.fill_color()),
      "fill-opacity": style.fill_opacity(),
      "interactive": style.is_interactive(),
    });
    if let Some(label) = &geometry.metadata().label {
      properties["name"] = json!(label);
    }
    json!({
      "type": "Feature",
      "properties": properties,
      "geometry": Self::to_geometry_value(geometry),
    })
  }

  #[must_use]
  pub fn to_feature_collection(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_timezone_boundary_feature() {
    let data = r#"{
      "type": "Feature",
      "properties": {"tzid": "Europe/London", "name": "Europe/London"},
      "geometry": {
        "type": "MultiPolygon",
        "coordinates": [
          [[[-5.0, 50.0], [1.0, 50.0], [1.0, 55.0], [-5.0, 50.0]]],
          [[[-8.0, 54.0], [-6.0, 54.0], [-6.0, 55.0], [-8.0, 54.0]], [[0, 0], [0, 1], [1, 1]]]
        ]
      }
    }"#;
    let geometry = GeoJsonParser::parse_str(data).unwrap();
    let Geometry::GeometryCollection(polygons, metadata) = &geometry else {
      panic!("expected a collection, got {geometry:?}");
    };
    assert_eq!(metadata.label.as_deref(), Some("Europe/London"));
    assert_eq!(polygons.len(), 2);
    assert_eq!(
      polygons[0].coordinates().next(),
      Some(WGS84Coordinate::new(50.0, -5.0))
    );
    let Geometry::Polygon(exterior, holes, _) = &polygons[1] else {
      panic!("expected a polygon, got {:?}", polygons[1]);
    };
    assert_eq!(exterior.len(), 4);
    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0][2], WGS84Coordinate::new(1.0, 1.0));
    assert_eq!(polygons[1].coordinates().count(), 7);
  }

  #[test]
  fn parses_feature_collection() {
    let data = r#"{"type": "FeatureCollection", "features": [
      {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.0, 52.0]}},
      {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[10.0, 52.0], [10.1, 52.1]]}},
      {"type": "Feature", "geometry": null}
    ]}"#;
    let geometry = GeoJsonParser::parse_str(data).unwrap();
    assert_eq!(geometry.leaves().count(), 2);
  }

  #[test]
  fn rejects_unknown_documents() {
    assert!(GeoJsonParser::parse_str(r#"{"type": "Topology"}"#).is_err());
    assert!(GeoJsonParser::parse_str("[1, 2]").is_err());
    assert!(GeoJsonParser::parse_str("not json").is_err());
    assert!(GeoJsonParser::parse_str(r#"{"type": "Polygon", "coordinates": [[[0, 0]]]}"#).is_err());
  }

  #[test]
  fn polygon_written_as_lon_lat() {
    let polygon = Geometry::polygon(vec![
      WGS84Coordinate::new(0.0, 1.0),
      WGS84Coordinate::new(2.0, 3.0),
      WGS84Coordinate::new(4.0, 5.0),
      WGS84Coordinate::new(0.0, 1.0),
    ]);
    let value = GeoJsonParser::to_geometry_value(&polygon);
    assert_eq!(value["type"], "Polygon");
    assert_eq!(value["coordinates"][0][1], json!([3.0, 2.0]));

    let reparsed = GeoJsonParser::parse_value(&value).unwrap();
    assert_eq!(reparsed, polygon);
  }

  #[test]
  fn enclave_hole_survives_roundtrip() {
    let data = r#"{"type": "Polygon", "coordinates": [
      [[16.0, -35.0], [33.0, -35.0], [33.0, -22.0], [16.0, -22.0], [16.0, -35.0]],
      [[27.0, -30.7], [29.5, -30.7], [29.5, -28.5], [27.0, -28.5], [27.0, -30.7]],
      [[1.0, 1.0], [1.0, 1.0]]
    ]}"#;
    let polygon = GeoJsonParser::parse_str(data).unwrap();
    let Geometry::Polygon(_, holes, _) = &polygon else {
      panic!("expected a polygon, got {polygon:?}");
    };
    assert_eq!(holes.len(), 1);

    let value = GeoJsonParser::to_geometry_value(&polygon);
    assert_eq!(value["coordinates"].as_array().unwrap().len(), 2);
    assert_eq!(value["coordinates"][1][0], json!([27.0, -30.7]));
    assert_eq!(GeoJsonParser::parse_value(&value).unwrap(), polygon);
  }

  #[test]
  fn feature_carries_style() {
    let style = Style::default().with_color(egui::Color32::from_rgb(0x2c, 0x52, 0x82));
    let feature = GeoJsonParser::to_feature(
      "detail:Europe/Paris",
      &Geometry::point(WGS84Coordinate::new(48.8, 2.3)),
      &style,
    );
    assert_eq!(feature["properties"]["stroke"], "#2c5282");
    assert_eq!(feature["properties"]["id"], "detail:Europe/Paris");
  }
}
