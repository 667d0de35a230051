use egui::Color32;
use serde_json::Value;

use crate::map::geometry_collection::Metadata;

/// Shared color parsing utilities for JSON based inputs and configuration.
pub struct StyleParser;

impl StyleParser {
  /// Extract the label from `GeoJSON` feature properties.
  pub fn extract_metadata_from_json(properties: Option<&Value>) -> Metadata {
    let mut metadata = Metadata::default();

    if let Some(Value::Object(props)) = properties {
      let label = props
        .get("name")
        .or_else(|| props.get("tzid"))
        .or_else(|| props.get("title"))
        .or_else(|| props.get("label"))
        .and_then(Value::as_str)
        .map(String::from);

      if let Some(label) = label {
        metadata = metadata.with_label(label);
      }
    }

    metadata
  }

  /// Parse color string (hex, rgb, named colors)
  pub fn parse_color(color_str: &str) -> Option<Color32> {
    let color_str = color_str.trim();

    if let Some(hex) = color_str.strip_prefix('#') {
      return Self::parse_hex_color(hex);
    }

    if color_str.starts_with("rgb(") && color_str.ends_with(')') {
      return Self::parse_rgb_color(&color_str[4..color_str.len() - 1]);
    }

    match color_str.to_lowercase().as_str() {
      "red" => Some(Color32::RED),
      "green" => Some(Color32::GREEN),
      "blue" => Some(Color32::BLUE),
      "yellow" => Some(Color32::YELLOW),
      "black" => Some(Color32::BLACK),
      "white" => Some(Color32::WHITE),
      "gray" | "grey" => Some(Color32::GRAY),
      _ => None,
    }
  }

  /// Parse hex color string
  pub fn parse_hex_color(hex: &str) -> Option<Color32> {
    if !hex.is_ascii() {
      return None;
    }
    match hex.len() {
      3 => {
        let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
        let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
        let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
        Some(Color32::from_rgb(r, g, b))
      }
      6 => {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color32::from_rgb(r, g, b))
      }
      _ => None,
    }
  }

  /// Parse the inside of `rgb(r, g, b)`.
  pub fn parse_rgb_color(rgb: &str) -> Option<Color32> {
    let parts: Vec<u8> = rgb
      .split(',')
      .map(|p| p.trim().parse::<u8>())
      .collect::<Result<_, _>>()
      .ok()?;
    match parts.as_slice() {
      [r, g, b] => Some(Color32::from_rgb(*r, *g, *b)),
      _ => None,
    }
  }

  /// `#rrggbb` of the unmultiplied color, alpha is dropped.
  #[must_use]
  pub fn to_hex(color: Color32) -> String {
    let [r, g, b, _] = color.to_srgba_unmultiplied();
    format!("#{r:02x}{g:02x}{b:02x}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[rstest]
  #[case("#2c5282", Some(Color32::from_rgb(0x2c, 0x52, 0x82)))]
  #[case("#fff", Some(Color32::WHITE))]
  #[case("rgb(255, 0, 0)", Some(Color32::RED))]
  #[case(" Yellow ", Some(Color32::YELLOW))]
  #[case("#12345", None)]
  #[case("rgb(1,2)", None)]
  #[case("rgb(300,0,0)", None)]
  #[case("#ééé", None)]
  #[case("chartreuse", None)]
  fn parse_colors(#[case] input: &str, #[case] expected: Option<Color32>) {
    assert_eq!(StyleParser::parse_color(input), expected);
  }

  #[test]
  fn hex_roundtrip() {
    let color = Color32::from_rgb(0x97, 0x5a, 0x16);
    assert_eq!(StyleParser::to_hex(color), "#975a16");
    assert_eq!(
      StyleParser::parse_color(&StyleParser::to_hex(color)),
      Some(color)
    );
  }

  #[test]
  fn label_from_properties() {
    let props = serde_json::json!({"tzid": "Asia/Tokyo"});
    let metadata = StyleParser::extract_metadata_from_json(Some(&props));
    assert_eq!(metadata.label.as_deref(), Some("Asia/Tokyo"));
    assert_eq!(StyleParser::extract_metadata_from_json(None), Metadata::default());
  }
}
