use std::{collections::HashMap, fmt::Display, str::FromStr};

use egui::Color32;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::parser::StyleParser;

const fn hex(rgb: u32) -> Color32 {
  let [_, r, g, b] = rgb.to_be_bytes();
  Color32::from_rgb(r, g, b)
}

const LIGHT_PALETTE: [Color32; 15] = [
  hex(0x2c_5282),
  hex(0xc5_3030),
  hex(0x2f_855a),
  hex(0x74_4210),
  hex(0x55_3c9a),
  hex(0x70_2459),
  hex(0x1a_365d),
  hex(0x97_5a16),
  hex(0x28_5e61),
  hex(0x82_2727),
  hex(0x45_359a),
  hex(0x5b_3f11),
  hex(0x23_4e52),
  hex(0x48_366d),
  hex(0x3c_366b),
];

const DARK_PALETTE: [Color32; 15] = [
  hex(0x90_cdf4),
  hex(0xfe_b2b2),
  hex(0x9a_e6b4),
  hex(0xfb_d38d),
  hex(0xd6_bcfa),
  hex(0xfb_b6ce),
  hex(0xbe_e3f8),
  hex(0xfb_d38d),
  hex(0x81_e6d9),
  hex(0xfc_8181),
  hex(0xb7_94f4),
  hex(0xf6_ad55),
  hex(0x4f_d1c5),
  hex(0xb7_94f4),
  hex(0x7f_9cf5),
];

const HIGH_CONTRAST_PALETTE: [Color32; 15] = [
  hex(0xff_ff00),
  hex(0x00_ffff),
  hex(0xff_00ff),
  hex(0x00_ff00),
  hex(0xff_8000),
  hex(0x00_80ff),
  hex(0xff_0000),
  hex(0xff_ffff),
  hex(0x80_ff00),
  hex(0xff_0080),
  hex(0x00_ff80),
  hex(0x80_00ff),
  hex(0xff_c000),
  hex(0x00_c0c0),
  hex(0xc0_c0ff),
];

/// Visual theme of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
  #[default]
  Light,
  Dark,
  HighContrast,
}

impl Theme {
  #[must_use]
  pub fn as_str(&self) -> &'static str {
    match self {
      Theme::Light => "light",
      Theme::Dark => "dark",
      Theme::HighContrast => "high-contrast",
    }
  }

  #[must_use]
  pub fn all() -> &'static [Theme] {
    &[Theme::Light, Theme::Dark, Theme::HighContrast]
  }

  /// Color of marker pins in this theme.
  #[must_use]
  pub fn marker_color(&self) -> Color32 {
    match self {
      Theme::Light => hex(0x2b_6cb0),
      Theme::Dark => hex(0x63_b3ed),
      Theme::HighContrast => hex(0xff_ff00),
    }
  }
}

impl Display for Theme {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Theme {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      "high-contrast" | "high_contrast" | "highcontrast" => Ok(Theme::HighContrast),
      other => Err(format!("Unknown theme: {other}")),
    }
  }
}

/// The theme selected by the user. `Auto` follows the system preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeMode {
  #[default]
  Auto,
  Fixed(Theme),
}

impl ThemeMode {
  #[must_use]
  pub fn resolve(&self, prefers_dark: bool) -> Theme {
    match self {
      ThemeMode::Fixed(theme) => *theme,
      ThemeMode::Auto if prefers_dark => Theme::Dark,
      ThemeMode::Auto => Theme::Light,
    }
  }
}

impl FromStr for ThemeMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("auto") {
      return Ok(ThemeMode::Auto);
    }
    s.parse().map(ThemeMode::Fixed)
  }
}

/// Palette overrides as colour strings, one list per theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteOverrides {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub light: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dark: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub high_contrast: Vec<String>,
}

/// Timezone colours per theme. Every palette is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Palettes {
  light: Vec<Color32>,
  dark: Vec<Color32>,
  high_contrast: Vec<Color32>,
}

impl Default for Palettes {
  fn default() -> Self {
    Self {
      light: LIGHT_PALETTE.to_vec(),
      dark: DARK_PALETTE.to_vec(),
      high_contrast: HIGH_CONTRAST_PALETTE.to_vec(),
    }
  }
}

impl Palettes {
  /// Built-in palettes with valid overrides applied.
  #[must_use]
  pub fn with_overrides(overrides: &PaletteOverrides) -> Self {
    let mut palettes = Self::default();
    if let Some(light) = Self::parse_override(Theme::Light, &overrides.light) {
      palettes.light = light;
    }
    if let Some(dark) = Self::parse_override(Theme::Dark, &overrides.dark) {
      palettes.dark = dark;
    }
    if let Some(high_contrast) =
      Self::parse_override(Theme::HighContrast, &overrides.high_contrast)
    {
      palettes.high_contrast = high_contrast;
    }
    palettes
  }

  fn parse_override(theme: Theme, colors: &[String]) -> Option<Vec<Color32>> {
    if colors.is_empty() {
      return None;
    }
    let parsed: Option<Vec<Color32>> = colors.iter().map(|c| StyleParser::parse_color(c)).collect();
    if parsed.is_none() {
      warn!("Invalid color in {theme} palette override, using the built-in palette.");
    }
    parsed
  }

  #[must_use]
  pub fn palette(&self, theme: Theme) -> &[Color32] {
    match theme {
      Theme::Light => &self.light,
      Theme::Dark => &self.dark,
      Theme::HighContrast => &self.high_contrast,
    }
  }
}

/// Hands out palette colours to timezones in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ColorAssigner {
  palettes: Palettes,
  assigned: HashMap<String, (usize, Color32)>,
  counter: usize,
}

impl ColorAssigner {
  #[must_use]
  pub fn new(palettes: Palettes) -> Self {
    Self {
      palettes,
      assigned: HashMap::new(),
      counter: 0,
    }
  }

  /// The colour of `timezone`. Once assigned it stays the same until [`Self::reset`], whatever
  /// `theme` later calls pass.
  pub fn color_for(&mut self, timezone: &str, theme: Theme) -> Color32 {
    if let Some((_, color)) = self.assigned.get(timezone) {
      return *color;
    }
    let palette = self.palettes.palette(theme);
    let color = palette[self.counter % palette.len()];
    self.assigned.insert(timezone.to_string(), (self.counter, color));
    self.counter += 1;
    color
  }

  /// Forgets all assignments.
  pub fn reset(&mut self) {
    self.assigned.clear();
    self.counter = 0;
  }

  /// Forgets one assignment. The counter falls back behind the highest remaining slot, so
  /// releasing the most recent assignments restores the earlier state.
  pub fn release(&mut self, timezone: &str) {
    if self.assigned.remove(timezone).is_some() {
      self.counter = self
        .assigned
        .values()
        .map(|(slot, _)| slot + 1)
        .max()
        .unwrap_or(0);
    }
  }

  #[must_use]
  pub fn get(&self, timezone: &str) -> Option<Color32> {
    self.assigned.get(timezone).map(|(_, color)| *color)
  }

  /// All assignments in assignment order.
  #[must_use]
  pub fn table(&self) -> Vec<(String, Color32)> {
    let mut table: Vec<_> = self
      .assigned
      .iter()
      .map(|(tz, (slot, color))| (*slot, tz.clone(), *color))
      .collect();
    table.sort_by_key(|(slot, _, _)| *slot);
    table.into_iter().map(|(_, tz, color)| (tz, color)).collect()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.assigned.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.assigned.is_empty()
  }
}
