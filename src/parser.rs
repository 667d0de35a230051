/// Free text coordinate input.
mod coordinate;
/// `GeoJSON` reading and writing.
pub mod geojson;
/// Color strings.
pub mod style;

pub use coordinate::CoordinateParser;
pub use geojson::GeoJsonParser;
pub use style::StyleParser;
