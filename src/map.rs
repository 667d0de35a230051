/// Geographic coordinates.
pub mod coordinates;
/// Handles geometry.
pub mod geometry_collection;
/// The drawing target of the engine.
pub mod surface;
