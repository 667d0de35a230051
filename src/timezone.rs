/// Live clocks for marker panels.
pub mod clock;
/// Point to timezone lookup and boundary data.
pub mod resolver;

pub use clock::{TimePanel, TimeRow};
pub use resolver::{BoundaryDirectory, TimezoneResolver, TzfResolver};
