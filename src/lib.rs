pub mod config;
pub mod engine;
pub mod map;
pub mod parser;
pub mod preferences;
pub mod remote;
pub mod timezone;

pub use config::DEFAULT_PORT;
pub use engine::{AnnotationEngine, AnnotationError, EngineEvent};
