#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss)]

pub mod analyzer;
pub mod collector;
pub mod comparison;
pub mod config;
pub mod observability;
pub mod types;
pub mod video_id;

pub use comparison::{ComparisonEngine, ComparisonError, PartialSignalWarning};
pub use config::{ConfigError, EngineConfig};
pub use types::{ComparisonResult, VideoId, VideoInput};
