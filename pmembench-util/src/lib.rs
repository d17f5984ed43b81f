//! Utilities

// Modules
pub mod logger;
pub mod size;

// Exports
pub use size::{format_size, parse_size, SizeParseError};
