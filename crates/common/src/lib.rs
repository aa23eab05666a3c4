//! gPHYX Common Utilities
//!
//! Shared infrastructure for all gPHYX crates:
//! - Error types and result aliases
//! - Frame clock and frame keys used to address tracking results
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
