//! Versereel Common Utilities
//!
//! Shared infrastructure for all Versereel crates:
//! - Error taxonomy and result aliases
//! - Media-time helpers (frame counts, clock formatting)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
