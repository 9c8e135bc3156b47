//! Unified error types for sheetflow.
//!
//! This module provides one error type covering format detection, value
//! conversion, configuration and container failures, so that every engine
//! reports problems through the same channel.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
