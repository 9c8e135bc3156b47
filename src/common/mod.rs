//! Common types and utilities shared across formats and engines.

// Submodule declarations
#[cfg(feature = "xls")]
pub mod binary;
pub mod date;
pub mod detection;
#[cfg(feature = "xls")]
pub mod encoding;
pub mod error;
pub mod numfmt;
pub mod reference;

// Re-exports for convenience
pub use detection::{WorkbookFormat, detect_format, detect_format_from_path};
pub use error::{Error, Result};
pub use numfmt::NumberLocale;
pub use reference::CellRange;
