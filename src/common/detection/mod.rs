//! Workbook format detection.
//!
//! Detection is based on file signatures (magic numbers) and a shallow look at
//! the container structure, reading only the minimal amount of data required
//! for identification.

// Submodule declarations
pub mod functions;
pub mod types;

// Re-exports
pub use functions::{detect_format, detect_format_from_path, detect_format_from_reader};
pub use types::WorkbookFormat;
