//! Fill engine: `{placeholder}` expansion of template sheets.
//!
//! A template sheet is scanned once, on its first fill. Scalar placeholders
//! take values from a map; list placeholders grow one row (or column) per
//! element from where they stand, continuing across calls.

pub mod data;
mod engine;
mod template;

#[cfg(test)]
mod tests;

pub use data::{FillConfig, FillData, FillDirection, FillElement, FillWrapper};
pub(crate) use engine::FillSheetState;
