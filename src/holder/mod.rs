//! Layered session configuration: workbook, sheet and table scopes.
//!
//! Options arrive as plain structs ([`ReadOptions`], [`WriteOptions`]); each
//! scope turns them into an immutable resolved configuration and a snapshot
//! of its parent's converters.

pub mod options;
pub mod read;
pub mod scope;
pub mod write;

#[cfg(test)]
mod tests;

pub use options::{CsvConfig, ReadDefaultReturn, ReadOptions, WriteOptions};
pub use read::{ReadSheetHolder, ReadWorkbookHolder};
pub use scope::{HeadSource, ReadOverrides, ReadScopeConfig, WriteOverrides, WriteScopeConfig};
pub use write::{LastRowState, WriteSheetHolder, WriteTableHolder, WriteWorkbookHolder};
