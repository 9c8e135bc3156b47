//! Write engine: sheets, tables, heads and converter-driven cells on top of
//! a [`WriteBackend`].

pub mod backend;
pub mod data;
pub mod handler;
pub mod writer;
#[cfg(feature = "xlsx")]
mod xlsx;


pub use backend::{MemorySheet, MemoryWorkbook, WriteBackend};
pub use data::{RowValues, ToRowData};
pub use handler::{
    CellWriteContext, HorizontalCellStyleStrategy, LoopMergeStrategy, OnceAbsoluteMergeStrategy,
    WriteHandler,
};
pub use writer::{ExcelWriter, WriteSheet, WriteTable};
