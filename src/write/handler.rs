//! Write handlers: hooks around sheet, row and cell creation.

use log::debug;

use super::backend::WriteBackend;
use crate::common::{CellRange, Result};
use crate::model::{CellData, CellStyle, Head};

/// Where a cell is being written.
#[derive(Debug, Clone, Copy)]
pub struct CellWriteContext<'a> {
    pub sheet: usize,
    pub sheet_name: &'a str,
    pub table_no: Option<usize>,
    pub row_index: u32,
    pub column_index: u32,
    /// Position of the element within the current write call; `None` for
    /// header cells.
    pub relative_row_index: Option<usize>,
    pub head: Option<&'a Head>,
}

impl CellWriteContext<'_> {
    pub fn is_head(&self) -> bool {
        self.relative_row_index.is_none()
    }
}

/// Hooks called by the writer, in registration order.
///
/// Handlers may add presentation (styles, merged regions) but never change
/// cell values: `after_cell_data_converted` only sees the style mutably.
pub trait WriteHandler {
    /// A sheet is touched for the first time by this writer.
    fn after_sheet_create(&mut self, backend: &mut dyn WriteBackend, sheet: usize) -> Result<()> {
        let _ = (backend, sheet);
        Ok(())
    }

    fn after_row_create(
        &mut self,
        backend: &mut dyn WriteBackend,
        sheet: usize,
        row_index: u32,
        is_head: bool,
    ) -> Result<()> {
        let _ = (backend, sheet, row_index, is_head);
        Ok(())
    }

    /// The cell value is final; adjust its style.
    fn after_cell_data_converted(
        &mut self,
        ctx: &CellWriteContext<'_>,
        cell: &CellData,
        style: &mut CellStyle,
    ) -> Result<()> {
        let _ = (ctx, cell, style);
        Ok(())
    }

    /// The cell has been stored in the backend.
    fn after_cell_dispose(&mut self, backend: &mut dyn WriteBackend, ctx: &CellWriteContext<'_>) -> Result<()> {
        let _ = (backend, ctx);
        Ok(())
    }
}

/// Styles header cells with one style and content rows with a rotating list.
#[derive(Debug, Clone, Default)]
pub struct HorizontalCellStyleStrategy {
    head_style: Option<CellStyle>,
    content_styles: Vec<CellStyle>,
}

impl HorizontalCellStyleStrategy {
    pub fn new(head_style: Option<CellStyle>, content_styles: Vec<CellStyle>) -> Self {
        Self {
            head_style,
            content_styles,
        }
    }
}

impl WriteHandler for HorizontalCellStyleStrategy {
    fn after_cell_data_converted(
        &mut self,
        ctx: &CellWriteContext<'_>,
        _cell: &CellData,
        style: &mut CellStyle,
    ) -> Result<()> {
        let chosen = match ctx.relative_row_index {
            None => self.head_style.as_ref(),
            Some(_) if self.content_styles.is_empty() => None,
            Some(i) => self.content_styles.get(i % self.content_styles.len()),
        };
        if let Some(chosen) = chosen {
            style.merge(chosen);
        }
        Ok(())
    }
}

/// Merges every `each_row` content rows of one column, optionally spanning
/// `column_extend` columns.
#[derive(Debug, Clone, Copy)]
pub struct LoopMergeStrategy {
    each_row: u32,
    column_extend: u32,
    column_index: u32,
}

impl LoopMergeStrategy {
    pub fn new(each_row: u32, column_index: u32) -> Self {
        Self::with_column_extend(each_row, 1, column_index)
    }

    pub fn with_column_extend(each_row: u32, column_extend: u32, column_index: u32) -> Self {
        Self {
            each_row: each_row.max(1),
            column_extend: column_extend.max(1),
            column_index,
        }
    }
}

impl WriteHandler for LoopMergeStrategy {
    fn after_cell_dispose(&mut self, backend: &mut dyn WriteBackend, ctx: &CellWriteContext<'_>) -> Result<()> {
        let Some(relative) = ctx.relative_row_index else {
            return Ok(());
        };
        if ctx.column_index != self.column_index
            || relative % self.each_row as usize != 0
            || (self.each_row == 1 && self.column_extend == 1)
        {
            return Ok(());
        }
        let range = CellRange::new(
            ctx.row_index,
            ctx.row_index + self.each_row - 1,
            ctx.column_index,
            ctx.column_index + self.column_extend - 1,
        );
        debug!("loop merge {}", range);
        backend.add_merged_region(ctx.sheet, range)
    }
}

/// Adds one fixed merged region when a sheet is first touched.
#[derive(Debug, Clone, Copy)]
pub struct OnceAbsoluteMergeStrategy {
    range: CellRange,
}

impl OnceAbsoluteMergeStrategy {
    pub fn new(first_row: u32, last_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            range: CellRange::new(first_row, last_row, first_col, last_col),
        }
    }
}

impl WriteHandler for OnceAbsoluteMergeStrategy {
    fn after_sheet_create(&mut self, backend: &mut dyn WriteBackend, sheet: usize) -> Result<()> {
        backend.add_merged_region(sheet, self.range)
    }
}
