//! What a listener can see while a sheet is being analysed.

use crate::holder::{ReadScopeConfig, ReadSheetHolder};
use crate::model::{ExcelHeadProperty, RowHolder, RowType};
use crate::producer::SheetInfo;

/// Read-only view of the engine state handed to every listener callback.
///
/// `row` is set while a row is being dispatched and cleared for sheet-level
/// callbacks such as [`ReadListener::do_after_all_analysed`].
///
/// [`ReadListener::do_after_all_analysed`]: super::ReadListener::do_after_all_analysed
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    sheet: &'a ReadSheetHolder,
    row: Option<&'a RowHolder>,
}

impl<'a> AnalysisContext<'a> {
    pub(crate) fn new(sheet: &'a ReadSheetHolder, row: Option<&'a RowHolder>) -> Self {
        Self { sheet, row }
    }

    pub fn sheet(&self) -> &SheetInfo {
        &self.sheet.sheet
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet.sheet.index
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet.sheet.name
    }

    /// Effective settings of the current sheet.
    pub fn config(&self) -> &ReadScopeConfig {
        &self.sheet.config
    }

    /// Heads as resolved so far; final once the last header row is read.
    pub fn head(&self) -> &ExcelHeadProperty {
        &self.sheet.head
    }

    pub fn current_row(&self) -> Option<&RowHolder> {
        self.row
    }

    pub fn row_index(&self) -> Option<u32> {
        self.row.map(|r| r.row_index)
    }

    pub fn row_type(&self) -> Option<RowType> {
        self.row.map(|r| r.row_type)
    }
}
