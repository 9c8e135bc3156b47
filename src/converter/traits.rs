//! The converter trait.

use super::types::{ConversionContext, NativeType, NativeValue};
use crate::common::{Error, Result};
use crate::model::{CellData, CellDataType};

/// Bridge between one native type and one cell type.
///
/// Converters are pure: they see the value, the field format and the session
/// settings in [`ConversionContext`], and never engine state.
pub trait Converter: Send + Sync {
    fn native_type(&self) -> NativeType;

    fn cell_type(&self) -> CellDataType;

    /// Read direction: cell to native value.
    fn to_native(&self, cell: &CellData, ctx: &ConversionContext<'_>) -> Result<NativeValue> {
        let _ = (cell, ctx);
        Err(Error::conversion(format!(
            "{:?} cells cannot be read as {:?}",
            self.cell_type(),
            self.native_type()
        )))
    }

    /// Write direction: native value to cell.
    fn to_cell(&self, value: &NativeValue, ctx: &ConversionContext<'_>) -> Result<CellData> {
        let _ = (value, ctx);
        Err(Error::conversion(format!(
            "{:?} values cannot be written as {:?} cells",
            self.native_type(),
            self.cell_type()
        )))
    }
}
