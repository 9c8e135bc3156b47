//! Turning a completed row into the listener's row type.

use log::trace;

use crate::common::{Error, Result};
use crate::converter::record::{ExcelRecord, FieldValues, schema_of};
use crate::converter::{NativeType, NativeValue};
use crate::holder::{ReadDefaultReturn, ReadSheetHolder};
use crate::model::{CellData, CellDataType, ExcelHeadProperty, ReadValue, RowHolder, RowMap};

/// A type rows can be decoded into.
pub trait FromRow: Sized {
    /// Heads declared by the type itself; empty when it binds positionally.
    fn declared_head() -> ExcelHeadProperty {
        ExcelHeadProperty::empty()
    }

    /// Decode one row. Conversion failures carry the failing cell position.
    fn from_row(row: &RowHolder, sheet: &ReadSheetHolder) -> Result<Self>;
}

/// Natural native type of an observed cell.
fn natural_type(cell: &CellData) -> Option<NativeType> {
    match cell.cell_type() {
        CellDataType::Empty => None,
        CellDataType::Number if cell.is_date() => Some(NativeType::DateTime),
        CellDataType::Number => Some(NativeType::Float),
        CellDataType::Boolean => Some(NativeType::Boolean),
        CellDataType::String | CellDataType::DirectString | CellDataType::Error => {
            Some(NativeType::String)
        },
    }
}

fn actual_value(cell: &CellData, sheet: &ReadSheetHolder) -> Result<NativeValue> {
    let Some(native) = natural_type(cell) else {
        return Ok(NativeValue::Null);
    };
    let ctx = sheet.conversion_context();
    let ctx = ctx.with_format(cell.format_pattern());
    sheet
        .converters
        .resolve_for_read(native, cell.cell_type())?
        .to_native(cell, &ctx)
}

impl FromRow for RowMap {
    fn from_row(row: &RowHolder, sheet: &ReadSheetHolder) -> Result<Self> {
        let config = &sheet.config;
        let mut map = RowMap::new();
        for (col, cell) in &row.cells {
            let value = if cell.is_empty() {
                ReadValue::Empty
            } else {
                match config.read_default_return {
                    ReadDefaultReturn::String => ReadValue::Text(
                        cell.display_text(config.use_1904_windowing, &config.locale)
                            .into_owned(),
                    ),
                    ReadDefaultReturn::ActualData => ReadValue::Actual(
                        actual_value(cell, sheet).map_err(|e| e.at(row.row_index, *col))?,
                    ),
                    ReadDefaultReturn::CellData => ReadValue::Cell(cell.clone()),
                }
            };
            map.insert(*col, value);
        }
        Ok(map)
    }
}

impl<T: ExcelRecord> FromRow for T {
    fn declared_head() -> ExcelHeadProperty {
        ExcelHeadProperty::from_schema(&schema_of::<T>())
    }

    fn from_row(row: &RowHolder, sheet: &ReadSheetHolder) -> Result<Self> {
        let base = sheet.conversion_context();
        let mut fields = FieldValues::new();
        for (col, head) in sheet.head.heads() {
            let (Some(name), Some(native)) = (&head.field_name, head.native_type) else {
                continue;
            };
            let Some(cell) = row.cell(*col).filter(|c| !c.is_empty()) else {
                trace!("row {} has no value for field '{}'", row.row_index, name);
                continue;
            };
            let ctx = base.with_format(head.format.as_deref().or(cell.format_pattern()));
            let converter = match &head.converter {
                Some(converter) => converter.clone(),
                None => sheet
                    .converters
                    .resolve_for_read(native, cell.cell_type())
                    .map_err(|e| e.at(row.row_index, *col))?,
            };
            let value = converter
                .to_native(cell, &ctx)
                .map_err(|e| e.at(row.row_index, *col))?;
            fields.insert(name.clone(), value);
        }
        T::from_fields(&mut fields).map_err(|e| match e {
            Error::Conversion {
                row: None, message, ..
            } => Error::Conversion {
                row: Some(row.row_index),
                column: None,
                message,
            },
            other => other,
        })
    }
}
