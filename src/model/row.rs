//! Rows assembled from producer tokens.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::converter::NativeValue;
use crate::model::CellData;

/// Classification of a row, assigned once when the row completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowType {
    Head,
    Data,
    Empty,
}

/// One complete row of a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RowHolder {
    pub row_index: u32,
    pub row_type: RowType,
    pub cells: BTreeMap<u32, CellData>,
}

impl RowHolder {
    /// Classify and wrap a completed row.
    ///
    /// A row is EMPTY when it has no cells or only empty ones; otherwise it is
    /// HEAD while its index is below `head_row_number`, DATA after that.
    pub fn new(row_index: u32, cells: BTreeMap<u32, CellData>, head_row_number: usize) -> Self {
        let row_type = if cells.values().all(CellData::is_empty) {
            RowType::Empty
        } else if (row_index as usize) < head_row_number {
            RowType::Head
        } else {
            RowType::Data
        };
        Self {
            row_index,
            row_type,
            cells,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_type == RowType::Empty
    }

    pub fn cell(&self, column: u32) -> Option<&CellData> {
        self.cells.get(&column)
    }
}

/// Value of one column in a [`RowMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadValue {
    Empty,
    /// Display text of the cell
    Text(String),
    /// Value converted to its natural native type
    Actual(NativeValue),
    /// The cell itself
    Cell(CellData),
}

impl ReadValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReadValue::Text(s) => Some(s),
            ReadValue::Actual(NativeValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ReadValue::Empty | ReadValue::Actual(NativeValue::Null))
    }
}

/// A row read without a record type, keyed by column index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap(pub BTreeMap<u32, ReadValue>);

impl RowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of a column, if it holds text.
    pub fn text(&self, column: u32) -> Option<&str> {
        self.0.get(&column).and_then(ReadValue::as_text)
    }
}

impl Deref for RowMap {
    type Target = BTreeMap<u32, ReadValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RowMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
