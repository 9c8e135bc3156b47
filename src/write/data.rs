//! Row shapes accepted by the writer.

use std::collections::BTreeMap;

use crate::converter::record::{ExcelRecord, schema_of};
use crate::converter::NativeValue;
use crate::model::ExcelHeadProperty;

/// Values of one row to write.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Value `i` goes to the `i`-th head column
    Positional(Vec<NativeValue>),
    /// Same alignment as positional, with gaps
    Keyed(BTreeMap<usize, NativeValue>),
    /// Named fields located through the head
    Fields(Vec<(&'static str, NativeValue)>),
}

/// A type the writer can lay out as one row.
pub trait ToRowData {
    /// Heads implied by the type; used when the sheet or table declares none.
    fn declared_head() -> ExcelHeadProperty {
        ExcelHeadProperty::empty()
    }

    /// Whether `field` is part of the type's declared fields, including
    /// ignored ones.
    fn declares(field: &str) -> bool {
        let _ = field;
        false
    }

    fn row_values(&self) -> RowValues;
}

impl ToRowData for Vec<NativeValue> {
    fn row_values(&self) -> RowValues {
        RowValues::Positional(self.clone())
    }
}

impl ToRowData for BTreeMap<usize, NativeValue> {
    fn row_values(&self) -> RowValues {
        RowValues::Keyed(self.clone())
    }
}

impl<T: ExcelRecord> ToRowData for T {
    fn declared_head() -> ExcelHeadProperty {
        ExcelHeadProperty::from_schema(&schema_of::<T>())
    }

    fn declares(field: &str) -> bool {
        schema_of::<T>().field(field).is_some()
    }

    fn row_values(&self) -> RowValues {
        RowValues::Fields(self.to_fields())
    }
}
