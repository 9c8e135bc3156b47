//! Cell, head and row data model shared by the read and write engines.

pub mod cell;
pub mod extra;
pub mod head;
pub mod row;
pub mod style;

pub use cell::{CellData, CellDataType, CellValue, DataFormat};
pub use extra::{CellExtra, ExtraKind, ExtraType};
pub use head::{ColumnFilter, ExcelHeadProperty, Head, HeadBinding, HeadKind, HeaderMatch};
pub use row::{ReadValue, RowHolder, RowMap, RowType};
pub use style::{CellFill, CellFont, CellStyle, HorizontalAlignment};
