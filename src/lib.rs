//! Sheetflow - a streaming read/write/fill engine for spreadsheet files
//!
//! This library reads and writes spreadsheets stored as legacy binary workbooks
//! (.xls), OOXML workbooks (.xlsx) and delimited text (.csv) through one
//! event-driven programming model whose memory use does not grow with the
//! number of rows.
//!
//! # Features
//!
//! - **Analysis engine**: one row/cell event stream for every format, with
//!   header resolution, row classification and cooperative cancellation
//! - **Converter registry**: pluggable bridges between native values and cell data
//! - **Write engine**: monotonic row bookkeeping, converter-driven cells and
//!   style handlers
//! - **Fill engine**: `{placeholder}` template expansion with incremental,
//!   paged fills
//!
//! # Example - Reading rows as maps
//!
//! ```rust,no_run
//! use sheetflow::analysis::{CollectingListener, ExcelReader, ReadSheet};
//! use sheetflow::model::RowMap;
//! use sheetflow::{ReadOptions, open_producer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ReadOptions::default();
//! let producer = open_producer("data.xlsx", &options)?;
//! let mut reader = ExcelReader::<_, RowMap>::new(producer, options);
//! let rows = CollectingListener::new();
//! let handle = rows.handle();
//! reader.register_listener(Box::new(rows));
//! reader.read(vec![ReadSheet::index(0)])?;
//! reader.finish()?;
//! println!("{} rows", handle.borrow().len());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Filling a template
//!
//! ```rust,no_run
//! use sheetflow::fill::{FillConfig, FillData, FillWrapper};
//! use sheetflow::write::{ExcelWriter, MemoryWorkbook, WriteSheet};
//! use sheetflow::{NativeValue, WriteOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = MemoryWorkbook::from_path("template.csv")?;
//! let mut writer = ExcelWriter::with_template(template, WriteOptions::default())?;
//! let items = vec![NativeValue::from("a"), NativeValue::from("b")];
//! writer.fill(
//!     FillData::wrapper(FillWrapper::new("list", items)),
//!     FillConfig::default(),
//!     &WriteSheet::index(0),
//! )?;
//! let mut out = Vec::new();
//! writer.finish_into(&mut out)?;
//! # Ok(())
//! # }
//! ```

/// Shared utilities: errors, format detection, cell references, dates and
/// number formats.
pub mod common;

/// Cell, head and row data model.
pub mod model;

/// Bridges between native values and spreadsheet cell representations.
pub mod converter;

/// Layered workbook/sheet/table configuration scopes.
pub mod holder;

/// Shared-string caches used by the legacy binary producer.
pub mod cache;

/// Per-format adapters turning container tokens into row/cell events.
pub mod producer;

/// Streaming read: sheet selection, header resolution and listener dispatch.
pub mod analysis;

/// Head-first tabular writing.
pub mod write;

/// Template-driven placeholder fill on top of the write engine.
pub mod fill;

// Re-export commonly used types for convenience
pub use common::{Error, Result, WorkbookFormat, detect_format};
pub use converter::{Converter, ConverterRegistry, NativeType, NativeValue};
pub use holder::{ReadOptions, WriteOptions};
pub use model::{CellData, CellDataType, CellValue};
pub use producer::{RowProducer, open_producer};
