//! Streaming read engine.
//!
//! An [`ExcelReader`] drives a [`RowProducer`](crate::producer::RowProducer)
//! sheet by sheet: rows are assembled from cell tokens, classified as head,
//! data or empty, decoded through the converter registry and handed to
//! [`ReadListener`]s in registration order. Memory stays bounded by one row
//! plus whatever the listeners keep.

pub mod context;
pub mod decode;
pub mod listener;
pub mod reader;


pub use context::AnalysisContext;
pub use decode::FromRow;
pub use listener::{CollectingListener, ExceptionAction, FnListener, PageReadListener, ReadListener};
pub use reader::{ExcelReader, ReadSheet, SheetSelector, read_sync};
