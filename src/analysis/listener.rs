//! Read listeners and the built-in implementations.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;

use log::warn;

use super::context::AnalysisContext;
use crate::common::{Error, Result};
use crate::model::{CellData, CellExtra};

/// What the engine does after a listener has seen an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionAction {
    /// Skip the failing row and keep reading
    #[default]
    Continue,
    /// Abort the read, surfacing the error to the caller
    Abort,
}

/// Observer of one read session.
///
/// Listeners registered on the reader see every selected sheet; listeners
/// attached to a [`ReadSheet`](super::ReadSheet) only see that sheet and are
/// called after the reader's own. Every callback runs synchronously on the
/// reading thread, so the next row is produced only after all listeners
/// return.
pub trait ReadListener<T> {
    /// A data row (or an empty row when empty rows are not ignored).
    fn invoke(&mut self, data: &T, ctx: &AnalysisContext<'_>) -> Result<()>;

    /// A non-empty header row.
    fn invoke_head(&mut self, head: &BTreeMap<u32, CellData>, ctx: &AnalysisContext<'_>) -> Result<()> {
        let _ = (head, ctx);
        Ok(())
    }

    /// An extra event whose kind was requested.
    fn extra(&mut self, extra: &CellExtra, ctx: &AnalysisContext<'_>) -> Result<()> {
        let _ = (extra, ctx);
        Ok(())
    }

    /// A conversion or listener failure of the current row.
    ///
    /// Every listener sees the error; the read aborts when any of them asks
    /// to.
    fn on_exception(&mut self, error: &Error, ctx: &AnalysisContext<'_>) -> ExceptionAction {
        warn!(
            "sheet '{}' row {:?}: {}",
            ctx.sheet_name(),
            ctx.row_index(),
            error
        );
        ExceptionAction::Continue
    }

    /// Polled after each row; returning false ends the current sheet.
    fn has_next(&mut self, ctx: &AnalysisContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// Called once when a sheet has been fully read or stopped.
    fn do_after_all_analysed(&mut self, ctx: &AnalysisContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Collects every row into a shared vector.
///
/// ```
/// use sheetflow::analysis::CollectingListener;
/// use sheetflow::model::RowMap;
///
/// let listener = CollectingListener::<RowMap>::new();
/// let rows = listener.handle();
/// assert!(rows.borrow().is_empty());
/// ```
#[derive(Debug)]
pub struct CollectingListener<T> {
    rows: Rc<RefCell<Vec<T>>>,
}

impl<T> CollectingListener<T> {
    pub fn new() -> Self {
        Self {
            rows: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to the collected rows; stays valid after the listener is
    /// handed to a reader.
    pub fn handle(&self) -> Rc<RefCell<Vec<T>>> {
        Rc::clone(&self.rows)
    }
}

impl<T> Default for CollectingListener<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ReadListener<T> for CollectingListener<T> {
    fn invoke(&mut self, data: &T, _ctx: &AnalysisContext<'_>) -> Result<()> {
        self.rows.borrow_mut().push(data.clone());
        Ok(())
    }
}

/// Delivers rows in batches of `batch_size`; the last, possibly shorter,
/// batch is flushed when each sheet ends.
pub struct PageReadListener<T, F>
where
    F: FnMut(Vec<T>) -> Result<()>,
{
    batch_size: usize,
    page: Vec<T>,
    consumer: F,
}

impl<T, F> PageReadListener<T, F>
where
    F: FnMut(Vec<T>) -> Result<()>,
{
    /// Default number of rows per batch.
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    pub fn new(consumer: F) -> Self {
        Self::with_batch_size(Self::DEFAULT_BATCH_SIZE, consumer)
    }

    pub fn with_batch_size(batch_size: usize, consumer: F) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            page: Vec::with_capacity(batch_size),
            consumer,
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.page.is_empty() {
            return Ok(());
        }
        let page = mem::replace(&mut self.page, Vec::with_capacity(self.batch_size));
        (self.consumer)(page)
    }
}

impl<T: Clone, F> ReadListener<T> for PageReadListener<T, F>
where
    F: FnMut(Vec<T>) -> Result<()>,
{
    fn invoke(&mut self, data: &T, _ctx: &AnalysisContext<'_>) -> Result<()> {
        self.page.push(data.clone());
        if self.page.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn do_after_all_analysed(&mut self, _ctx: &AnalysisContext<'_>) -> Result<()> {
        self.flush()
    }
}

/// Wraps a closure called once per row.
pub struct FnListener<F> {
    callback: F,
}

impl<F> FnListener<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<T, F> ReadListener<T> for FnListener<F>
where
    F: FnMut(&T, &AnalysisContext<'_>) -> Result<()>,
{
    fn invoke(&mut self, data: &T, ctx: &AnalysisContext<'_>) -> Result<()> {
        (self.callback)(data, ctx)
    }
}
