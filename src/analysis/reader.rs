//! The streaming read engine.
//!
//! For each selected sheet the engine pulls tokens from the producer,
//! assembles rows, classifies them, finalizes the header once the last
//! header row has been seen and fans every row out to the listeners. State
//! per sheet is the current row and the header rows; nothing else is kept.

use std::collections::BTreeMap;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use super::context::AnalysisContext;
use super::decode::FromRow;
use super::listener::{CollectingListener, ExceptionAction, ReadListener};
use crate::common::{Error, Result};
use crate::converter::{Converter, ConverterRegistry};
use crate::holder::{ReadOptions, ReadOverrides, ReadSheetHolder, ReadWorkbookHolder};
use crate::model::{CellData, CellExtra, ExcelHeadProperty, HeadKind, RowHolder};
use crate::producer::{RowProducer, SheetInfo, Token, open_producer};

/// Which sheets a [`ReadSheet`] selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    /// Compared after trimming both sides
    Name(String),
    All,
}

impl SheetSelector {
    fn matches(&self, sheet: &SheetInfo) -> bool {
        match self {
            SheetSelector::Index(index) => sheet.index == *index,
            SheetSelector::Name(name) => sheet.name.trim() == name.trim(),
            SheetSelector::All => true,
        }
    }
}

/// A sheet selection with its own overrides and listeners.
pub struct ReadSheet<T> {
    selector: SheetSelector,
    overrides: ReadOverrides,
    listeners: Vec<Box<dyn ReadListener<T>>>,
}

impl<T> ReadSheet<T> {
    fn new(selector: SheetSelector) -> Self {
        Self {
            selector,
            overrides: ReadOverrides::default(),
            listeners: Vec::new(),
        }
    }

    pub fn index(index: usize) -> Self {
        Self::new(SheetSelector::Index(index))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(SheetSelector::Name(name.into()))
    }

    pub fn all() -> Self {
        Self::new(SheetSelector::All)
    }

    pub fn selector(&self) -> &SheetSelector {
        &self.selector
    }

    pub fn with_overrides(mut self, overrides: ReadOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_head_row_number(mut self, rows: usize) -> Self {
        self.overrides.head_row_number = Some(rows);
        self
    }

    /// Add a listener that only sees this selection.
    pub fn with_listener(mut self, listener: Box<dyn ReadListener<T>>) -> Self {
        self.listeners.push(listener);
        self
    }
}

/// Whether reading of the current sheet goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Reader-level listeners followed by the selection's own.
struct Listeners<'l, T> {
    workbook: &'l mut [Box<dyn ReadListener<T>>],
    sheet: &'l mut [Box<dyn ReadListener<T>>],
}

impl<T> Listeners<'_, T> {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ReadListener<T>>> {
        self.workbook.iter_mut().chain(self.sheet.iter_mut())
    }

    /// Run `call` on each listener in order, stopping at the first failure.
    fn each<F>(&mut self, mut call: F) -> Result<()>
    where
        F: FnMut(&mut Box<dyn ReadListener<T>>) -> Result<()>,
    {
        for listener in self.iter_mut() {
            call(listener)?;
        }
        Ok(())
    }

    /// Route a failure to every listener.
    ///
    /// A stop request ends the sheet; fatal errors and errors a listener
    /// asks to abort on are returned.
    fn route(&mut self, error: Error, ctx: &AnalysisContext<'_>) -> Result<Flow> {
        if matches!(error, Error::AnalysisStop) {
            debug!("listener requested stop on sheet '{}'", ctx.sheet_name());
            return Ok(Flow::Stop);
        }
        let mut abort = error.is_fatal();
        for listener in self.iter_mut() {
            if listener.on_exception(&error, ctx) == ExceptionAction::Abort {
                abort = true;
            }
        }
        if abort {
            return Err(error);
        }
        Ok(Flow::Continue)
    }

    /// Poll listeners in order; the first false ends the sheet and the
    /// remaining listeners are not asked.
    fn has_next(&mut self, ctx: &AnalysisContext<'_>) -> Flow {
        if self.iter_mut().all(|listener| listener.has_next(ctx)) {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

/// Per-sheet analysis state.
struct SheetRun<'l, T> {
    holder: ReadSheetHolder,
    listeners: Listeners<'l, T>,
    /// Display text of each non-empty header row
    header_rows: BTreeMap<u32, BTreeMap<u32, String>>,
    head_resolved: bool,
    last_row: Option<u32>,
}

impl<T: FromRow> SheetRun<'_, T> {
    fn head_row_number(&self) -> usize {
        self.holder.config.head_row_number
    }

    fn finalize_head(&mut self) {
        if self.head_resolved {
            return;
        }
        self.head_resolved = true;
        let Some(innermost) = self.header_rows.values().next_back() else {
            return;
        };
        match self.holder.head.kind() {
            HeadKind::None => {
                let max_col = self
                    .header_rows
                    .values()
                    .filter_map(|row| row.keys().next_back())
                    .max()
                    .copied()
                    .unwrap_or(0);
                let paths: Vec<Vec<String>> = (0..=max_col)
                    .map(|col| {
                        self.header_rows
                            .values()
                            .filter_map(|row| row.get(&col).cloned())
                            .collect()
                    })
                    .collect();
                self.holder.head = ExcelHeadProperty::from_labels(&paths);
            },
            HeadKind::Labels | HeadKind::Record => {
                let policy = self.holder.config.header_match();
                self.holder.head.resolve_by_name(innermost, policy);
            },
        }
        debug!(
            "sheet '{}' header resolved to {} column(s)",
            self.holder.sheet.name,
            self.holder.head.heads().len()
        );
    }

    fn process_row(&mut self, row: RowHolder) -> Result<Flow> {
        let head_rows = self.head_row_number();
        if (row.row_index as usize) >= head_rows {
            self.finalize_head();
        }

        let ctx = AnalysisContext::new(&self.holder, Some(&row));
        if (row.row_index as usize) < head_rows {
            if !row.is_empty() {
                let config = &self.holder.config;
                let texts = row
                    .cells
                    .iter()
                    .filter(|(_, c)| !c.is_empty())
                    .map(|(col, c)| {
                        let text = c.display_text(config.use_1904_windowing, &config.locale);
                        (*col, text.into_owned())
                    })
                    .collect();
                self.header_rows.insert(row.row_index, texts);
                if let Err(e) = self.listeners.each(|l| l.invoke_head(&row.cells, &ctx))
                    && self.listeners.route(e, &ctx)? == Flow::Stop
                {
                    return Ok(Flow::Stop);
                }
            }
            let flow = self.listeners.has_next(&ctx);
            if row.row_index as usize + 1 == head_rows {
                self.finalize_head();
            }
            return Ok(flow);
        }

        if row.is_empty() && self.holder.config.ignore_empty_row {
            trace!("skipping empty row {}", row.row_index);
            return Ok(Flow::Continue);
        }

        let dispatched = T::from_row(&row, &self.holder)
            .and_then(|data| self.listeners.each(|l| l.invoke(&data, &ctx)));
        if let Err(e) = dispatched
            && self.listeners.route(e, &ctx)? == Flow::Stop
        {
            return Ok(Flow::Stop);
        }
        Ok(self.listeners.has_next(&ctx))
    }

    fn complete_row(&mut self, row_index: u32, mut cells: BTreeMap<u32, CellData>) -> Result<Flow> {
        let config = &self.holder.config;
        if config.auto_trim || config.auto_strip {
            for cell in cells.values_mut() {
                cell.trim_text();
            }
        }
        let head_rows = config.head_row_number;

        // Rows the container skipped between two present rows
        if !config.ignore_empty_row
            && let Some(previous) = self.last_row
        {
            for gap in previous + 1..row_index {
                let flow = self.process_row(RowHolder::new(gap, BTreeMap::new(), head_rows))?;
                if flow == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }
        self.last_row = Some(row_index);
        self.process_row(RowHolder::new(row_index, cells, head_rows))
    }

    fn extra(&mut self, extra: &CellExtra) -> Result<Flow> {
        if !self.holder.config.extra_read.contains(extra.kind.flag()) {
            return Ok(Flow::Continue);
        }
        let ctx = AnalysisContext::new(&self.holder, None);
        match self.listeners.each(|l| l.extra(extra, &ctx)) {
            Ok(()) => Ok(Flow::Continue),
            Err(e) => self.listeners.route(e, &ctx),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.finalize_head();
        let ctx = AnalysisContext::new(&self.holder, None);
        let mut failure = None;
        for listener in self.listeners.iter_mut() {
            if let Err(e) = listener.do_after_all_analysed(&ctx)
                && failure.is_none()
            {
                failure = Some(e);
            }
        }
        match failure {
            Some(e) => self.listeners.route(e, &ctx).map(|_| ()),
            None => Ok(()),
        }
    }
}

/// Streaming reader over one workbook.
///
/// Rows are decoded into `T` (a [`RowMap`](crate::model::RowMap) or any
/// [`ExcelRecord`](crate::converter::ExcelRecord)) and dispatched to the
/// registered listeners.
pub struct ExcelReader<P: RowProducer, T> {
    producer: P,
    workbook: ReadWorkbookHolder,
    listeners: Vec<Box<dyn ReadListener<T>>>,
}

impl<P: RowProducer, T: FromRow> ExcelReader<P, T> {
    pub fn new(producer: P, options: ReadOptions) -> Self {
        let workbook =
            ReadWorkbookHolder::new(&options, producer.date1904(), ConverterRegistry::with_defaults());
        Self {
            producer,
            workbook,
            listeners: Vec::new(),
        }
    }

    /// Add a listener that sees every selected sheet.
    pub fn register_listener(&mut self, listener: Box<dyn ReadListener<T>>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Register a converter for the whole workbook. Sheets already read are
    /// not affected.
    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) -> &mut Self {
        self.workbook.converters.register(converter);
        self
    }

    pub fn sheets(&self) -> &[SheetInfo] {
        self.producer.sheets()
    }

    /// Read the selected sheets in workbook order.
    ///
    /// A sheet matched by several selections is read once, with the first
    /// matching selection. Selections matching no sheet are skipped.
    pub fn read(&mut self, mut selections: Vec<ReadSheet<T>>) -> Result<()> {
        let mut plan: Vec<(SheetInfo, usize)> = Vec::new();
        for sheet in self.producer.sheets() {
            if let Some(i) = selections.iter().position(|s| s.selector.matches(sheet)) {
                plan.push((sheet.clone(), i));
            }
        }
        for (i, selection) in selections.iter().enumerate() {
            if !plan.iter().any(|(_, s)| *s == i) {
                warn!("no sheet matches {:?}", selection.selector);
            }
        }

        for (sheet, i) in plan {
            let selection = &mut selections[i];
            self.read_sheet(sheet, &selection.overrides, &mut selection.listeners)?;
        }
        Ok(())
    }

    /// Read every sheet with the reader's listeners.
    pub fn read_all(&mut self) -> Result<()> {
        self.read(vec![ReadSheet::all()])
    }

    fn read_sheet(
        &mut self,
        sheet: SheetInfo,
        overrides: &ReadOverrides,
        sheet_listeners: &mut [Box<dyn ReadListener<T>>],
    ) -> Result<()> {
        let holder = ReadSheetHolder::new(
            &self.workbook,
            sheet,
            overrides,
            T::declared_head(),
            self.listeners.len(),
        );
        info!("reading sheet {} '{}'", holder.sheet.index, holder.sheet.name);
        self.producer
            .begin_sheet(holder.sheet.index, holder.config.extra_read)?;

        let head_resolved = holder.config.head_row_number == 0;
        let mut run = SheetRun {
            holder,
            listeners: Listeners {
                workbook: &mut self.listeners,
                sheet: sheet_listeners,
            },
            header_rows: BTreeMap::new(),
            head_resolved,
            last_row: None,
        };

        let mut cells: BTreeMap<u32, CellData> = BTreeMap::new();
        let mut rows = 0usize;
        loop {
            let flow = match self.producer.next_token()? {
                Token::Cell(cell) => {
                    cells.insert(cell.column_index, cell);
                    Flow::Continue
                },
                Token::RowEnd(row_index) => {
                    rows += 1;
                    run.complete_row(row_index, mem::take(&mut cells))?
                },
                Token::Extra(extra) => run.extra(&extra)?,
                Token::SheetEnd | Token::EndOfStream => break,
            };
            if flow == Flow::Stop {
                debug!("sheet '{}' stopped after {} row(s)", run.holder.sheet.name, rows);
                break;
            }
        }
        run.finish()
    }

    /// End the session, releasing the producer's caches and handles.
    pub fn finish(mut self) -> Result<()> {
        self.producer.close()
    }
}

/// Read the first sheet of a file into memory.
///
/// ```no_run
/// use sheetflow::analysis::read_sync;
/// use sheetflow::model::RowMap;
/// use sheetflow::ReadOptions;
///
/// let rows: Vec<RowMap> = read_sync("data.xlsx", ReadOptions::default())?;
/// # Ok::<(), sheetflow::Error>(())
/// ```
pub fn read_sync<T, Q>(path: Q, options: ReadOptions) -> Result<Vec<T>>
where
    T: FromRow + Clone + 'static,
    Q: AsRef<Path>,
{
    let producer = open_producer(path, &options)?;
    let mut reader = ExcelReader::<_, T>::new(producer, options);
    let rows = CollectingListener::new();
    let handle = rows.handle();
    reader.register_listener(Box::new(rows));
    reader.read(vec![ReadSheet::index(0)])?;
    reader.finish()?;
    Ok(handle.take())
}
