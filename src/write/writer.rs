//! The write session: head-first tabular output onto a backend.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace, warn};
use tempfile::NamedTempFile;

use super::backend::{MemoryWorkbook, WriteBackend};
use super::data::{RowValues, ToRowData};
use super::handler::{CellWriteContext, WriteHandler};
use crate::common::{Error, Result, WorkbookFormat};
use crate::converter::{Converter, ConverterRegistry, NativeValue};
use crate::fill::FillSheetState;
use crate::holder::{
    HeadSource, WriteOptions, WriteOverrides, WriteScopeConfig, WriteSheetHolder, WriteTableHolder,
    WriteWorkbookHolder,
};
use crate::model::{CellData, CellStyle, ColumnFilter, ExcelHeadProperty, Head};

/// Target sheet of a write or fill call.
///
/// The sheet number wins when it names an existing sheet; otherwise the name
/// is looked up, and a new sheet is created when neither matches.
#[derive(Debug, Clone, Default)]
pub struct WriteSheet {
    pub sheet_no: Option<usize>,
    pub sheet_name: Option<String>,
    pub overrides: WriteOverrides,
}

impl WriteSheet {
    pub fn index(sheet_no: usize) -> Self {
        Self {
            sheet_no: Some(sheet_no),
            ..Default::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            sheet_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_overrides(mut self, overrides: WriteOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_head(mut self, head: HeadSource) -> Self {
        self.overrides.head = Some(head);
        self
    }

    pub fn with_need_head(mut self, need_head: bool) -> Self {
        self.overrides.need_head = Some(need_head);
        self
    }

    pub fn with_column_filter(mut self, filter: ColumnFilter) -> Self {
        self.overrides.column_filter = Some(filter);
        self
    }
}

/// One of several independent tables on a sheet.
#[derive(Debug, Clone, Default)]
pub struct WriteTable {
    pub table_no: usize,
    pub overrides: WriteOverrides,
}

impl WriteTable {
    pub fn new(table_no: usize) -> Self {
        Self {
            table_no,
            ..Default::default()
        }
    }

    pub fn with_head(mut self, head: HeadSource) -> Self {
        self.overrides.head = Some(head);
        self
    }

    pub fn with_overrides(mut self, overrides: WriteOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Effective layout of one write call.
struct Layout {
    sheet_name: String,
    table_no: Option<usize>,
    config: WriteScopeConfig,
    converters: ConverterRegistry,
    /// Heads after filtering, in their final columns
    head: ExcelHeadProperty,
    /// Head columns before filtering, in order
    source_columns: Vec<u32>,
    moved: BTreeMap<u32, u32>,
}

impl Layout {
    fn overflow_start(&self) -> u32 {
        self.head.max_column().map_or(0, |c| c + 1)
    }

    /// Column of the `i`-th positional value, `None` when filtered out.
    fn positional_column(&self, i: usize) -> Option<u32> {
        if self.source_columns.is_empty() {
            return filter_index(&self.config.column_filter, i as u32);
        }
        match self.source_columns.get(i) {
            Some(source) => self.moved.get(source).copied(),
            None => Some(self.overflow_start() + (i - self.source_columns.len()) as u32),
        }
    }
}

/// Index-only filtering for rows written without heads.
fn filter_index(filter: &ColumnFilter, col: u32) -> Option<u32> {
    if !filter.include_indexes.is_empty() {
        if filter.order_by_include_column {
            return filter.include_indexes.iter().position(|i| *i == col).map(|p| p as u32);
        }
        if !filter.include_indexes.contains(&col) {
            return None;
        }
        let mut before: Vec<u32> = filter.include_indexes.iter().copied().filter(|i| *i < col).collect();
        before.sort_unstable();
        before.dedup();
        return Some(before.len() as u32);
    }
    if filter.exclude_indexes.contains(&col) {
        return None;
    }
    let mut before: Vec<u32> = filter.exclude_indexes.iter().copied().filter(|i| *i < col).collect();
    before.sort_unstable();
    before.dedup();
    Some(col - before.len() as u32)
}

/// Convert one native value for a column; `None` for nulls.
pub(crate) fn convert_native(
    converters: &ConverterRegistry,
    config: &WriteScopeConfig,
    head: Option<&Head>,
    value: &NativeValue,
) -> Result<Option<CellData>> {
    let Some(native) = value.native_type() else {
        return Ok(None);
    };
    let target = head.and_then(|h| h.native_type).unwrap_or(native);
    let converter = match head.and_then(|h| h.converter.clone()) {
        Some(converter) => converter,
        None => converters.resolve_for_write(target, head.and_then(|h| h.cell_type))?,
    };
    let ctx = config.conversion_context();
    let ctx = ctx.with_format(head.and_then(|h| h.format.as_deref()));
    converter.to_cell(value, &ctx).map(Some)
}

struct TableState {
    holder: WriteTableHolder,
    head_written: bool,
}

/// A write session.
///
/// Sheets are written head first; each further call on the same sheet
/// continues after the highest row written so far. Converters and handlers
/// should be registered before the first write: sheet scopes snapshot the
/// workbook converters when first touched.
///
/// ```
/// use sheetflow::holder::HeadSource;
/// use sheetflow::write::{ExcelWriter, WriteSheet};
/// use sheetflow::{NativeValue, WriteOptions};
///
/// let mut writer = ExcelWriter::new(WriteOptions::default())?;
/// let sheet = WriteSheet::name("People").with_head(HeadSource::labels(["Name", "Age"]));
/// writer.write(&[vec![NativeValue::from("Ada"), NativeValue::from(36)]], &sheet)?;
/// let mut out = Vec::new();
/// writer.finish_into(&mut out)?;
/// assert_eq!(out, b"Name,Age\nAda,36\n");
/// # Ok::<(), sheetflow::Error>(())
/// ```
pub struct ExcelWriter<B: WriteBackend = MemoryWorkbook> {
    pub(crate) backend: B,
    pub(crate) workbook: WriteWorkbookHolder,
    pub(crate) sheets: BTreeMap<usize, WriteSheetHolder>,
    tables: BTreeMap<(usize, usize), TableState>,
    pub(crate) handlers: Vec<Box<dyn WriteHandler>>,
    pub(crate) fill_states: BTreeMap<usize, FillSheetState>,
    failed: bool,
}

impl ExcelWriter<MemoryWorkbook> {
    /// Write into a fresh in-memory workbook.
    pub fn new(options: WriteOptions) -> Result<Self> {
        let backend = MemoryWorkbook::new()
            .with_locale(options.locale)
            .with_1904_windowing(options.use_1904_windowing);
        Self::with_backend(backend, options)
    }
}

impl<B: WriteBackend> ExcelWriter<B> {
    pub fn with_backend(backend: B, options: WriteOptions) -> Result<Self> {
        Self::build(backend, options, false)
    }

    /// Write or fill on top of existing content; new rows continue after the
    /// last populated row of each sheet.
    pub fn with_template(template: B, options: WriteOptions) -> Result<Self> {
        Self::build(template, options, true)
    }

    fn build(backend: B, options: WriteOptions, has_template: bool) -> Result<Self> {
        Ok(Self {
            backend,
            workbook: WriteWorkbookHolder::new(&options, has_template)?,
            sheets: BTreeMap::new(),
            tables: BTreeMap::new(),
            handlers: Vec::new(),
            fill_states: BTreeMap::new(),
            failed: false,
        })
    }

    pub fn register_handler(&mut self, handler: Box<dyn WriteHandler>) {
        self.handlers.push(handler);
    }

    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) {
        self.workbook.converters.register(converter);
    }

    pub fn has_template(&self) -> bool {
        self.workbook.has_template
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Sheet scope of a sheet already touched by this writer.
    pub fn sheet_holder(&self, sheet: usize) -> Option<&WriteSheetHolder> {
        self.sheets.get(&sheet)
    }

    /// Write one row per element.
    ///
    /// A conversion failure aborts the call; rows written before it stay in
    /// the backend.
    pub fn write<R: ToRowData>(&mut self, data: &[R], sheet: &WriteSheet) -> Result<()> {
        let result = self.write_rows(data, sheet, None);
        self.track(result)
    }

    /// Like [`write`](Self::write), within a table of the sheet.
    pub fn write_table<R: ToRowData>(
        &mut self,
        data: &[R],
        sheet: &WriteSheet,
        table: &WriteTable,
    ) -> Result<()> {
        let result = self.write_rows(data, sheet, Some(table));
        self.track(result)
    }

    pub(crate) fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("write failed: {}", e);
            self.failed = true;
        }
        result
    }

    pub(crate) fn ensure_sheet(&mut self, target: &WriteSheet) -> Result<usize> {
        let existing = match (target.sheet_no, &target.sheet_name) {
            (Some(no), _) if no < self.backend.sheet_count() => Some(no),
            (_, Some(name)) => self.backend.find_sheet(name),
            _ => None,
        };
        let index = match existing {
            Some(index) => index,
            None => {
                let name = target
                    .sheet_name
                    .clone()
                    .unwrap_or_else(|| format!("Sheet{}", self.backend.sheet_count() + 1));
                debug!("creating sheet '{}'", name);
                self.backend.create_sheet(&name)?
            },
        };
        if !self.sheets.contains_key(&index) {
            let name = self.backend.sheet_name(index).unwrap_or_default().to_string();
            let holder = WriteSheetHolder::new(
                &self.workbook,
                index,
                name,
                &target.overrides,
                self.backend.last_row(index),
            )?;
            self.sheets.insert(index, holder);
            for handler in &mut self.handlers {
                handler.after_sheet_create(&mut self.backend, index)?;
            }
        }
        Ok(index)
    }

    pub(crate) fn holder_mut(&mut self, sheet: usize) -> Result<&mut WriteSheetHolder> {
        self.sheets
            .get_mut(&sheet)
            .ok_or_else(|| Error::Configuration(format!("sheet {sheet} is not open for writing")))
    }

    pub(crate) fn create_row(&mut self, sheet: usize, row_index: u32, is_head: bool) -> Result<()> {
        self.backend.create_row(sheet, row_index)?;
        for handler in &mut self.handlers {
            handler.after_row_create(&mut self.backend, sheet, row_index, is_head)?;
        }
        Ok(())
    }

    fn layout<R: ToRowData>(&mut self, sheet: usize, table: Option<&WriteTable>) -> Result<Layout> {
        let sheet_name = self.holder_mut(sheet)?.sheet_name.clone();
        let (config, converters, head) = match table {
            Some(table) => {
                let key = (sheet, table.table_no);
                if !self.tables.contains_key(&key) {
                    let holder = self.holder_mut(sheet)?;
                    let state = TableState {
                        holder: WriteTableHolder::new(holder, table.table_no, &table.overrides)?,
                        head_written: false,
                    };
                    self.tables.insert(key, state);
                }
                let state = self
                    .tables
                    .get(&key)
                    .ok_or_else(|| Error::Other(format!("table {} vanished", table.table_no)))?;
                (
                    state.holder.config.clone(),
                    state.holder.converters.clone(),
                    state.holder.head.clone(),
                )
            },
            None => {
                let holder = self.holder_mut(sheet)?;
                (holder.config.clone(), holder.converters.clone(), holder.head.clone())
            },
        };

        let mut head = head.unwrap_or_else(R::declared_head);
        let source_columns = head.heads().keys().copied().collect();
        let moved = head.apply_filter(&config.column_filter)?;
        Ok(Layout {
            sheet_name,
            table_no: table.map(|t| t.table_no),
            config,
            converters,
            head,
            source_columns,
            moved,
        })
    }

    fn head_pending(&self, sheet: usize, layout: &Layout) -> bool {
        if !layout.config.need_head || layout.head.is_empty() {
            return false;
        }
        match layout.table_no {
            Some(no) => self.tables.get(&(sheet, no)).is_some_and(|t| !t.head_written),
            None => self.sheets.get(&sheet).is_some_and(|s| !s.head_written()),
        }
    }

    fn mark_head_written(&mut self, sheet: usize, table_no: Option<usize>) -> Result<()> {
        match table_no {
            Some(no) => {
                if let Some(state) = self.tables.get_mut(&(sheet, no)) {
                    state.head_written = true;
                }
            },
            None => self.holder_mut(sheet)?.mark_head_written(),
        }
        Ok(())
    }

    fn write_rows<R: ToRowData>(
        &mut self,
        data: &[R],
        target: &WriteSheet,
        table: Option<&WriteTable>,
    ) -> Result<()> {
        let sheet = self.ensure_sheet(target)?;
        let layout = self.layout::<R>(sheet, table)?;

        if self.head_pending(sheet, &layout) {
            self.write_head(sheet, &layout)?;
            self.mark_head_written(sheet, layout.table_no)?;
        }

        let holder = self.holder_mut(sheet)?;
        let mut row_index = if holder.is_new() {
            layout.config.relative_head_row_index
        } else {
            holder.next_row_index()
        };
        let first = row_index;
        for (i, item) in data.iter().enumerate() {
            self.write_row(sheet, &layout, row_index, i, item.row_values(), R::declares)?;
            self.holder_mut(sheet)?.record_row(row_index);
            row_index += 1;
        }
        debug!(
            "wrote {} rows to sheet '{}' starting at row {}",
            data.len(),
            layout.sheet_name,
            first
        );
        Ok(())
    }

    fn write_head(&mut self, sheet: usize, layout: &Layout) -> Result<()> {
        let start = self.holder_mut(sheet)?.next_row_index() + layout.config.relative_head_row_index;
        for (offset, labels) in layout.head.label_grid().into_iter().enumerate() {
            let row_index = start + offset as u32;
            self.create_row(sheet, row_index, true)?;
            for (col, label) in labels {
                let head = layout.head.head(col);
                self.put_cell(sheet, layout, row_index, col, None, head, CellData::string(label))?;
            }
            self.holder_mut(sheet)?.record_row(row_index);
        }
        if layout.config.automatic_merge_head {
            for mut range in layout.head.merge_ranges() {
                range.first_row += start;
                range.last_row += start;
                self.backend.add_merged_region(sheet, range)?;
            }
        }
        Ok(())
    }

    fn write_row(
        &mut self,
        sheet: usize,
        layout: &Layout,
        row_index: u32,
        relative: usize,
        values: RowValues,
        declares: fn(&str) -> bool,
    ) -> Result<()> {
        self.create_row(sheet, row_index, false)?;
        match values {
            RowValues::Positional(values) => {
                for (i, value) in values.into_iter().enumerate() {
                    match layout.positional_column(i) {
                        Some(col) => self.put_value(sheet, layout, row_index, col, relative, &value)?,
                        None => trace!("value {} of row {} filtered out", i, row_index),
                    }
                }
            },
            RowValues::Keyed(values) => {
                for (key, value) in values {
                    match layout.positional_column(key) {
                        Some(col) => self.put_value(sheet, layout, row_index, col, relative, &value)?,
                        None => trace!("value {} of row {} filtered out", key, row_index),
                    }
                }
            },
            RowValues::Fields(fields) => {
                let mut extra_column = layout.overflow_start();
                for (name, value) in fields {
                    let col = match layout.head.head_for_field(name) {
                        Some(head) => head.column_index,
                        None if declares(name) => {
                            trace!("field '{}' has no column", name);
                            continue;
                        },
                        None => {
                            extra_column += 1;
                            extra_column - 1
                        },
                    };
                    self.put_value(sheet, layout, row_index, col, relative, &value)?;
                }
            },
        }
        Ok(())
    }

    fn put_value(
        &mut self,
        sheet: usize,
        layout: &Layout,
        row_index: u32,
        col: u32,
        relative: usize,
        value: &NativeValue,
    ) -> Result<()> {
        let head = layout.head.head(col);
        let cell = convert_native(&layout.converters, &layout.config, head, value)
            .map_err(|e| e.at(row_index, col))?;
        match cell {
            Some(cell) => self.put_cell(sheet, layout, row_index, col, Some(relative), head, cell),
            None => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn put_cell(
        &mut self,
        sheet: usize,
        layout: &Layout,
        row_index: u32,
        col: u32,
        relative: Option<usize>,
        head: Option<&Head>,
        cell: CellData,
    ) -> Result<()> {
        let ctx = CellWriteContext {
            sheet,
            sheet_name: &layout.sheet_name,
            table_no: layout.table_no,
            row_index,
            column_index: col,
            relative_row_index: relative,
            head,
        };
        let style = match (relative, head.and_then(|h| h.style.clone())) {
            (Some(_), Some(style)) => style,
            _ => CellStyle::default(),
        };
        self.store_cell(&ctx, cell, style)
    }

    /// Run the style hooks, store the cell and run the dispose hooks.
    pub(crate) fn store_cell(
        &mut self,
        ctx: &CellWriteContext<'_>,
        cell: CellData,
        mut style: CellStyle,
    ) -> Result<()> {
        for handler in &mut self.handlers {
            handler.after_cell_data_converted(ctx, &cell, &mut style)?;
        }
        let (sheet, row, col) = (ctx.sheet, ctx.row_index, ctx.column_index);
        self.backend.create_cell(sheet, row, col)?;
        self.backend.set_cell_value(sheet, row, col, cell)?;
        if style != CellStyle::default() {
            self.backend.set_cell_style(sheet, row, col, style)?;
        }
        for handler in &mut self.handlers {
            handler.after_cell_dispose(&mut self.backend, ctx)?;
        }
        Ok(())
    }

    fn check_complete(&self) -> Result<()> {
        if self.failed && !self.workbook.config.write_partial_on_exception {
            return Err(Error::Configuration(
                "an earlier write failed; enable write_partial_on_exception to keep partial output"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn serialize(&self, format: Option<WorkbookFormat>, sink: &mut dyn Write) -> Result<()> {
        match format {
            Some(format) => self.backend.serialize_as(format, sink),
            None => self.backend.serialize(sink),
        }
    }

    /// Serialize the workbook into `sink`, in the configured output format
    /// when one is set.
    pub fn finish_into<W: Write>(self, sink: &mut W) -> Result<()> {
        self.check_complete()?;
        self.serialize(self.workbook.output_format, sink)?;
        sink.flush()?;
        Ok(())
    }

    /// Serialize the workbook to `path` through a temporary file in the same
    /// directory, renamed over the destination once complete.
    ///
    /// Without a configured output format the extension of `path` picks one.
    pub fn to_path<P: AsRef<Path>>(self, path: P) -> Result<()> {
        self.check_complete()?;
        let path = path.as_ref();
        let format = self.workbook.output_format.or_else(|| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .and_then(WorkbookFormat::from_extension)
        });
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        let written = {
            let mut out = BufWriter::new(temp.as_file_mut());
            self.serialize(format, &mut out)
                .and_then(|_| out.flush().map_err(Error::from))
        };
        match written {
            Ok(()) => {
                temp.as_file().sync_all()?;
                temp.persist(path).map_err(|e| Error::Io(e.error))?;
                debug!("workbook written to {}", path.display());
                Ok(())
            },
            Err(e) if self.workbook.config.write_partial_on_exception => {
                warn!("keeping partial output at {}: {}", path.display(), e);
                temp.persist(path).map_err(|e| Error::Io(e.error))?;
                Err(e)
            },
            Err(e) => Err(e),
        }
    }
}
