//! The write collaborator and its in-memory implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;

use log::debug;

use crate::common::numfmt::NumberLocale;
use crate::common::{CellRange, Error, Result, WorkbookFormat};
use crate::holder::ReadOptions;
use crate::model::{CellData, CellStyle, ExtraKind, ExtraType};
use crate::producer::{RowProducer, Token, open_producer, open_producer_from_bytes};

/// Cell storage the write and fill engines populate.
///
/// Coordinates are 0-based. Shifting moves cells, styles and merged regions
/// together so they stay aligned.
pub trait WriteBackend {
    fn sheet_count(&self) -> usize;

    fn sheet_name(&self, sheet: usize) -> Option<&str>;

    /// Append a sheet and return its index.
    fn create_sheet(&mut self, name: &str) -> Result<usize>;

    fn create_row(&mut self, sheet: usize, row: u32) -> Result<()>;

    /// Make sure a cell exists; an existing cell is left as it is.
    fn create_cell(&mut self, sheet: usize, row: u32, col: u32) -> Result<()>;

    fn set_cell_value(&mut self, sheet: usize, row: u32, col: u32, value: CellData) -> Result<()>;

    fn set_cell_style(&mut self, sheet: usize, row: u32, col: u32, style: CellStyle) -> Result<()>;

    fn cell(&self, sheet: usize, row: u32, col: u32) -> Option<&CellData>;

    fn cell_style(&self, sheet: usize, row: u32, col: u32) -> Option<&CellStyle>;

    /// Coordinates of every populated cell in row-major order.
    fn cells(&self, sheet: usize) -> Vec<(u32, u32)>;

    /// Highest row holding anything, if any.
    fn last_row(&self, sheet: usize) -> Option<u32>;

    fn add_merged_region(&mut self, sheet: usize, range: CellRange) -> Result<()>;

    fn merged_regions(&self, sheet: usize) -> Vec<CellRange>;

    /// Move every row at or below `from_row` down by `count`.
    fn shift_rows(&mut self, sheet: usize, from_row: u32, count: u32) -> Result<()>;

    /// Move the cells of `row` at or right of `from_col` right by `count`.
    fn shift_cells_right(&mut self, sheet: usize, row: u32, from_col: u32, count: u32) -> Result<()>;

    fn serialize(&self, sink: &mut dyn Write) -> Result<()>;

    /// Serialize as a specific container. Backends that only know one
    /// layout accept delimited text and reject the rest.
    fn serialize_as(&self, format: WorkbookFormat, sink: &mut dyn Write) -> Result<()> {
        match format {
            WorkbookFormat::Csv => self.serialize(sink),
            other => Err(Error::Configuration(format!("this backend cannot write {other:?} output"))),
        }
    }

    fn find_sheet(&self, name: &str) -> Option<usize> {
        (0..self.sheet_count()).find(|i| self.sheet_name(*i).is_some_and(|n| n.trim() == name.trim()))
    }
}

/// One sheet of a [`MemoryWorkbook`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    pub(super) name: String,
    pub(super) cells: BTreeMap<(u32, u32), CellData>,
    pub(super) cell_styles: HashMap<(u32, u32), CellStyle>,
    pub(super) rows: BTreeSet<u32>,
    pub(super) merged_cells: Vec<CellRange>,
}

impl MemorySheet {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn shift_rows(&mut self, from_row: u32, count: u32) {
        let moved: Vec<((u32, u32), CellData)> = self
            .cells
            .range((from_row, 0)..)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (key, _) in &moved {
            self.cells.remove(key);
        }
        for ((row, col), cell) in moved {
            self.cells.insert((row + count, col), cell.at(row + count, col));
        }

        self.cell_styles = self
            .cell_styles
            .drain()
            .map(|((row, col), style)| {
                let row = if row >= from_row { row + count } else { row };
                ((row, col), style)
            })
            .collect();
        self.rows = self
            .rows
            .iter()
            .map(|r| if *r >= from_row { r + count } else { *r })
            .collect();
        for range in &mut self.merged_cells {
            range.shift_rows(from_row, count);
        }
    }

    fn shift_cells_right(&mut self, row: u32, from_col: u32, count: u32) {
        let moved: Vec<(u32, CellData)> = self
            .cells
            .range((row, from_col)..=(row, u32::MAX))
            .map(|((_, col), v)| (*col, v.clone()))
            .collect();
        for (col, _) in &moved {
            self.cells.remove(&(row, *col));
        }
        for (col, cell) in moved {
            self.cells.insert((row, col + count), cell.at(row, col + count));
        }

        let styles: Vec<(u32, CellStyle)> = self
            .cell_styles
            .iter()
            .filter(|((r, c), _)| *r == row && *c >= from_col)
            .map(|((_, c), s)| (*c, s.clone()))
            .collect();
        for (col, _) in &styles {
            self.cell_styles.remove(&(row, *col));
        }
        for (col, style) in styles {
            self.cell_styles.insert((row, col + count), style);
        }
        for range in &mut self.merged_cells {
            if (range.first_row..=range.last_row).contains(&row) {
                range.shift_columns(from_col, count);
            }
        }
    }

    #[cfg(feature = "csv")]
    fn write_csv(&self, sink: &mut dyn Write, date1904: bool, locale: &NumberLocale) -> Result<()> {
        let Some(last_row) = self.rows.iter().next_back().copied() else {
            return Ok(());
        };
        for row in 0..=last_row {
            let cells: Vec<(u32, &CellData)> = self
                .cells
                .range((row, 0)..=(row, u32::MAX))
                .map(|((_, col), cell)| (*col, cell))
                .collect();
            // A row without cells is a bare line break; the csv writer would
            // quote it as an empty field
            let Some(width) = cells.last().map(|(col, _)| col + 1) else {
                sink.write_all(b"\n")?;
                continue;
            };
            let mut record = vec![String::new(); width as usize];
            for (col, cell) in cells {
                record[col as usize] = cell.display_text(date1904, locale).into_owned();
            }
            let mut out = csv::WriterBuilder::new()
                .flexible(true)
                .buffer_capacity(256)
                .from_writer(&mut *sink);
            out.write_record(&record)?;
            out.flush()?;
        }
        Ok(())
    }
}

/// A workbook kept entirely in memory.
///
/// [`serialize`](WriteBackend::serialize) writes delimited text, one sheet
/// after another separated by a blank line. With the `xlsx` feature,
/// [`serialize_as`](WriteBackend::serialize_as) also writes a SpreadsheetML
/// package that keeps styles and merged regions. It can be loaded from any
/// row producer to serve as a fill template.
///
/// ```
/// use sheetflow::model::CellData;
/// use sheetflow::write::{MemoryWorkbook, WriteBackend};
///
/// let mut workbook = MemoryWorkbook::new();
/// let sheet = workbook.create_sheet("Data")?;
/// workbook.set_cell_value(sheet, 0, 1, CellData::string("b"))?;
/// let mut out = Vec::new();
/// workbook.serialize(&mut out)?;
/// assert_eq!(out, b",b\n");
/// # Ok::<(), sheetflow::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryWorkbook {
    pub(super) sheets: Vec<MemorySheet>,
    pub(super) date1904: bool,
    locale: NumberLocale,
    modified: bool,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_1904_windowing(mut self, use_1904: bool) -> Self {
        self.date1904 = use_1904;
        self
    }

    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = locale;
        self
    }

    /// Copy every sheet of a producer, with merged regions.
    pub fn from_producer<P: RowProducer + ?Sized>(producer: &mut P) -> Result<Self> {
        let mut workbook = Self::new().with_1904_windowing(producer.date1904());
        let infos = producer.sheets().to_vec();
        for info in infos {
            let mut sheet = MemorySheet::new(info.name.clone());
            producer.begin_sheet(info.index, ExtraType::MERGE)?;
            loop {
                match producer.next_token()? {
                    Token::Cell(cell) => {
                        if !cell.is_empty() {
                            sheet.cells.insert((cell.row_index, cell.column_index), cell);
                        }
                    },
                    Token::RowEnd(row) => {
                        sheet.rows.insert(row);
                    },
                    Token::Extra(extra) if extra.kind == ExtraKind::Merge => {
                        sheet.merged_cells.push(extra.range);
                    },
                    Token::Extra(_) => {},
                    Token::SheetEnd | Token::EndOfStream => break,
                }
            }
            debug!("loaded template sheet '{}' with {} cells", sheet.name, sheet.cells.len());
            workbook.sheets.push(sheet);
        }
        Ok(workbook)
    }

    /// Load a workbook file of any supported format.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut producer = open_producer(path, &ReadOptions::default())?;
        let workbook = Self::from_producer(&mut producer)?;
        producer.close()?;
        Ok(workbook)
    }

    /// Load a workbook held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut producer = open_producer_from_bytes(bytes, &ReadOptions::default())?;
        let workbook = Self::from_producer(&mut producer)?;
        producer.close()?;
        Ok(workbook)
    }

    pub fn sheet(&self, index: usize) -> Option<&MemorySheet> {
        self.sheets.get(index)
    }

    /// Whether anything was written since the workbook was created or loaded.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn sheet_mut(&mut self, index: usize) -> Result<&mut MemorySheet> {
        self.modified = true;
        self.sheets
            .get_mut(index)
            .ok_or_else(|| Error::Configuration(format!("no sheet at index {index}")))
    }
}

impl WriteBackend for MemoryWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_name(&self, sheet: usize) -> Option<&str> {
        self.sheets.get(sheet).map(MemorySheet::name)
    }

    fn create_sheet(&mut self, name: &str) -> Result<usize> {
        self.modified = true;
        self.sheets.push(MemorySheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    fn create_row(&mut self, sheet: usize, row: u32) -> Result<()> {
        self.sheet_mut(sheet)?.rows.insert(row);
        Ok(())
    }

    fn create_cell(&mut self, sheet: usize, row: u32, col: u32) -> Result<()> {
        let sheet = self.sheet_mut(sheet)?;
        sheet.rows.insert(row);
        sheet
            .cells
            .entry((row, col))
            .or_insert_with(|| CellData::empty().at(row, col));
        Ok(())
    }

    fn set_cell_value(&mut self, sheet: usize, row: u32, col: u32, value: CellData) -> Result<()> {
        let sheet = self.sheet_mut(sheet)?;
        sheet.rows.insert(row);
        sheet.cells.insert((row, col), value.at(row, col));
        Ok(())
    }

    fn set_cell_style(&mut self, sheet: usize, row: u32, col: u32, style: CellStyle) -> Result<()> {
        self.sheet_mut(sheet)?.cell_styles.insert((row, col), style);
        Ok(())
    }

    fn cell(&self, sheet: usize, row: u32, col: u32) -> Option<&CellData> {
        self.sheets.get(sheet)?.cells.get(&(row, col))
    }

    fn cell_style(&self, sheet: usize, row: u32, col: u32) -> Option<&CellStyle> {
        self.sheets.get(sheet)?.cell_styles.get(&(row, col))
    }

    fn cells(&self, sheet: usize) -> Vec<(u32, u32)> {
        self.sheets
            .get(sheet)
            .map(|s| s.cells.keys().copied().collect())
            .unwrap_or_default()
    }

    fn last_row(&self, sheet: usize) -> Option<u32> {
        self.sheets.get(sheet)?.rows.iter().next_back().copied()
    }

    fn add_merged_region(&mut self, sheet: usize, range: CellRange) -> Result<()> {
        let sheet = self.sheet_mut(sheet)?;
        if !sheet.merged_cells.contains(&range) {
            sheet.merged_cells.push(range);
        }
        Ok(())
    }

    fn merged_regions(&self, sheet: usize) -> Vec<CellRange> {
        self.sheets
            .get(sheet)
            .map(|s| s.merged_cells.clone())
            .unwrap_or_default()
    }

    fn shift_rows(&mut self, sheet: usize, from_row: u32, count: u32) -> Result<()> {
        if count > 0 {
            self.sheet_mut(sheet)?.shift_rows(from_row, count);
        }
        Ok(())
    }

    fn shift_cells_right(&mut self, sheet: usize, row: u32, from_col: u32, count: u32) -> Result<()> {
        if count > 0 {
            self.sheet_mut(sheet)?.shift_cells_right(row, from_col, count);
        }
        Ok(())
    }

    #[cfg(feature = "csv")]
    fn serialize(&self, sink: &mut dyn Write) -> Result<()> {
        for (i, sheet) in self.sheets.iter().enumerate() {
            if i > 0 {
                sink.write_all(b"\n")?;
            }
            sheet.write_csv(sink, self.date1904, &self.locale)?;
        }
        sink.flush()?;
        Ok(())
    }

    #[cfg(not(feature = "csv"))]
    fn serialize(&self, _sink: &mut dyn Write) -> Result<()> {
        Err(Error::Configuration(
            "in-memory workbooks serialize as delimited text, which is not compiled in".to_string(),
        ))
    }

    fn serialize_as(&self, format: WorkbookFormat, sink: &mut dyn Write) -> Result<()> {
        match format {
            WorkbookFormat::Csv => self.serialize(sink),
            #[cfg(feature = "xlsx")]
            WorkbookFormat::Xlsx => super::xlsx::write_package(self, sink),
            other => Err(Error::Configuration(format!(
                "in-memory workbooks cannot be written as {other:?}"
            ))),
        }
    }
}
