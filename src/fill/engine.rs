//! Placeholder expansion on a template sheet.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, trace};

use super::data::{FillConfig, FillData, FillDirection, FillElement};
use super::template::{self, Placeholder, Segment, TemplateCell};
use crate::common::{CellRange, Error, Result};
use crate::converter::{ConverterRegistry, NativeValue};
use crate::holder::WriteScopeConfig;
use crate::model::CellData;
use crate::write::writer::convert_native;
use crate::write::{CellWriteContext, ExcelWriter, WriteBackend, WriteSheet};

/// Fill progress of one sheet.
#[derive(Debug, Clone, Default)]
pub(crate) struct FillSheetState {
    cells: Vec<TemplateCell>,
    /// Elements already filled per list name
    cursors: HashMap<Option<String>, u32>,
}

impl FillSheetState {
    fn compile<B: WriteBackend + ?Sized>(backend: &B, sheet: usize) -> Self {
        Self {
            cells: template::compile(backend, sheet),
            cursors: HashMap::new(),
        }
    }

    /// Rows at or below `at` moved down by `count`.
    fn rows_shifted(&mut self, at: u32, count: u32) {
        for cell in &mut self.cells {
            if cell.row >= at {
                cell.row += count;
            }
        }
    }

    /// Cells of `row` at or right of `at` moved right by `count`.
    fn columns_shifted(&mut self, row: u32, at: u32, count: u32) {
        for cell in &mut self.cells {
            if cell.row == row && cell.col >= at {
                cell.col += count;
            }
        }
    }
}

/// Resolved settings of the sheet being filled.
struct FillScope {
    sheet: usize,
    sheet_name: String,
    config: WriteScopeConfig,
    converters: ConverterRegistry,
}

impl FillScope {
    fn value_cell(&self, value: Option<&NativeValue>) -> Result<CellData> {
        match value {
            Some(value) => Ok(convert_native(&self.converters, &self.config, None, value)?
                .unwrap_or_else(CellData::empty)),
            None => Ok(CellData::empty()),
        }
    }

    fn value_text(&self, value: Option<&NativeValue>) -> Result<String> {
        let cell = self.value_cell(value)?;
        Ok(cell
            .display_text(self.config.use_1904_windowing, &self.config.locale)
            .into_owned())
    }

    /// Render template segments. `lookup` yields `None` for tokens this fill
    /// does not bind, which keep their placeholder text.
    fn render<'a>(
        &self,
        segments: &[Segment],
        lookup: impl Fn(&Placeholder) -> Option<Option<&'a NativeValue>>,
    ) -> Result<CellData> {
        if let [Segment::Placeholder { token, .. }] = segments
            && let Some(value) = lookup(token)
        {
            return self.value_cell(value);
        }
        let mut text = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Placeholder { token, raw } => match lookup(token) {
                    Some(value) => text.push_str(&self.value_text(value)?),
                    None => text.push_str(raw),
                },
            }
        }
        Ok(CellData::string(text))
    }
}

impl<B: WriteBackend> ExcelWriter<B> {
    /// Fill placeholders of a template sheet.
    ///
    /// Scalar maps replace `{name}` tokens once. Lists expand from their
    /// placeholder row (or column); repeated calls with the same list continue
    /// after the elements already filled. Placeholders this call has no data
    /// for are left in place.
    pub fn fill(&mut self, data: FillData, config: FillConfig, sheet: &WriteSheet) -> Result<()> {
        let result = self.fill_sheet(data, config, sheet);
        self.track(result)
    }

    fn fill_sheet(&mut self, data: FillData, config: FillConfig, target: &WriteSheet) -> Result<()> {
        if !self.has_template() {
            return Err(Error::Configuration(
                "fill requires a writer opened with a template".to_string(),
            ));
        }
        let sheet = self.ensure_sheet(target)?;
        let mut state = match self.fill_states.remove(&sheet) {
            Some(state) => state,
            None => {
                let state = FillSheetState::compile(&self.backend, sheet);
                debug!("sheet {} holds {} placeholder cells", sheet, state.cells.len());
                state
            },
        };
        let holder = self.holder_mut(sheet)?;
        let scope = FillScope {
            sheet,
            sheet_name: holder.sheet_name.clone(),
            config: holder.config.clone(),
            converters: holder.converters.clone(),
        };

        let result = match &data {
            FillData::Map(values) => self.fill_scalars(&scope, &mut state, values),
            FillData::List(items) => self.fill_list(&scope, &mut state, None, items, config),
            FillData::Wrapper(wrapper) => {
                self.fill_list(&scope, &mut state, wrapper.name.as_deref(), &wrapper.items, config)
            },
        };
        self.fill_states.insert(sheet, state);
        result
    }

    fn fill_scalars(
        &mut self,
        scope: &FillScope,
        state: &mut FillSheetState,
        values: &BTreeMap<String, NativeValue>,
    ) -> Result<()> {
        let lookup = |token: &Placeholder| match token {
            Placeholder::Scalar(key) => values.get(key).map(Some),
            Placeholder::List { .. } => None,
        };
        for cell in &mut state.cells {
            let bound = cell.segments.iter().any(|s| match s {
                Segment::Placeholder { token, .. } => lookup(token).is_some(),
                Segment::Literal(_) => false,
            });
            if !bound {
                continue;
            }
            let data = scope.render(&cell.segments, lookup)?;
            let style = self
                .backend
                .cell_style(scope.sheet, cell.row, cell.col)
                .cloned()
                .unwrap_or_default();
            let ctx = CellWriteContext {
                sheet: scope.sheet,
                sheet_name: &scope.sheet_name,
                table_no: None,
                row_index: cell.row,
                column_index: cell.col,
                relative_row_index: Some(0),
                head: None,
            };
            self.store_cell(&ctx, data, style)?;
            self.holder_mut(scope.sheet)?.record_row(cell.row);

            // Filled tokens become literal text for later calls
            for segment in &mut cell.segments {
                if let Segment::Placeholder { token, .. } = segment
                    && let Some(value) = lookup(token)
                {
                    *segment = Segment::Literal(scope.value_text(value)?);
                }
            }
        }
        state.cells.retain(TemplateCell::has_placeholders);
        Ok(())
    }

    fn fill_list(
        &mut self,
        scope: &FillScope,
        state: &mut FillSheetState,
        list: Option<&str>,
        items: &[FillElement],
        config: FillConfig,
    ) -> Result<()> {
        if !state.cells.iter().any(|c| c.binds_list(list)) {
            debug!("no placeholder for list {:?} on sheet '{}'", list, scope.sheet_name);
            return Ok(());
        }
        if items.is_empty() {
            return Ok(());
        }
        let key = list.map(str::to_string);
        let cursor = state.cursors.get(&key).copied().unwrap_or(0);
        let count = items.len() as u32;

        if config.force_new_row {
            // The placeholder line itself takes the first element
            let inserted = if cursor == 0 { count - 1 } else { count };
            if inserted > 0 {
                self.insert_lines(scope, state, list, cursor.max(1), inserted, config.direction)?;
            }
        }

        let cells: Vec<TemplateCell> = state.cells.iter().filter(|c| c.binds_list(list)).cloned().collect();
        let mut created = BTreeSet::new();
        for cell in &cells {
            let style = self
                .backend
                .cell_style(scope.sheet, cell.row, cell.col)
                .cloned()
                .unwrap_or_default();
            let merges = self.anchored_merges(scope.sheet, cell, config.direction);

            for (k, element) in items.iter().enumerate() {
                let offset = cursor + k as u32;
                let (row, col) = match config.direction {
                    FillDirection::Vertical => (cell.row + offset, cell.col),
                    FillDirection::Horizontal => (cell.row, cell.col + offset),
                };
                let data = scope.render(&cell.segments, |token| {
                    token.list_binding(list).map(|binding| element.value(binding))
                })?;
                if created.insert(row) {
                    self.create_row(scope.sheet, row, false)?;
                }
                let ctx = CellWriteContext {
                    sheet: scope.sheet,
                    sheet_name: &scope.sheet_name,
                    table_no: None,
                    row_index: row,
                    column_index: col,
                    relative_row_index: Some(offset as usize),
                    head: None,
                };
                self.store_cell(&ctx, data, style.clone())?;
                if offset > 0 {
                    for merge in &merges {
                        self.backend
                            .add_merged_region(scope.sheet, shifted(*merge, offset, config.direction))?;
                    }
                }
                self.holder_mut(scope.sheet)?.record_row(row);
            }
        }
        trace!("list {:?} filled {} elements from element {}", list, count, cursor);
        state.cursors.insert(key, cursor + count);
        Ok(())
    }

    /// Make room for `count` elements `offset` lines after each placeholder
    /// line of the list.
    fn insert_lines(
        &mut self,
        scope: &FillScope,
        state: &mut FillSheetState,
        list: Option<&str>,
        offset: u32,
        count: u32,
        direction: FillDirection,
    ) -> Result<()> {
        match direction {
            FillDirection::Vertical => {
                let rows: BTreeSet<u32> = state
                    .cells
                    .iter()
                    .filter(|c| c.binds_list(list))
                    .map(|c| c.row)
                    .collect();
                // Bottom up, so each insertion point is still valid
                for row in rows.into_iter().rev() {
                    let at = row + offset;
                    debug!("inserting {} rows at {} on sheet '{}'", count, at, scope.sheet_name);
                    self.backend.shift_rows(scope.sheet, at, count)?;
                    state.rows_shifted(at, count);
                    let holder = self.holder_mut(scope.sheet)?;
                    if holder.last_row_index().is_some_and(|last| last >= at) {
                        holder.record_shift(count);
                    }
                }
            },
            FillDirection::Horizontal => {
                let mut first_columns: BTreeMap<u32, u32> = BTreeMap::new();
                for cell in state.cells.iter().filter(|c| c.binds_list(list)) {
                    let col = first_columns.entry(cell.row).or_insert(cell.col);
                    *col = (*col).min(cell.col);
                }
                for (row, col) in first_columns {
                    let at = col + offset;
                    self.backend.shift_cells_right(scope.sheet, row, at, count)?;
                    state.columns_shifted(row, at, count);
                }
            },
        }
        Ok(())
    }

    /// Single-line merged regions starting at a placeholder cell; they are
    /// repeated for every element.
    fn anchored_merges(&self, sheet: usize, cell: &TemplateCell, direction: FillDirection) -> Vec<CellRange> {
        self.backend
            .merged_regions(sheet)
            .into_iter()
            .filter(|r| match direction {
                FillDirection::Vertical => {
                    r.first_row == cell.row && r.last_row == cell.row && r.first_col == cell.col
                },
                FillDirection::Horizontal => {
                    r.first_col == cell.col && r.last_col == cell.col && r.first_row == cell.row
                },
            })
            .collect()
    }
}

fn shifted(range: CellRange, offset: u32, direction: FillDirection) -> CellRange {
    match direction {
        FillDirection::Vertical => CellRange::new(
            range.first_row + offset,
            range.last_row + offset,
            range.first_col,
            range.last_col,
        ),
        FillDirection::Horizontal => CellRange::new(
            range.first_row,
            range.last_row,
            range.first_col + offset,
            range.last_col + offset,
        ),
    }
}
