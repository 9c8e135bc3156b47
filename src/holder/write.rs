//! Write-side holders: workbook, sheet and table scopes plus row bookkeeping.

use super::options::WriteOptions;
use super::scope::{WriteOverrides, WriteScopeConfig, derive_registry};
use crate::common::{Result, WorkbookFormat};
use crate::converter::ConverterRegistry;
use crate::model::ExcelHeadProperty;

/// Workbook scope of a write session.
#[derive(Debug, Clone)]
pub struct WriteWorkbookHolder {
    pub config: WriteScopeConfig,
    pub converters: ConverterRegistry,
    /// Whether the workbook was opened from a template
    pub has_template: bool,
    pub output_format: Option<WorkbookFormat>,
}

impl WriteWorkbookHolder {
    pub fn new(options: &WriteOptions, has_template: bool) -> Result<Self> {
        Ok(Self {
            config: WriteScopeConfig::workbook(options)?,
            converters: ConverterRegistry::with_defaults(),
            has_template,
            output_format: options.output_format,
        })
    }
}

/// Where the next row of a sheet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastRowState {
    /// Template sheet without any row yet
    TemplateEmpty,
    /// Fresh sheet without any row yet
    CommonEmpty,
    /// At least one row exists; `last_row_index` is meaningful
    HasData,
}

/// Sheet scope of a write session.
#[derive(Debug, Clone)]
pub struct WriteSheetHolder {
    pub sheet_no: usize,
    pub sheet_name: String,
    pub config: WriteScopeConfig,
    pub converters: ConverterRegistry,
    /// Sheet-level head, used when a table brings none
    pub head: Option<ExcelHeadProperty>,
    last_row_index: u32,
    last_row_state: LastRowState,
    head_written: bool,
}

impl WriteSheetHolder {
    /// `existing_last_row` is the last populated row already present in the
    /// backing sheet (template content), if any.
    pub fn new(
        parent: &WriteWorkbookHolder,
        sheet_no: usize,
        sheet_name: impl Into<String>,
        overrides: &WriteOverrides,
        existing_last_row: Option<u32>,
    ) -> Result<Self> {
        let (last_row_index, last_row_state) = match existing_last_row {
            Some(row) => (row, LastRowState::HasData),
            None if parent.has_template => (0, LastRowState::TemplateEmpty),
            None => (0, LastRowState::CommonEmpty),
        };
        Ok(Self {
            sheet_no,
            sheet_name: sheet_name.into(),
            config: parent.config.child(overrides)?,
            converters: derive_registry(&parent.converters, &overrides.converters),
            head: overrides.head.as_ref().map(|source| source.build()),
            last_row_index,
            last_row_state,
            head_written: false,
        })
    }

    pub fn last_row_state(&self) -> LastRowState {
        self.last_row_state
    }

    /// Highest row index written so far, if any.
    pub fn last_row_index(&self) -> Option<u32> {
        match self.last_row_state {
            LastRowState::HasData => Some(self.last_row_index),
            _ => None,
        }
    }

    /// Whether nothing has been written to the sheet yet.
    pub fn is_new(&self) -> bool {
        self.last_row_state != LastRowState::HasData
    }

    /// Index of the next row: 0 on an empty sheet, otherwise directly after
    /// the highest row seen.
    pub fn next_row_index(&self) -> u32 {
        match self.last_row_state {
            LastRowState::TemplateEmpty | LastRowState::CommonEmpty => 0,
            LastRowState::HasData => self.last_row_index + 1,
        }
    }

    /// Record that a row was written; the index never moves backwards.
    pub fn record_row(&mut self, row_index: u32) {
        if self.last_row_state != LastRowState::HasData || row_index > self.last_row_index {
            self.last_row_index = row_index;
        }
        self.last_row_state = LastRowState::HasData;
    }

    /// Record that `count` rows were inserted at or above the last row.
    pub fn record_shift(&mut self, count: u32) {
        if self.last_row_state == LastRowState::HasData {
            self.last_row_index += count;
        }
    }

    pub fn head_written(&self) -> bool {
        self.head_written
    }

    pub fn mark_head_written(&mut self) {
        self.head_written = true;
    }
}

/// Table scope: several independent tables may share one sheet.
#[derive(Debug, Clone)]
pub struct WriteTableHolder {
    pub table_no: usize,
    pub config: WriteScopeConfig,
    pub converters: ConverterRegistry,
    pub head: Option<ExcelHeadProperty>,
}

impl WriteTableHolder {
    pub fn new(parent: &WriteSheetHolder, table_no: usize, overrides: &WriteOverrides) -> Result<Self> {
        Ok(Self {
            table_no,
            config: parent.config.child(overrides)?,
            converters: derive_registry(&parent.converters, &overrides.converters),
            head: overrides
                .head
                .as_ref()
                .map(|source| source.build())
                .or_else(|| parent.head.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::model::ColumnFilter;

    fn workbook(has_template: bool) -> WriteWorkbookHolder {
        WriteWorkbookHolder::new(&WriteOptions::default(), has_template).unwrap()
    }

    #[test]
    fn test_monotonic_rows() {
        let mut sheet =
            WriteSheetHolder::new(&workbook(false), 0, "S", &WriteOverrides::default(), None).unwrap();
        assert_eq!(sheet.last_row_state(), LastRowState::CommonEmpty);
        assert_eq!(sheet.next_row_index(), 0);
        let mut written = 0;
        for k in [3u32, 1, 4] {
            let start = sheet.next_row_index();
            assert_eq!(start, written);
            for row in start..start + k {
                sheet.record_row(row);
            }
            written += k;
        }
        sheet.record_row(2);
        assert_eq!(sheet.next_row_index(), written);
    }

    #[test]
    fn test_template_states() {
        let empty =
            WriteSheetHolder::new(&workbook(true), 0, "T", &WriteOverrides::default(), None).unwrap();
        assert_eq!(empty.last_row_state(), LastRowState::TemplateEmpty);
        assert_eq!(empty.next_row_index(), 0);

        let filled =
            WriteSheetHolder::new(&workbook(true), 0, "T", &WriteOverrides::default(), Some(4)).unwrap();
        assert!(!filled.is_new());
        assert_eq!(filled.next_row_index(), 5);
    }

    #[test]
    fn test_conflicting_filter_rejected() {
        let overrides = WriteOverrides {
            column_filter: Some(ColumnFilter {
                include_indexes: vec![0],
                exclude_names: vec!["a".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = WriteSheetHolder::new(&workbook(false), 0, "S", &overrides, None);
        assert!(matches!(result, Err(Error::Configuration(_))));

        let options = WriteOptions::default()
            .with_include_column_indexes(vec![1])
            .with_exclude_column_indexes(vec![2]);
        assert!(matches!(
            WriteWorkbookHolder::new(&options, false),
            Err(Error::Configuration(_))
        ));
    }
}
