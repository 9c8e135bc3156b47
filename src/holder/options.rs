//! Session options as supplied by the caller.
//!
//! Options are plain data with builder-style setters and can be loaded from
//! or rendered to YAML.

use serde::{Deserialize, Serialize};

use crate::cache::CacheLocation;
use crate::common::numfmt::NumberLocale;
use crate::common::{Error, Result, WorkbookFormat};
use crate::model::{ColumnFilter, ExtraType};

/// Shape of rows delivered to map-typed listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadDefaultReturn {
    /// Display text of each cell
    #[default]
    String,
    /// Each cell converted to its natural native type
    ActualData,
    /// The cells themselves
    CellData,
}

/// Delimited-text dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub delimiter: u8,
    pub quote: u8,
    pub trim_whitespace: bool,
    pub comment: Option<u8>,
    /// Name reported for the single sheet
    pub sheet_name: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            trim_whitespace: false,
            comment: None,
            sheet_name: "Sheet1".to_string(),
        }
    }
}

impl CsvConfig {
    pub fn tab_separated() -> Self {
        Self {
            delimiter: b'\t',
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Options of a read session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Number of leading header rows
    pub head_row_number: usize,
    /// Skip rows without any non-empty cell
    pub ignore_empty_row: bool,
    /// Trim string cells
    pub auto_trim: bool,
    /// Remove all whitespace from string cells
    pub auto_strip: bool,
    /// Override the workbook's detected date system
    pub use_1904_windowing: Option<bool>,
    pub read_default_return: ReadDefaultReturn,
    pub extra_read: ExtraType,
    pub cache: CacheLocation,
    pub locale: NumberLocale,
    /// Force a container format instead of detecting it
    pub format: Option<WorkbookFormat>,
    /// Delimited-text dialect; only valid for CSV input
    pub csv: Option<CsvConfig>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            head_row_number: 1,
            ignore_empty_row: true,
            auto_trim: true,
            auto_strip: false,
            use_1904_windowing: None,
            read_default_return: ReadDefaultReturn::String,
            extra_read: ExtraType::empty(),
            cache: CacheLocation::default(),
            locale: NumberLocale::US,
            format: None,
            csv: None,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head_row_number(mut self, rows: usize) -> Self {
        self.head_row_number = rows;
        self
    }

    pub fn with_ignore_empty_row(mut self, ignore: bool) -> Self {
        self.ignore_empty_row = ignore;
        self
    }

    pub fn with_auto_trim(mut self, trim: bool) -> Self {
        self.auto_trim = trim;
        self
    }

    pub fn with_auto_strip(mut self, strip: bool) -> Self {
        self.auto_strip = strip;
        self
    }

    pub fn with_1904_windowing(mut self, use_1904: bool) -> Self {
        self.use_1904_windowing = Some(use_1904);
        self
    }

    pub fn with_read_default_return(mut self, mode: ReadDefaultReturn) -> Self {
        self.read_default_return = mode;
        self
    }

    pub fn with_extra_read(mut self, extras: ExtraType) -> Self {
        self.extra_read = extras;
        self
    }

    pub fn with_cache(mut self, cache: CacheLocation) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_format(mut self, format: WorkbookFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_csv(mut self, csv: CsvConfig) -> Self {
        self.csv = Some(csv);
        self
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_saphyr::from_str(text)
            .map_err(|e| Error::Configuration(format!("Invalid read options: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::Other(format!("Failed to serialize read options to YAML: {}", e)))
    }
}

/// Options of a write session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Emit header rows before data
    pub need_head: bool,
    /// Blank rows left above the header (or first data row)
    pub relative_head_row_index: u32,
    /// Merge equal adjacent header labels
    pub automatic_merge_head: bool,
    pub include_column_indexes: Vec<u32>,
    pub include_column_names: Vec<String>,
    pub exclude_column_indexes: Vec<u32>,
    pub exclude_column_names: Vec<String>,
    pub order_by_include_column: bool,
    /// Keep the output file when a write fails
    pub write_partial_on_exception: bool,
    pub use_1904_windowing: bool,
    pub locale: NumberLocale,
    /// Container written on finish; `None` means the backend's own format,
    /// or the destination's extension when writing to a path
    pub output_format: Option<WorkbookFormat>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            need_head: true,
            relative_head_row_index: 0,
            automatic_merge_head: true,
            include_column_indexes: Vec::new(),
            include_column_names: Vec::new(),
            exclude_column_indexes: Vec::new(),
            exclude_column_names: Vec::new(),
            order_by_include_column: false,
            write_partial_on_exception: false,
            use_1904_windowing: false,
            locale: NumberLocale::US,
            output_format: None,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_need_head(mut self, need_head: bool) -> Self {
        self.need_head = need_head;
        self
    }

    pub fn with_relative_head_row_index(mut self, rows: u32) -> Self {
        self.relative_head_row_index = rows;
        self
    }

    pub fn with_automatic_merge_head(mut self, merge: bool) -> Self {
        self.automatic_merge_head = merge;
        self
    }

    pub fn with_include_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_column_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_column_indexes(mut self, indexes: Vec<u32>) -> Self {
        self.include_column_indexes = indexes;
        self
    }

    pub fn with_exclude_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_column_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_column_indexes(mut self, indexes: Vec<u32>) -> Self {
        self.exclude_column_indexes = indexes;
        self
    }

    pub fn with_order_by_include_column(mut self, order: bool) -> Self {
        self.order_by_include_column = order;
        self
    }

    pub fn with_write_partial_on_exception(mut self, keep: bool) -> Self {
        self.write_partial_on_exception = keep;
        self
    }

    pub fn with_1904_windowing(mut self, use_1904: bool) -> Self {
        self.use_1904_windowing = use_1904;
        self
    }

    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_output_format(mut self, format: WorkbookFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Column filter described by these options.
    pub fn column_filter(&self) -> ColumnFilter {
        ColumnFilter {
            include_indexes: self.include_column_indexes.clone(),
            include_names: self.include_column_names.clone(),
            exclude_indexes: self.exclude_column_indexes.clone(),
            exclude_names: self.exclude_column_names.clone(),
            order_by_include_column: self.order_by_include_column,
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_saphyr::from_str(text)
            .map_err(|e| Error::Configuration(format!("Invalid write options: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::Other(format!("Failed to serialize write options to YAML: {}", e)))
    }
}
