//! Resolved, immutable per-scope configuration.
//!
//! A child scope is computed once from its parent's resolved value plus the
//! caller's overrides, so later changes to the parent never leak into it.

use std::fmt;
use std::sync::Arc;

use crate::common::numfmt::NumberLocale;
use crate::common::Result;
use crate::converter::{ConversionContext, Converter, ConverterRegistry, RecordSchema};
use crate::model::{ColumnFilter, ExcelHeadProperty, ExtraType, HeaderMatch};

use super::options::{ReadDefaultReturn, ReadOptions, WriteOptions};

/// Explicit head declaration for a sheet or table.
#[derive(Debug, Clone)]
pub enum HeadSource {
    /// Label paths, one per column
    Labels(Vec<Vec<String>>),
    /// Fields of a record schema
    Schema(Arc<RecordSchema>),
}

impl HeadSource {
    /// Single-row labels, one per column.
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HeadSource::Labels(labels.into_iter().map(|l| vec![l.into()]).collect())
    }

    pub fn build(&self) -> ExcelHeadProperty {
        match self {
            HeadSource::Labels(paths) => ExcelHeadProperty::from_labels(paths),
            HeadSource::Schema(schema) => ExcelHeadProperty::from_schema(schema),
        }
    }
}

/// Read settings a sheet may override.
#[derive(Clone, Default)]
pub struct ReadOverrides {
    pub head_row_number: Option<usize>,
    pub ignore_empty_row: Option<bool>,
    pub auto_trim: Option<bool>,
    pub auto_strip: Option<bool>,
    pub use_1904_windowing: Option<bool>,
    pub read_default_return: Option<ReadDefaultReturn>,
    pub extra_read: Option<ExtraType>,
    pub locale: Option<NumberLocale>,
    pub head: Option<HeadSource>,
    pub converters: Vec<Arc<dyn Converter>>,
}

impl fmt::Debug for ReadOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOverrides")
            .field("head_row_number", &self.head_row_number)
            .field("ignore_empty_row", &self.ignore_empty_row)
            .field("auto_trim", &self.auto_trim)
            .field("auto_strip", &self.auto_strip)
            .field("use_1904_windowing", &self.use_1904_windowing)
            .field("read_default_return", &self.read_default_return)
            .field("extra_read", &self.extra_read)
            .field("head", &self.head)
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Write settings a sheet or table may override.
#[derive(Clone, Default)]
pub struct WriteOverrides {
    pub need_head: Option<bool>,
    pub relative_head_row_index: Option<u32>,
    pub automatic_merge_head: Option<bool>,
    pub column_filter: Option<ColumnFilter>,
    pub locale: Option<NumberLocale>,
    pub head: Option<HeadSource>,
    pub converters: Vec<Arc<dyn Converter>>,
}

impl fmt::Debug for WriteOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOverrides")
            .field("need_head", &self.need_head)
            .field("relative_head_row_index", &self.relative_head_row_index)
            .field("automatic_merge_head", &self.automatic_merge_head)
            .field("column_filter", &self.column_filter)
            .field("head", &self.head)
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Snapshot `parent` and layer `converters` on top.
pub(crate) fn derive_registry(
    parent: &ConverterRegistry,
    converters: &[Arc<dyn Converter>],
) -> ConverterRegistry {
    let mut registry = parent.clone();
    for converter in converters {
        registry.register(Arc::clone(converter));
    }
    registry
}

/// Effective read settings of one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadScopeConfig {
    pub head_row_number: usize,
    pub ignore_empty_row: bool,
    pub auto_trim: bool,
    pub auto_strip: bool,
    pub use_1904_windowing: bool,
    pub read_default_return: ReadDefaultReturn,
    pub extra_read: ExtraType,
    pub locale: NumberLocale,
}

impl ReadScopeConfig {
    /// Workbook scope: caller options over the detected date system.
    pub fn workbook(options: &ReadOptions, detected_1904: bool) -> Self {
        Self {
            head_row_number: options.head_row_number,
            ignore_empty_row: options.ignore_empty_row,
            auto_trim: options.auto_trim,
            auto_strip: options.auto_strip,
            use_1904_windowing: options.use_1904_windowing.unwrap_or(detected_1904),
            read_default_return: options.read_default_return,
            extra_read: options.extra_read,
            locale: options.locale,
        }
    }

    pub fn child(&self, overrides: &ReadOverrides) -> Self {
        Self {
            head_row_number: overrides.head_row_number.unwrap_or(self.head_row_number),
            ignore_empty_row: overrides.ignore_empty_row.unwrap_or(self.ignore_empty_row),
            auto_trim: overrides.auto_trim.unwrap_or(self.auto_trim),
            auto_strip: overrides.auto_strip.unwrap_or(self.auto_strip),
            use_1904_windowing: overrides
                .use_1904_windowing
                .unwrap_or(self.use_1904_windowing),
            read_default_return: overrides
                .read_default_return
                .unwrap_or(self.read_default_return),
            extra_read: overrides.extra_read.unwrap_or(self.extra_read),
            locale: overrides.locale.unwrap_or(self.locale),
        }
    }

    pub fn header_match(&self) -> HeaderMatch {
        HeaderMatch::from_flags(self.auto_trim, self.auto_strip)
    }

    pub fn conversion_context(&self) -> ConversionContext<'static> {
        ConversionContext::new(self.use_1904_windowing, self.locale)
    }
}

/// Effective write settings of one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteScopeConfig {
    pub need_head: bool,
    pub relative_head_row_index: u32,
    pub automatic_merge_head: bool,
    pub column_filter: ColumnFilter,
    pub write_partial_on_exception: bool,
    pub use_1904_windowing: bool,
    pub locale: NumberLocale,
}

impl WriteScopeConfig {
    /// Workbook scope; rejects contradictory column filters.
    pub fn workbook(options: &WriteOptions) -> Result<Self> {
        let column_filter = options.column_filter();
        column_filter.validate()?;
        Ok(Self {
            need_head: options.need_head,
            relative_head_row_index: options.relative_head_row_index,
            automatic_merge_head: options.automatic_merge_head,
            column_filter,
            write_partial_on_exception: options.write_partial_on_exception,
            use_1904_windowing: options.use_1904_windowing,
            locale: options.locale,
        })
    }

    pub fn child(&self, overrides: &WriteOverrides) -> Result<Self> {
        let column_filter = overrides
            .column_filter
            .clone()
            .unwrap_or_else(|| self.column_filter.clone());
        column_filter.validate()?;
        Ok(Self {
            need_head: overrides.need_head.unwrap_or(self.need_head),
            relative_head_row_index: overrides
                .relative_head_row_index
                .unwrap_or(self.relative_head_row_index),
            automatic_merge_head: overrides
                .automatic_merge_head
                .unwrap_or(self.automatic_merge_head),
            column_filter,
            write_partial_on_exception: self.write_partial_on_exception,
            use_1904_windowing: self.use_1904_windowing,
            locale: overrides.locale.unwrap_or(self.locale),
        })
    }

    pub fn conversion_context(&self) -> ConversionContext<'static> {
        ConversionContext::new(self.use_1904_windowing, self.locale)
    }
}
