//! Cell values as they travel between producers, converters and backends.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::common::date::{format_datetime, serial_to_datetime};
use crate::common::numfmt::{self, DEFAULT_DATE_PATTERN, NumberLocale};

/// Index assigned to custom (non built-in) format patterns.
pub const CUSTOM_FORMAT_INDEX: u16 = 164;

/// Physical kind of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellDataType {
    Empty,
    String,
    Number,
    Boolean,
    Error,
    /// Inline text that bypasses the shared-string table on write
    DirectString,
}

/// Raw value held by a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    /// Error literal such as `#DIV/0!`
    Error(String),
    DirectString(String),
}

impl CellValue {
    pub fn data_type(&self) -> CellDataType {
        match self {
            CellValue::Empty => CellDataType::Empty,
            CellValue::String(_) => CellDataType::String,
            CellValue::Number(_) => CellDataType::Number,
            CellValue::Boolean(_) => CellDataType::Boolean,
            CellValue::Error(_) => CellDataType::Error,
            CellValue::DirectString(_) => CellDataType::DirectString,
        }
    }

    /// Borrow the text of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) | CellValue::DirectString(s) | CellValue::Error(s) => Some(s),
            _ => None,
        }
    }
}

/// A numeric format attached to a cell: built-in index plus pattern text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataFormat {
    pub index: u16,
    pub pattern: String,
}

impl DataFormat {
    pub fn new(index: u16, pattern: impl Into<String>) -> Self {
        Self {
            index,
            pattern: pattern.into(),
        }
    }

    /// Build a format from a pattern, reusing the built-in index when one exists.
    pub fn from_pattern(pattern: &str) -> Self {
        let index = numfmt::builtin_index(pattern).unwrap_or(CUSTOM_FORMAT_INDEX);
        Self::new(index, pattern)
    }

    /// Build a format from a built-in index.
    pub fn builtin(index: u16) -> Option<Self> {
        numfmt::builtin_format(index).map(|pattern| Self::new(index, pattern))
    }

    pub fn is_date(&self) -> bool {
        numfmt::is_date_format(self.index, Some(&self.pattern))
    }
}

/// One cell: value, optional format and formula, and its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellData {
    pub value: CellValue,
    pub format: Option<DataFormat>,
    pub formula: Option<String>,
    pub row_index: u32,
    pub column_index: u32,
}

impl CellData {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(CellValue::String(text.into()))
    }

    pub fn direct_string(text: impl Into<String>) -> Self {
        Self::new(CellValue::DirectString(text.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::new(CellValue::Number(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(CellValue::Boolean(value))
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(CellValue::Error(text.into()))
    }

    /// Place the cell at a coordinate.
    pub fn at(mut self, row_index: u32, column_index: u32) -> Self {
        self.row_index = row_index;
        self.column_index = column_index;
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    #[inline]
    pub fn cell_type(&self) -> CellDataType {
        self.value.data_type()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.value, CellValue::Empty)
    }

    /// Whether the cell holds a number formatted as a date.
    pub fn is_date(&self) -> bool {
        matches!(self.value, CellValue::Number(_)) && self.format.as_ref().is_some_and(DataFormat::is_date)
    }

    pub fn format_pattern(&self) -> Option<&str> {
        self.format.as_ref().map(|f| f.pattern.as_str())
    }

    /// Render the cell as display text.
    ///
    /// Dates use the default date pattern, other numbers use the cell's own
    /// numeric pattern.
    pub fn display_text(&self, use_1904_windowing: bool, locale: &NumberLocale) -> Cow<'_, str> {
        match &self.value {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::String(s) | CellValue::DirectString(s) | CellValue::Error(s) => {
                Cow::Borrowed(s.as_str())
            },
            CellValue::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            CellValue::Number(n) => {
                if self.is_date()
                    && let Some(dt) = serial_to_datetime(*n, use_1904_windowing)
                {
                    return Cow::Owned(format_datetime(&dt, DEFAULT_DATE_PATTERN));
                }
                Cow::Owned(numfmt::format_number(*n, self.format_pattern(), locale))
            },
        }
    }

    /// Trim the ends of string content in place; blank strings become empty.
    ///
    /// Inner whitespace is content and is kept. Stripping every space is a
    /// header matching policy, see [`HeaderMatch`](crate::model::HeaderMatch).
    pub fn trim_text(&mut self) {
        if let CellValue::String(s) | CellValue::DirectString(s) = &mut self.value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
            if s.is_empty() {
                self.value = CellValue::Empty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_type() {
        assert_eq!(CellData::empty().cell_type(), CellDataType::Empty);
        assert_eq!(CellData::string("x").cell_type(), CellDataType::String);
        assert_eq!(CellData::number(1.0).cell_type(), CellDataType::Number);
        assert_eq!(CellData::boolean(true).cell_type(), CellDataType::Boolean);
        assert_eq!(CellData::error("#N/A").cell_type(), CellDataType::Error);
    }

    #[test]
    fn test_display_text() {
        let us = NumberLocale::US;
        assert_eq!(CellData::number(3.0).display_text(false, &us), "3");
        let money = CellData::number(1234.5).with_format(DataFormat::from_pattern("#,##0.00"));
        assert_eq!(money.display_text(false, &us), "1,234.50");
        let date = CellData::number(45000.5).with_format(DataFormat::builtin(22).unwrap());
        assert!(date.is_date());
        assert_eq!(date.display_text(false, &us), "2023-03-15 12:00:00");
        assert_eq!(CellData::boolean(false).display_text(false, &us), "false");
    }

    #[test]
    fn test_trim_text() {
        let mut cell = CellData::string("  a b  ");
        cell.trim_text();
        assert_eq!(cell.value, CellValue::String("a b".to_string()));

        let mut blank = CellData::string("   ");
        blank.trim_text();
        assert!(blank.is_empty());

        let mut number = CellData::number(2.0);
        number.trim_text();
        assert_eq!(number.value, CellValue::Number(2.0));
    }

    #[test]
    fn test_from_pattern_reuses_builtin() {
        assert_eq!(DataFormat::from_pattern("0.00").index, 2);
        assert_eq!(DataFormat::from_pattern("yyyy-MM-dd").index, CUSTOM_FORMAT_INDEX);
    }
}
