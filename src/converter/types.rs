//! Native value types bridged to and from cells.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::common::numfmt::NumberLocale;

/// Native type a field or value is declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NativeType {
    String,
    Boolean,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    DateTime,
    Date,
}

/// A native value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Null,
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl NativeValue {
    /// Declared type of the value; `None` for null.
    pub fn native_type(&self) -> Option<NativeType> {
        match self {
            NativeValue::Null => None,
            NativeValue::String(_) => Some(NativeType::String),
            NativeValue::Boolean(_) => Some(NativeType::Boolean),
            NativeValue::Integer(_) => Some(NativeType::Integer),
            NativeValue::Float(_) => Some(NativeType::Float),
            NativeValue::DateTime(_) => Some(NativeType::DateTime),
            NativeValue::Date(_) => Some(NativeType::Date),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Lossless widening between compatible native types.
    ///
    /// Integers widen to floats, integral floats narrow to integers, dates
    /// become midnight date-times and midnight date-times become dates.
    pub fn coerce(&self, target: NativeType) -> Option<NativeValue> {
        if self.native_type() == Some(target) {
            return Some(self.clone());
        }
        match (self, target) {
            (NativeValue::Integer(i), NativeType::Float) => Some(NativeValue::Float(*i as f64)),
            (NativeValue::Float(f), NativeType::Integer)
                if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 =>
            {
                Some(NativeValue::Integer(*f as i64))
            },
            (NativeValue::Date(d), NativeType::DateTime) => {
                Some(NativeValue::DateTime(d.and_time(NaiveTime::MIN)))
            },
            (NativeValue::DateTime(dt), NativeType::Date) if dt.num_seconds_from_midnight() == 0 => {
                Some(NativeValue::Date(dt.date()))
            },
            _ => None,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Boolean(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Integer(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Integer(value as i64)
    }
}

impl From<u32> for NativeValue {
    fn from(value: u32) -> Self {
        NativeValue::Integer(value as i64)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Float(value)
    }
}

impl From<NaiveDateTime> for NativeValue {
    fn from(value: NaiveDateTime) -> Self {
        NativeValue::DateTime(value)
    }
}

impl From<NaiveDate> for NativeValue {
    fn from(value: NaiveDate) -> Self {
        NativeValue::Date(value)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(NativeValue::Null, Into::into)
    }
}

/// Session settings a converter may consult, plus the field's format.
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    pub use_1904_windowing: bool,
    pub locale: NumberLocale,
    /// Per-field format pattern
    pub format: Option<&'a str>,
}

impl Default for ConversionContext<'_> {
    fn default() -> Self {
        Self {
            use_1904_windowing: false,
            locale: NumberLocale::US,
            format: None,
        }
    }
}

impl<'a> ConversionContext<'a> {
    pub fn new(use_1904_windowing: bool, locale: NumberLocale) -> Self {
        Self {
            use_1904_windowing,
            locale,
            format: None,
        }
    }

    /// Same settings with a field format pattern.
    pub fn with_format<'b>(&self, format: Option<&'b str>) -> ConversionContext<'b> {
        ConversionContext {
            use_1904_windowing: self.use_1904_windowing,
            locale: self.locale,
            format,
        }
    }
}
