//! Default converters for every supported (native type, cell type) pair.
//!
//! Dates travel as serial day numbers, booleans map to exactly 1 and 0, and
//! text is parsed and rendered with the session locale and the field format.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::traits::Converter;
use super::types::{ConversionContext, NativeType, NativeValue};
use crate::common::date::{
    datetime_to_serial, format_datetime, parse_datetime, serial_to_datetime,
};
use crate::common::numfmt::{
    DEFAULT_DATE_PATTERN, DEFAULT_LOCAL_DATE_PATTERN, format_number, is_date_pattern, parse_number,
};
use crate::common::{Error, Result};
use crate::model::{CellData, CellDataType, CellValue, DataFormat};

/// Pairs readable out of the box.
pub const DEFAULT_PAIRS: &[(NativeType, CellDataType)] = &[
    (NativeType::String, CellDataType::String),
    (NativeType::String, CellDataType::DirectString),
    (NativeType::String, CellDataType::Number),
    (NativeType::String, CellDataType::Boolean),
    (NativeType::String, CellDataType::Error),
    (NativeType::Boolean, CellDataType::Boolean),
    (NativeType::Boolean, CellDataType::Number),
    (NativeType::Boolean, CellDataType::String),
    (NativeType::Integer, CellDataType::Number),
    (NativeType::Integer, CellDataType::String),
    (NativeType::Integer, CellDataType::Boolean),
    (NativeType::Float, CellDataType::Number),
    (NativeType::Float, CellDataType::String),
    (NativeType::Float, CellDataType::Boolean),
    (NativeType::DateTime, CellDataType::Number),
    (NativeType::DateTime, CellDataType::String),
    (NativeType::Date, CellDataType::Number),
    (NativeType::Date, CellDataType::String),
];

/// Cell type each native type is written as when nothing else is declared.
pub fn default_write_cell_type(native: NativeType) -> CellDataType {
    match native {
        NativeType::String => CellDataType::String,
        NativeType::Boolean => CellDataType::Boolean,
        NativeType::Integer | NativeType::Float | NativeType::DateTime | NativeType::Date => {
            CellDataType::Number
        },
    }
}

/// Table-driven converter for one default pair.
#[derive(Debug, Clone, Copy)]
pub struct DefaultConverter {
    native: NativeType,
    cell: CellDataType,
}

impl DefaultConverter {
    pub const fn new(native: NativeType, cell: CellDataType) -> Self {
        Self { native, cell }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

fn number_to_i64(value: f64) -> Result<i64> {
    if !value.is_finite() || value.abs() >= 9.223_372_036_854_776e18 {
        return Err(Error::conversion(format!("{value} is out of integer range")));
    }
    Ok(value.trunc() as i64)
}

fn number_to_text(cell: &CellData, value: f64, ctx: &ConversionContext<'_>) -> String {
    match ctx.format {
        Some(pattern) if is_date_pattern(pattern) => serial_to_datetime(value, ctx.use_1904_windowing)
            .map(|dt| format_datetime(&dt, pattern))
            .unwrap_or_else(|| format_number(value, None, &ctx.locale)),
        Some(pattern) => format_number(value, Some(pattern), &ctx.locale),
        None => cell
            .display_text(ctx.use_1904_windowing, &ctx.locale)
            .into_owned(),
    }
}

fn serial_to_native(value: f64, ctx: &ConversionContext<'_>) -> Result<NaiveDateTime> {
    serial_to_datetime(value, ctx.use_1904_windowing)
        .ok_or_else(|| Error::conversion(format!("{value} is not a valid date serial")))
}

fn text_to_datetime(text: &str, pattern: &str) -> Result<NaiveDateTime> {
    parse_datetime(text.trim(), pattern)
        .ok_or_else(|| Error::conversion(format!("'{text}' does not match date pattern '{pattern}'")))
}

fn text_to_number(text: &str, ctx: &ConversionContext<'_>) -> Result<f64> {
    parse_number(text, ctx.format, &ctx.locale)
        .ok_or_else(|| Error::conversion(format!("'{text}' is not a number")))
}

fn number_cell(value: f64, ctx: &ConversionContext<'_>) -> CellData {
    let cell = CellData::number(value);
    match ctx.format {
        Some(pattern) => cell.with_format(DataFormat::from_pattern(pattern)),
        None => cell,
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl Converter for DefaultConverter {
    fn native_type(&self) -> NativeType {
        self.native
    }

    fn cell_type(&self) -> CellDataType {
        self.cell
    }

    fn to_native(&self, cell: &CellData, ctx: &ConversionContext<'_>) -> Result<NativeValue> {
        let value = match (self.native, &cell.value) {
            (NativeType::String, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::String(s.clone())
            },
            (NativeType::String, CellValue::Number(n)) => {
                NativeValue::String(number_to_text(cell, *n, ctx))
            },
            (NativeType::String, CellValue::Boolean(b)) => NativeValue::String(b.to_string()),
            (NativeType::String, CellValue::Error(e)) => NativeValue::String(e.clone()),

            (NativeType::Boolean, CellValue::Boolean(b)) => NativeValue::Boolean(*b),
            (NativeType::Boolean, CellValue::Number(n)) => NativeValue::Boolean(*n != 0.0),
            (NativeType::Boolean, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::Boolean(parse_bool(s).ok_or_else(|| {
                    Error::conversion(format!("'{s}' is not a boolean"))
                })?)
            },

            (NativeType::Integer, CellValue::Number(n)) => NativeValue::Integer(number_to_i64(*n)?),
            (NativeType::Integer, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::Integer(number_to_i64(text_to_number(s, ctx)?)?)
            },
            (NativeType::Integer, CellValue::Boolean(b)) => NativeValue::Integer(i64::from(*b)),

            (NativeType::Float, CellValue::Number(n)) => NativeValue::Float(*n),
            (NativeType::Float, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::Float(text_to_number(s, ctx)?)
            },
            (NativeType::Float, CellValue::Boolean(b)) => {
                NativeValue::Float(if *b { 1.0 } else { 0.0 })
            },

            (NativeType::DateTime, CellValue::Number(n)) => {
                NativeValue::DateTime(serial_to_native(*n, ctx)?)
            },
            (NativeType::DateTime, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::DateTime(text_to_datetime(
                    s,
                    ctx.format.unwrap_or(DEFAULT_DATE_PATTERN),
                )?)
            },

            (NativeType::Date, CellValue::Number(n)) => {
                NativeValue::Date(serial_to_native(*n, ctx)?.date())
            },
            (NativeType::Date, CellValue::String(s) | CellValue::DirectString(s)) => {
                NativeValue::Date(
                    text_to_datetime(s, ctx.format.unwrap_or(DEFAULT_LOCAL_DATE_PATTERN))?.date(),
                )
            },

            (native, other) => {
                return Err(Error::conversion(format!(
                    "{:?} cell cannot be read as {:?}",
                    other.data_type(),
                    native
                )));
            },
        };
        Ok(value)
    }

    fn to_cell(&self, value: &NativeValue, ctx: &ConversionContext<'_>) -> Result<CellData> {
        if value.is_null() {
            return Ok(CellData::empty());
        }
        let value = value.coerce(self.native).ok_or_else(|| {
            Error::conversion(format!(
                "{:?} value does not fit a {:?} field",
                value.native_type(),
                self.native
            ))
        })?;

        let cell = match (value, self.cell) {
            (NativeValue::String(s), CellDataType::String) => CellData::string(s),
            (NativeValue::String(s), CellDataType::DirectString) => CellData::direct_string(s),
            (NativeValue::String(s), CellDataType::Error) => CellData::error(s),
            (NativeValue::String(s), CellDataType::Number) => number_cell(text_to_number(&s, ctx)?, ctx),
            (NativeValue::String(s), CellDataType::Boolean) => CellData::boolean(
                parse_bool(&s).ok_or_else(|| Error::conversion(format!("'{s}' is not a boolean")))?,
            ),

            (NativeValue::Boolean(b), CellDataType::Boolean) => CellData::boolean(b),
            (NativeValue::Boolean(b), CellDataType::Number) => {
                CellData::number(if b { 1.0 } else { 0.0 })
            },
            (NativeValue::Boolean(b), CellDataType::String) => CellData::string(b.to_string()),

            (NativeValue::Integer(i), CellDataType::Number) => number_cell(i as f64, ctx),
            (NativeValue::Integer(i), CellDataType::String) => {
                CellData::string(format_number(i as f64, ctx.format, &ctx.locale))
            },
            (NativeValue::Integer(i), CellDataType::Boolean) => CellData::boolean(i != 0),

            (NativeValue::Float(f), CellDataType::Number) => number_cell(f, ctx),
            (NativeValue::Float(f), CellDataType::String) => {
                CellData::string(format_number(f, ctx.format, &ctx.locale))
            },
            (NativeValue::Float(f), CellDataType::Boolean) => CellData::boolean(f != 0.0),

            (NativeValue::DateTime(dt), CellDataType::Number) => {
                let pattern = ctx.format.unwrap_or(DEFAULT_DATE_PATTERN);
                CellData::number(datetime_to_serial(&dt, ctx.use_1904_windowing))
                    .with_format(DataFormat::from_pattern(pattern))
            },
            (NativeValue::DateTime(dt), CellDataType::String) => {
                CellData::string(format_datetime(&dt, ctx.format.unwrap_or(DEFAULT_DATE_PATTERN)))
            },

            (NativeValue::Date(d), CellDataType::Number) => {
                let pattern = ctx.format.unwrap_or(DEFAULT_LOCAL_DATE_PATTERN);
                CellData::number(datetime_to_serial(&midnight(d), ctx.use_1904_windowing))
                    .with_format(DataFormat::from_pattern(pattern))
            },
            (NativeValue::Date(d), CellDataType::String) => CellData::string(format_datetime(
                &midnight(d),
                ctx.format.unwrap_or(DEFAULT_LOCAL_DATE_PATTERN),
            )),

            (other, cell) => {
                return Err(Error::conversion(format!(
                    "{:?} values cannot be written as {:?} cells",
                    other.native_type(),
                    cell
                )));
            },
        };
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::numfmt::NumberLocale;

    fn ctx() -> ConversionContext<'static> {
        ConversionContext::default()
    }

    #[test]
    fn test_boolean_number_bridge() {
        let conv = DefaultConverter::new(NativeType::Boolean, CellDataType::Number);
        let one = conv.to_cell(&NativeValue::Boolean(true), &ctx()).unwrap();
        assert_eq!(one.value, CellValue::Number(1.0));
        let zero = conv.to_cell(&NativeValue::Boolean(false), &ctx()).unwrap();
        assert_eq!(zero.value, CellValue::Number(0.0));
        assert_eq!(
            conv.to_native(&CellData::number(1.0), &ctx()).unwrap(),
            NativeValue::Boolean(true)
        );
        assert_eq!(
            conv.to_native(&CellData::number(0.0), &ctx()).unwrap(),
            NativeValue::Boolean(false)
        );
    }

    #[test]
    fn test_string_to_number_with_locale() {
        let conv = DefaultConverter::new(NativeType::Float, CellDataType::String);
        let german = ConversionContext::new(false, NumberLocale::GERMAN);
        assert_eq!(
            conv.to_native(&CellData::string("1.234,5"), &german).unwrap(),
            NativeValue::Float(1234.5)
        );
        assert!(conv.to_native(&CellData::string("abc"), &ctx()).unwrap_err().is_conversion());
    }

    #[test]
    fn test_number_to_string_uses_field_format() {
        let conv = DefaultConverter::new(NativeType::String, CellDataType::Number);
        let formatted = ctx();
        let formatted = formatted.with_format(Some("0.00"));
        assert_eq!(
            conv.to_native(&CellData::number(2.5), &formatted).unwrap(),
            NativeValue::String("2.50".to_string())
        );
        let date_ctx = ctx();
        let date_ctx = date_ctx.with_format(Some("yyyy/MM/dd"));
        assert_eq!(
            conv.to_native(&CellData::number(45000.0), &date_ctx).unwrap(),
            NativeValue::String("2023/03/15".to_string())
        );
    }

    #[test]
    fn test_date_serial_respects_1904() {
        let conv = DefaultConverter::new(NativeType::Date, CellDataType::Number);
        let date = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        let c1900 = conv.to_cell(&NativeValue::Date(date), &ctx()).unwrap();
        let c1904 = conv
            .to_cell(&NativeValue::Date(date), &ConversionContext::new(true, NumberLocale::US))
            .unwrap();
        assert_eq!(c1900.value, CellValue::Number(45000.0));
        assert_eq!(c1904.value, CellValue::Number(45000.0 - 1462.0));
        assert!(c1900.is_date());
    }

    #[test]
    fn test_mismatched_value_rejected() {
        let conv = DefaultConverter::new(NativeType::Integer, CellDataType::Number);
        let err = conv.to_cell(&NativeValue::from("x"), &ctx()).unwrap_err();
        assert!(err.is_conversion());
        assert_eq!(
            conv.to_cell(&NativeValue::Null, &ctx()).unwrap(),
            CellData::empty()
        );
    }
}
