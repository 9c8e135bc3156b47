//! Round-trip properties of the default converters.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use super::*;
use crate::common::numfmt::{NumberLocale, format_general};
use crate::model::{CellData, CellDataType};

fn round_trip(native: NativeType, cell: CellDataType, value: NativeValue) -> NativeValue {
    let registry = ConverterRegistry::with_defaults();
    let ctx = ConversionContext::default();
    let writer = registry.resolve_for_write(native, Some(cell)).unwrap();
    let written: CellData = writer.to_cell(&value, &ctx).unwrap();
    assert_eq!(written.cell_type(), cell);
    let reader = registry.resolve_for_read(native, written.cell_type()).unwrap();
    reader.to_native(&written, &ctx).unwrap()
}

fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (1900i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60, 0u32..1000).prop_map(
        |(y, mo, d, h, mi, s, ms)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_milli_opt(h, mi, s, ms)
                .unwrap()
        },
    )
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1900i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, mo, d)| NaiveDate::from_ymd_opt(y, mo, d).unwrap())
}

const SAFE_INT: i64 = 1 << 53;

proptest! {
    #[test]
    fn prop_string_cells(s in ".*") {
        for cell in [CellDataType::String, CellDataType::DirectString, CellDataType::Error] {
            prop_assert_eq!(
                round_trip(NativeType::String, cell, NativeValue::String(s.clone())),
                NativeValue::String(s.clone())
            );
        }
    }

    #[test]
    fn prop_numeric_text(f in -1e12f64..1e12f64) {
        let text = format_general(f, &NumberLocale::US);
        prop_assert_eq!(
            round_trip(NativeType::String, CellDataType::Number, NativeValue::String(text.clone())),
            NativeValue::String(text)
        );
    }

    #[test]
    fn prop_boolean(b in any::<bool>()) {
        for cell in [CellDataType::Boolean, CellDataType::Number, CellDataType::String] {
            prop_assert_eq!(
                round_trip(NativeType::Boolean, cell, NativeValue::Boolean(b)),
                NativeValue::Boolean(b)
            );
        }
        let text = b.to_string();
        prop_assert_eq!(
            round_trip(NativeType::String, CellDataType::Boolean, NativeValue::String(text.clone())),
            NativeValue::String(text)
        );
        let bit = i64::from(b);
        prop_assert_eq!(
            round_trip(NativeType::Integer, CellDataType::Boolean, NativeValue::Integer(bit)),
            NativeValue::Integer(bit)
        );
        let float_bit = bit as f64;
        prop_assert_eq!(
            round_trip(NativeType::Float, CellDataType::Boolean, NativeValue::Float(float_bit)),
            NativeValue::Float(float_bit)
        );
    }

    #[test]
    fn prop_integer(i in -SAFE_INT..SAFE_INT) {
        for cell in [CellDataType::Number, CellDataType::String] {
            prop_assert_eq!(
                round_trip(NativeType::Integer, cell, NativeValue::Integer(i)),
                NativeValue::Integer(i)
            );
        }
    }

    #[test]
    fn prop_float(f in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        for cell in [CellDataType::Number, CellDataType::String] {
            prop_assert_eq!(
                round_trip(NativeType::Float, cell, NativeValue::Float(f)),
                NativeValue::Float(f)
            );
        }
    }

    #[test]
    fn prop_datetime_serial(dt in datetime_strategy()) {
        prop_assert_eq!(
            round_trip(NativeType::DateTime, CellDataType::Number, NativeValue::DateTime(dt)),
            NativeValue::DateTime(dt)
        );
    }

    #[test]
    fn prop_datetime_text(dt in datetime_strategy()) {
        let whole_seconds = dt.with_nanosecond(0).unwrap();
        prop_assert_eq!(
            round_trip(NativeType::DateTime, CellDataType::String, NativeValue::DateTime(whole_seconds)),
            NativeValue::DateTime(whole_seconds)
        );
    }

    #[test]
    fn prop_date(d in date_strategy()) {
        for cell in [CellDataType::Number, CellDataType::String] {
            prop_assert_eq!(
                round_trip(NativeType::Date, cell, NativeValue::Date(d)),
                NativeValue::Date(d)
            );
        }
    }
}

use chrono::Timelike;

#[test]
fn test_decimal_one_is_true() {
    let registry = ConverterRegistry::with_defaults();
    let ctx = ConversionContext::default();
    let read = registry
        .resolve_for_read(NativeType::Boolean, CellDataType::Number)
        .unwrap();
    assert_eq!(
        read.to_native(&CellData::number(1.0), &ctx).unwrap(),
        NativeValue::Boolean(true)
    );
    let write = registry
        .resolve_for_write(NativeType::Boolean, Some(CellDataType::Number))
        .unwrap();
    assert_eq!(
        write.to_cell(&NativeValue::Boolean(false), &ctx).unwrap(),
        CellData::number(0.0)
    );
}

#[test]
fn test_write_defaults() {
    let registry = ConverterRegistry::with_defaults();
    for (native, cell) in [
        (NativeType::String, CellDataType::String),
        (NativeType::Boolean, CellDataType::Boolean),
        (NativeType::Integer, CellDataType::Number),
        (NativeType::DateTime, CellDataType::Number),
    ] {
        assert_eq!(
            registry.resolve_for_write(native, None).unwrap().cell_type(),
            cell
        );
    }
}

#[test]
fn test_missing_pair_is_not_found() {
    let registry = ConverterRegistry::with_defaults();
    let err = registry
        .resolve_for_read(NativeType::Date, CellDataType::Boolean)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        crate::Error::ConverterNotFound {
            native: NativeType::Date,
            cell: Some(CellDataType::Boolean)
        }
    ));
    assert!(ConverterRegistry::new()
        .resolve_for_write(NativeType::String, None)
        .is_err());
}

struct UpperCase;

impl Converter for UpperCase {
    fn native_type(&self) -> NativeType {
        NativeType::String
    }

    fn cell_type(&self) -> CellDataType {
        CellDataType::String
    }

    fn to_native(&self, cell: &CellData, _ctx: &ConversionContext<'_>) -> crate::Result<NativeValue> {
        Ok(NativeValue::String(
            cell.value.as_str().unwrap_or_default().to_uppercase(),
        ))
    }
}

#[test]
fn test_later_registration_wins() {
    let mut registry = ConverterRegistry::with_defaults();
    let before = registry.len();
    registry.register(std::sync::Arc::new(UpperCase));
    assert_eq!(registry.len(), before);
    let conv = registry
        .resolve_for_read(NativeType::String, CellDataType::String)
        .unwrap();
    assert_eq!(
        conv.to_native(&CellData::string("abc"), &ConversionContext::default())
            .unwrap(),
        NativeValue::String("ABC".to_string())
    );
    // Inline strings fall back to the String pair only when unregistered
    let direct = registry
        .resolve_for_read(NativeType::String, CellDataType::DirectString)
        .unwrap();
    assert_eq!(direct.cell_type(), CellDataType::DirectString);
    // One-way converters refuse the other direction
    let write = registry.resolve_for_write(NativeType::String, None).unwrap();
    assert!(write
        .to_cell(&NativeValue::from("x"), &ConversionContext::default())
        .is_err());
}
