//! Option loading and scope resolution tests.

use super::*;
use crate::cache::CacheLocation;
use crate::common::numfmt::NumberLocale;
use crate::model::ExtraType;

#[test]
fn test_read_defaults() {
    let options = ReadOptions::default();
    assert_eq!(options.head_row_number, 1);
    assert!(options.ignore_empty_row);
    assert!(options.auto_trim);
    assert!(!options.auto_strip);
    assert_eq!(options.read_default_return, ReadDefaultReturn::String);
    assert!(options.extra_read.is_empty());
}

#[test]
fn test_read_options_yaml() {
    let yaml = "head_row_number: 2\nignore_empty_row: false\nread_default_return: ActualData\n";
    let options = ReadOptions::from_yaml(yaml).unwrap();
    assert_eq!(options.head_row_number, 2);
    assert!(!options.ignore_empty_row);
    assert_eq!(options.read_default_return, ReadDefaultReturn::ActualData);
    // Unspecified keys keep their defaults
    assert!(options.auto_trim);
    assert_eq!(options.cache, CacheLocation::default());

    let rendered = options.to_yaml().unwrap();
    assert_eq!(ReadOptions::from_yaml(&rendered).unwrap(), options);
}

#[test]
fn test_invalid_yaml_is_configuration_error() {
    let err = ReadOptions::from_yaml("head_row_number: [1, 2]").unwrap_err();
    assert!(matches!(err, crate::Error::Configuration(_)));
}

#[test]
fn test_write_options_yaml_round_trip() {
    let options = WriteOptions::default()
        .with_need_head(false)
        .with_exclude_column_names(["secret"])
        .with_locale(NumberLocale::GERMAN);
    let rendered = options.to_yaml().unwrap();
    assert_eq!(WriteOptions::from_yaml(&rendered).unwrap(), options);
}

#[test]
fn test_read_scope_child_overrides() {
    let options = ReadOptions::default().with_extra_read(ExtraType::COMMENT);
    let workbook = ReadScopeConfig::workbook(&options, false);
    let child = workbook.child(&ReadOverrides {
        auto_strip: Some(true),
        extra_read: Some(ExtraType::MERGE | ExtraType::HYPERLINK),
        ..Default::default()
    });
    assert!(child.auto_strip);
    assert!(child.extra_read.contains(ExtraType::MERGE));
    assert!(!child.extra_read.contains(ExtraType::COMMENT));
    assert_eq!(child.head_row_number, workbook.head_row_number);
    assert_eq!(child.header_match(), crate::model::HeaderMatch::StripAll);
}
