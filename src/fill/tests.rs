use std::collections::BTreeMap;

use super::*;
use crate::common::{CellRange, Error};
use crate::converter::NativeValue;
use crate::holder::WriteOptions;
use crate::model::{CellData, CellStyle, CellValue};
use crate::write::{ExcelWriter, MemoryWorkbook, WriteBackend, WriteSheet};

/// One sheet whose rows hold the given texts; empty strings leave gaps.
fn template(rows: &[&[&str]]) -> MemoryWorkbook {
    let mut workbook = MemoryWorkbook::new();
    let sheet = workbook.create_sheet("Template").unwrap();
    for (r, row) in rows.iter().enumerate() {
        workbook.create_row(sheet, r as u32).unwrap();
        for (c, text) in row.iter().enumerate() {
            if !text.is_empty() {
                workbook
                    .set_cell_value(sheet, r as u32, c as u32, CellData::string(*text))
                    .unwrap();
            }
        }
    }
    workbook
}

fn writer(workbook: MemoryWorkbook) -> ExcelWriter {
    ExcelWriter::with_template(workbook, WriteOptions::default()).unwrap()
}

fn text(writer: ExcelWriter) -> String {
    let mut out = Vec::new();
    writer.finish_into(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn items(values: &[&str]) -> Vec<NativeValue> {
    values.iter().map(|v| NativeValue::from(*v)).collect()
}

#[test]
fn test_force_new_row_shifts_following_rows() {
    let mut writer = writer(template(&[&["Items"], &["{list.}"], &["below"], &["{name}"]]));
    let sheet = WriteSheet::index(0);
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("list", items(&["a", "b", "c"]))),
            FillConfig::default().with_force_new_row(true),
            &sheet,
        )
        .unwrap();
    writer
        .fill(FillData::map([("name", "Bob")]), FillConfig::default(), &sheet)
        .unwrap();
    assert_eq!(writer.sheet_holder(0).and_then(|h| h.last_row_index()), Some(5));
    assert_eq!(text(writer), "Items\na\nb\nc\nbelow\nBob\n");
}

#[test]
fn test_without_force_new_row_template_rows_are_consumed() {
    let mut writer = writer(template(&[&["{name}"], &["{list.}"], &["spare"], &["spare"]]));
    let sheet = WriteSheet::index(0);
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("list", items(&["a", "b"]))),
            FillConfig::default(),
            &sheet,
        )
        .unwrap();
    assert_eq!(writer.backend().last_row(0), Some(3));
    writer
        .fill(FillData::map([("name", "Title")]), FillConfig::default(), &sheet)
        .unwrap();
    assert_eq!(text(writer), "Title\na\nb\nspare\n");
}

#[test]
fn test_repeated_fills_continue_the_list() {
    let mut writer = writer(template(&[&["{.name}", "{.qty}"], &["total"]]));
    let sheet = WriteSheet::index(0);
    let page = |name: &str, qty: i64| {
        FillElement::Fields(BTreeMap::from([
            ("name".to_string(), NativeValue::from(name)),
            ("qty".to_string(), NativeValue::from(qty)),
        ]))
    };
    let config = FillConfig::default().with_force_new_row(true);
    writer
        .fill(FillData::list([page("bolt", 4), page("nut", 10)]), config, &sheet)
        .unwrap();
    writer.fill(FillData::list([page("gear", 1)]), config, &sheet).unwrap();

    let backend = writer.backend();
    assert_eq!(backend.cell(0, 1, 1).map(|c| c.value.clone()), Some(CellValue::Number(10.0)));
    assert_eq!(backend.cell(0, 2, 0).and_then(|c| c.value.as_str()), Some("gear"));
    assert_eq!(text(writer), "bolt,4\nnut,10\ngear,1\ntotal\n");
}

#[test]
fn test_mixed_text_and_escapes() {
    let mut writer = writer(template(&[&["Total: {total} units", r"\{total\} = {total}", "{missing}"]]));
    writer
        .fill(FillData::map([("total", 5)]), FillConfig::default(), &WriteSheet::index(0))
        .unwrap();
    let backend = writer.backend();
    assert_eq!(backend.cell(0, 0, 0).and_then(|c| c.value.as_str()), Some("Total: 5 units"));
    assert_eq!(backend.cell(0, 0, 1).and_then(|c| c.value.as_str()), Some("{total} = 5"));
    assert_eq!(backend.cell(0, 0, 2).and_then(|c| c.value.as_str()), Some("{missing}"));
}

#[test]
fn test_single_placeholder_keeps_native_value() {
    let mut writer = writer(template(&[&["{count}", "{flag}", "n={count}"]]));
    writer
        .fill(
            FillData::map([("count", NativeValue::from(42)), ("flag", NativeValue::from(true))]),
            FillConfig::default(),
            &WriteSheet::index(0),
        )
        .unwrap();
    let backend = writer.backend();
    assert_eq!(backend.cell(0, 0, 0).map(|c| c.value.clone()), Some(CellValue::Number(42.0)));
    assert_eq!(backend.cell(0, 0, 1).map(|c| c.value.clone()), Some(CellValue::Boolean(true)));
    assert_eq!(backend.cell(0, 0, 2).and_then(|c| c.value.as_str()), Some("n=42"));
}

#[test]
fn test_scalars_fill_once() {
    let mut writer = writer(template(&[&["{a}-{b}"]]));
    let sheet = WriteSheet::index(0);
    writer.fill(FillData::map([("a", "x")]), FillConfig::default(), &sheet).unwrap();
    assert_eq!(writer.backend().cell(0, 0, 0).and_then(|c| c.value.as_str()), Some("x-{b}"));
    writer.fill(FillData::map([("b", "y")]), FillConfig::default(), &sheet).unwrap();
    writer.fill(FillData::map([("a", "z")]), FillConfig::default(), &sheet).unwrap();
    assert_eq!(writer.backend().cell(0, 0, 0).and_then(|c| c.value.as_str()), Some("x-y"));
}

#[test]
fn test_wrappers_are_disambiguated_by_prefix() {
    let mut writer = writer(template(&[&["{left.}", "{right.}"]]));
    let sheet = WriteSheet::index(0);
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("right", items(&["r1", "r2"]))),
            FillConfig::default(),
            &sheet,
        )
        .unwrap();
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("left", items(&["l1"]))),
            FillConfig::default(),
            &sheet,
        )
        .unwrap();
    assert_eq!(text(writer), "l1,r1\n,r2\n");
}

#[test]
fn test_horizontal_fill_shifts_columns() {
    let mut writer = writer(template(&[&["{h.}", "end"], &["keep", "keep"]]));
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("h", [1i64, 2, 3].map(NativeValue::from))),
            FillConfig::horizontal().with_force_new_row(true),
            &WriteSheet::index(0),
        )
        .unwrap();
    let backend = writer.backend();
    assert_eq!(backend.cell(0, 0, 2).map(|c| c.value.clone()), Some(CellValue::Number(3.0)));
    assert_eq!(backend.cell(0, 0, 3).and_then(|c| c.value.as_str()), Some("end"));
    assert_eq!(backend.cell(0, 1, 1).and_then(|c| c.value.as_str()), Some("keep"));
}

#[test]
fn test_styles_and_merges_follow_the_list() {
    let mut workbook = template(&[&["{list.}"], &["below"]]);
    let style = CellStyle::new().with_number_format("@");
    workbook.set_cell_style(0, 0, 0, style.clone()).unwrap();
    workbook.add_merged_region(0, CellRange::new(0, 0, 0, 1)).unwrap();
    workbook.add_merged_region(0, CellRange::new(1, 1, 0, 1)).unwrap();

    let mut writer = writer(workbook);
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("list", items(&["a", "b", "c"]))),
            FillConfig::default().with_force_new_row(true),
            &WriteSheet::index(0),
        )
        .unwrap();
    let backend = writer.backend();
    for row in 0..3 {
        assert_eq!(backend.cell_style(0, row, 0), Some(&style));
    }
    let mut merges = backend.merged_regions(0);
    merges.sort();
    assert_eq!(
        merges,
        vec![
            CellRange::new(0, 0, 0, 1),
            CellRange::new(1, 1, 0, 1),
            CellRange::new(2, 2, 0, 1),
            CellRange::new(3, 3, 0, 1),
        ]
    );
    assert_eq!(backend.cell(0, 3, 0).and_then(|c| c.value.as_str()), Some("below"));
}

#[test]
fn test_records_fill_fields() {
    use crate::converter::record::{ExcelRecord, FieldDescriptor, FieldValues, RecordSchema};
    use crate::converter::NativeType;

    struct Line {
        sku: &'static str,
    }

    impl ExcelRecord for Line {
        fn schema() -> RecordSchema {
            RecordSchema::new(vec![FieldDescriptor::new("sku", NativeType::String)])
        }

        fn to_fields(&self) -> Vec<(&'static str, NativeValue)> {
            vec![("sku", self.sku.into())]
        }

        fn from_fields(fields: &mut FieldValues) -> crate::Result<Self> {
            let _: String = fields.take("sku")?;
            Ok(Line { sku: "" })
        }
    }

    let mut writer = writer(template(&[&["SKU {order.sku}"]]));
    let lines = [Line { sku: "A-1" }, Line { sku: "B-2" }];
    writer
        .fill(
            FillData::wrapper(FillWrapper::new("order", lines.iter().map(FillElement::record))),
            FillConfig::default(),
            &WriteSheet::index(0),
        )
        .unwrap();
    assert_eq!(text(writer), "SKU A-1\nSKU B-2\n");
}

#[test]
fn test_fill_without_template_is_rejected() {
    let mut writer = ExcelWriter::new(WriteOptions::default()).unwrap();
    let err = writer
        .fill(FillData::map([("a", "b")]), FillConfig::default(), &WriteSheet::index(0))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_template_loaded_from_csv() {
    let workbook = MemoryWorkbook::from_bytes(b"Report {title}\n{.}\nend\n".to_vec()).unwrap();
    let mut writer = writer(workbook);
    let sheet = WriteSheet::index(0);
    let config = FillConfig::default().with_force_new_row(true);
    writer.fill(FillData::map([("title", "Q3")]), config, &sheet).unwrap();
    writer.fill(FillData::list(items(&["x", "y"])), config, &sheet).unwrap();
    assert_eq!(text(writer), "Report Q3\nx\ny\nend\n");
}

#[test]
fn test_fill_config_yaml() {
    let config: FillConfig =
        serde_saphyr::from_str("direction: Horizontal\nforce_new_row: true\n").unwrap();
    assert_eq!(config, FillConfig::horizontal().with_force_new_row(true));
    let partial: FillConfig = serde_saphyr::from_str("force_new_row: true\n").unwrap();
    assert_eq!(partial.direction, FillDirection::Vertical);
}
