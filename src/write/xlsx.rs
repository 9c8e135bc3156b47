//! SpreadsheetML package output for [`MemoryWorkbook`].
//!
//! Text cells go through a deduplicated shared-string table, direct strings
//! stay inline. Each distinct combination of font, fill, alignment and number
//! format becomes one `cellXfs` entry; merged regions are kept per sheet.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::{Cursor, Write};

use log::debug;
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::backend::{MemorySheet, MemoryWorkbook};
use crate::common::numfmt::builtin_index;
use crate::common::reference::cell_reference;
use crate::common::{Error, Result};
use crate::model::cell::CUSTOM_FORMAT_INDEX;
use crate::model::style::CellFillPatternType;
use crate::model::{CellData, CellFill, CellFont, CellStyle, CellValue, HorizontalAlignment};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const CT_WORKBOOK: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

const RT_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const RT_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const RT_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const RT_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

fn xml_error(err: std::fmt::Error) -> Error {
    Error::Xml(format!("XML write error: {err}"))
}

/// Write `workbook` as an xlsx package into `sink`.
pub(super) fn write_package(workbook: &MemoryWorkbook, sink: &mut dyn Write) -> Result<()> {
    let mut strings = SharedStrings::default();
    let mut styles = StylesBuilder::new();
    let mut sheet_parts = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        sheet_parts.push(sheet_xml(sheet, &mut strings, &mut styles)?);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let sheet_count = sheet_parts.len();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(sheet_count)?.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(package_rels_xml()?.as_bytes())?;
    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(workbook)?.as_bytes())?;
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(sheet_count)?.as_bytes())?;
    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(styles.to_xml()?.as_bytes())?;
    zip.start_file("xl/sharedStrings.xml", options)?;
    zip.write_all(strings.to_xml()?.as_bytes())?;
    for (i, xml) in sheet_parts.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(xml.as_bytes())?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(
        "xlsx package: {} sheets, {} shared strings, {} cell formats, {} bytes",
        sheet_count,
        strings.strings.len(),
        styles.cell_formats.len(),
        bytes.len()
    );
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

fn content_types_xml(sheet_count: usize) -> Result<String> {
    let mut xml = String::with_capacity(1024 + sheet_count * 160);
    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    write!(xml, r#"<Default Extension="rels" ContentType="{CT_RELATIONSHIPS}"/>"#).map_err(xml_error)?;
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    write!(xml, r#"<Override PartName="/xl/workbook.xml" ContentType="{CT_WORKBOOK}"/>"#)
        .map_err(xml_error)?;
    for i in 1..=sheet_count {
        write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="{CT_WORKSHEET}"/>"#
        )
        .map_err(xml_error)?;
    }
    write!(xml, r#"<Override PartName="/xl/styles.xml" ContentType="{CT_STYLES}"/>"#)
        .map_err(xml_error)?;
    write!(
        xml,
        r#"<Override PartName="/xl/sharedStrings.xml" ContentType="{CT_SHARED_STRINGS}"/>"#
    )
    .map_err(xml_error)?;
    xml.push_str("</Types>");
    Ok(xml)
}

fn package_rels_xml() -> Result<String> {
    let mut xml = String::with_capacity(320);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<Relationships xmlns="{NS_PACKAGE_RELATIONSHIPS}"><Relationship Id="rId1" Type="{RT_OFFICE_DOCUMENT}" Target="xl/workbook.xml"/></Relationships>"#
    )
    .map_err(xml_error)?;
    Ok(xml)
}

fn workbook_xml(workbook: &MemoryWorkbook) -> Result<String> {
    let mut xml = String::with_capacity(512 + workbook.sheets.len() * 64);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_RELATIONSHIPS}">"#).map_err(xml_error)?;
    if workbook.date1904 {
        xml.push_str(r#"<workbookPr date1904="1"/>"#);
    }
    xml.push_str("<sheets>");
    for (i, sheet) in workbook.sheets.iter().enumerate() {
        let id = i + 1;
        // Excel refuses sheets without a name
        let name = match sheet.name.trim() {
            "" => Cow::Owned(format!("Sheet{id}")),
            _ => escape(sheet.name.as_str()),
        };
        write!(xml, r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#).map_err(xml_error)?;
    }
    xml.push_str("</sheets></workbook>");
    Ok(xml)
}

/// Sheets take `rId1..=rIdN`; styles and shared strings follow them.
fn workbook_rels_xml(sheet_count: usize) -> Result<String> {
    let mut xml = String::with_capacity(512 + sheet_count * 160);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<Relationships xmlns="{NS_PACKAGE_RELATIONSHIPS}">"#).map_err(xml_error)?;
    for id in 1..=sheet_count {
        write!(
            xml,
            r#"<Relationship Id="rId{id}" Type="{RT_WORKSHEET}" Target="worksheets/sheet{id}.xml"/>"#
        )
        .map_err(xml_error)?;
    }
    write!(
        xml,
        r#"<Relationship Id="rId{}" Type="{RT_STYLES}" Target="styles.xml"/>"#,
        sheet_count + 1
    )
    .map_err(xml_error)?;
    write!(
        xml,
        r#"<Relationship Id="rId{}" Type="{RT_SHARED_STRINGS}" Target="sharedStrings.xml"/>"#,
        sheet_count + 2
    )
    .map_err(xml_error)?;
    xml.push_str("</Relationships>");
    Ok(xml)
}

fn sheet_xml(sheet: &MemorySheet, strings: &mut SharedStrings, styles: &mut StylesBuilder) -> Result<String> {
    // Row -> column -> (value, style); styled positions without a value still
    // get a cell so the formatting survives
    let mut rows: BTreeMap<u32, BTreeMap<u32, (Option<&CellData>, Option<&CellStyle>)>> =
        sheet.rows.iter().map(|row| (*row, BTreeMap::new())).collect();
    for ((row, col), cell) in &sheet.cells {
        rows.entry(*row).or_default().entry(*col).or_default().0 = Some(cell);
    }
    for ((row, col), style) in &sheet.cell_styles {
        rows.entry(*row).or_default().entry(*col).or_default().1 = Some(style);
    }

    let mut xml = String::with_capacity(256 + sheet.cells.len() * 48);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_RELATIONSHIPS}">"#).map_err(xml_error)?;
    xml.push_str("<sheetData>");
    for (row, cells) in &rows {
        if cells.is_empty() {
            write!(xml, r#"<row r="{}"/>"#, row + 1).map_err(xml_error)?;
            continue;
        }
        write!(xml, r#"<row r="{}">"#, row + 1).map_err(xml_error)?;
        for (col, &(cell, style)) in cells {
            let style_index = styles.add_cell_format(style, cell.and_then(|c| c.format_pattern()));
            write_cell(&mut xml, *row, *col, cell, style_index, strings)?;
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !sheet.merged_cells.is_empty() {
        write!(xml, r#"<mergeCells count="{}">"#, sheet.merged_cells.len()).map_err(xml_error)?;
        for range in &sheet.merged_cells {
            write!(
                xml,
                r#"<mergeCell ref="{}:{}"/>"#,
                cell_reference(range.first_row, range.first_col),
                cell_reference(range.last_row, range.last_col)
            )
            .map_err(xml_error)?;
        }
        xml.push_str("</mergeCells>");
    }
    xml.push_str("</worksheet>");
    Ok(xml)
}

fn write_cell(
    xml: &mut String,
    row: u32,
    col: u32,
    cell: Option<&CellData>,
    style_index: usize,
    strings: &mut SharedStrings,
) -> Result<()> {
    let reference = cell_reference(row, col);
    let style_attr = match style_index {
        0 => String::new(),
        index => format!(r#" s="{index}""#),
    };
    let Some(cell) = cell else {
        write!(xml, r#"<c r="{reference}"{style_attr}/>"#).map_err(xml_error)?;
        return Ok(());
    };
    let formula = cell
        .formula
        .as_deref()
        .map(|f| format!("<f>{}</f>", escape(f)))
        .unwrap_or_default();

    let written = match &cell.value {
        CellValue::Empty if formula.is_empty() => {
            write!(xml, r#"<c r="{reference}"{style_attr}/>"#)
        },
        CellValue::Empty => write!(xml, r#"<c r="{reference}"{style_attr}>{formula}</c>"#),
        // Formula results are stored with the formula, not in the table
        CellValue::String(s) if !formula.is_empty() => write!(
            xml,
            r#"<c r="{reference}"{style_attr} t="str">{formula}<v>{}</v></c>"#,
            escape(s.as_str())
        ),
        CellValue::String(s) => write!(
            xml,
            r#"<c r="{reference}"{style_attr} t="s"><v>{}</v></c>"#,
            strings.add(s)
        ),
        CellValue::DirectString(s) => write!(
            xml,
            r#"<c r="{reference}"{style_attr} t="inlineStr"><is><t{}>{}</t></is></c>"#,
            space_attr(s),
            escape(s.as_str())
        ),
        CellValue::Number(n) if n.is_finite() => {
            write!(xml, r#"<c r="{reference}"{style_attr}>{formula}<v>{n}</v></c>"#)
        },
        CellValue::Number(_) => {
            write!(xml, r#"<c r="{reference}"{style_attr} t="e">{formula}<v>#NUM!</v></c>"#)
        },
        CellValue::Boolean(b) => write!(
            xml,
            r#"<c r="{reference}"{style_attr} t="b">{formula}<v>{}</v></c>"#,
            u8::from(*b)
        ),
        CellValue::Error(e) => write!(
            xml,
            r#"<c r="{reference}"{style_attr} t="e">{formula}<v>{}</v></c>"#,
            escape(e.as_str())
        ),
    };
    written.map_err(xml_error)
}

fn space_attr(text: &str) -> &'static str {
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        r#" xml:space="preserve""#
    } else {
        ""
    }
}

/// Shared-string table; each distinct text is stored once.
#[derive(Debug, Default)]
struct SharedStrings {
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
    /// Total references, the `count` attribute
    references: usize,
}

impl SharedStrings {
    fn add(&mut self, text: &str) -> usize {
        self.references += 1;
        if let Some(&index) = self.lookup.get(text) {
            return index;
        }
        let index = self.strings.len();
        self.strings.push(text.to_string());
        self.lookup.insert(text.to_string(), index);
        index
    }

    fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(128 + self.strings.iter().map(|s| s.len() + 16).sum::<usize>());
        xml.push_str(XML_DECLARATION);
        write!(
            xml,
            r#"<sst xmlns="{NS_MAIN}" count="{}" uniqueCount="{}">"#,
            self.references,
            self.strings.len()
        )
        .map_err(xml_error)?;
        for s in &self.strings {
            write!(xml, "<si><t{}>{}</t></si>", space_attr(s), escape(s.as_str())).map_err(xml_error)?;
        }
        xml.push_str("</sst>");
        Ok(xml)
    }
}

/// One `cellXfs` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellFormat {
    font_id: usize,
    fill_id: usize,
    num_fmt_id: u16,
    horizontal: Option<HorizontalAlignment>,
    wrap_text: bool,
}

/// Collects the distinct fonts, fills, number formats and cell formats used
/// by the sheets. Index 0 of each list is the default Excel expects.
#[derive(Debug)]
struct StylesBuilder {
    fonts: Vec<CellFont>,
    fills: Vec<CellFill>,
    /// Custom patterns, numbered from 164
    number_formats: Vec<String>,
    number_format_map: HashMap<String, u16>,
    cell_formats: Vec<CellFormat>,
    cell_format_map: HashMap<CellFormat, usize>,
}

impl StylesBuilder {
    fn new() -> Self {
        let default_format = CellFormat {
            font_id: 0,
            fill_id: 0,
            num_fmt_id: 0,
            horizontal: None,
            wrap_text: false,
        };
        Self {
            fonts: vec![CellFont::default()],
            // Fills 0 and 1 are reserved
            fills: vec![
                CellFill {
                    pattern_type: CellFillPatternType::None,
                    fg_color: None,
                },
                CellFill {
                    pattern_type: CellFillPatternType::Gray125,
                    fg_color: None,
                },
            ],
            number_formats: Vec::new(),
            number_format_map: HashMap::new(),
            cell_formats: vec![default_format],
            cell_format_map: HashMap::from([(default_format, 0)]),
        }
    }

    /// Style index of a cell. The style's own number format wins over the
    /// one carried by the cell value.
    fn add_cell_format(&mut self, style: Option<&CellStyle>, cell_pattern: Option<&str>) -> usize {
        let pattern = style.and_then(|s| s.number_format.as_deref()).or(cell_pattern);
        let format = CellFormat {
            font_id: style
                .and_then(|s| s.font.as_ref())
                .map_or(0, |font| intern(&mut self.fonts, font)),
            fill_id: style
                .and_then(|s| s.fill.as_ref())
                .map_or(0, |fill| intern(&mut self.fills, fill)),
            num_fmt_id: pattern.map_or(0, |p| self.add_number_format(p)),
            horizontal: style.and_then(|s| s.horizontal_alignment),
            wrap_text: style.is_some_and(|s| s.wrap_text),
        };
        if let Some(&index) = self.cell_format_map.get(&format) {
            return index;
        }
        let index = self.cell_formats.len();
        self.cell_formats.push(format);
        self.cell_format_map.insert(format, index);
        index
    }

    fn add_number_format(&mut self, pattern: &str) -> u16 {
        if let Some(index) = builtin_index(pattern) {
            return index;
        }
        if let Some(&index) = self.number_format_map.get(pattern) {
            return index;
        }
        let index = CUSTOM_FORMAT_INDEX + self.number_formats.len() as u16;
        self.number_formats.push(pattern.to_string());
        self.number_format_map.insert(pattern.to_string(), index);
        index
    }

    fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(2048);
        xml.push_str(XML_DECLARATION);
        write!(xml, r#"<styleSheet xmlns="{NS_MAIN}">"#).map_err(xml_error)?;

        if !self.number_formats.is_empty() {
            write!(xml, r#"<numFmts count="{}">"#, self.number_formats.len()).map_err(xml_error)?;
            for (i, pattern) in self.number_formats.iter().enumerate() {
                write!(
                    xml,
                    r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
                    CUSTOM_FORMAT_INDEX as usize + i,
                    escape(pattern.as_str())
                )
                .map_err(xml_error)?;
            }
            xml.push_str("</numFmts>");
        }

        write!(xml, r#"<fonts count="{}">"#, self.fonts.len()).map_err(xml_error)?;
        for font in &self.fonts {
            write_font(&mut xml, font)?;
        }
        xml.push_str("</fonts>");

        write!(xml, r#"<fills count="{}">"#, self.fills.len()).map_err(xml_error)?;
        for fill in &self.fills {
            write_fill(&mut xml, fill)?;
        }
        xml.push_str("</fills>");

        xml.push_str(r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#);
        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);

        write!(xml, r#"<cellXfs count="{}">"#, self.cell_formats.len()).map_err(xml_error)?;
        for format in &self.cell_formats {
            write!(
                xml,
                r#"<xf numFmtId="{}" fontId="{}" fillId="{}" borderId="0" xfId="0""#,
                format.num_fmt_id, format.font_id, format.fill_id
            )
            .map_err(xml_error)?;
            if format.num_fmt_id != 0 {
                xml.push_str(r#" applyNumberFormat="1""#);
            }
            if format.font_id != 0 {
                xml.push_str(r#" applyFont="1""#);
            }
            if format.fill_id != 0 {
                xml.push_str(r#" applyFill="1""#);
            }
            if format.horizontal.is_none() && !format.wrap_text {
                xml.push_str("/>");
                continue;
            }
            xml.push_str(r#" applyAlignment="1"><alignment"#);
            if let Some(horizontal) = format.horizontal {
                let name = match horizontal {
                    HorizontalAlignment::Left => "left",
                    HorizontalAlignment::Center => "center",
                    HorizontalAlignment::Right => "right",
                };
                write!(xml, r#" horizontal="{name}""#).map_err(xml_error)?;
            }
            if format.wrap_text {
                xml.push_str(r#" wrapText="1""#);
            }
            xml.push_str("/></xf>");
        }
        xml.push_str("</cellXfs>");

        xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
        xml.push_str("</styleSheet>");
        Ok(xml)
    }
}

/// Index of `item` in `items`, appending it when new.
fn intern<T: Clone + PartialEq>(items: &mut Vec<T>, item: &T) -> usize {
    match items.iter().position(|existing| existing == item) {
        Some(index) => index,
        None => {
            items.push(item.clone());
            items.len() - 1
        },
    }
}

fn write_font(xml: &mut String, font: &CellFont) -> Result<()> {
    xml.push_str("<font>");
    if font.bold {
        xml.push_str("<b/>");
    }
    if font.italic {
        xml.push_str("<i/>");
    }
    if font.underline {
        xml.push_str("<u/>");
    }
    write!(xml, r#"<sz val="{}"/>"#, font.size.unwrap_or(11.0)).map_err(xml_error)?;
    if let Some(color) = &font.color {
        write!(xml, r#"<color rgb="{}"/>"#, argb(color)).map_err(xml_error)?;
    }
    let name = font.name.as_deref().unwrap_or("Calibri");
    write!(xml, r#"<name val="{}"/>"#, escape(name)).map_err(xml_error)?;
    xml.push_str("</font>");
    Ok(())
}

fn write_fill(xml: &mut String, fill: &CellFill) -> Result<()> {
    let pattern = match fill.pattern_type {
        CellFillPatternType::None => "none",
        CellFillPatternType::Solid => "solid",
        CellFillPatternType::Gray125 => "gray125",
        CellFillPatternType::LightGray => "lightGray",
    };
    let written = match &fill.fg_color {
        Some(color) => write!(
            xml,
            r#"<fill><patternFill patternType="{pattern}"><fgColor rgb="{}"/></patternFill></fill>"#,
            argb(color)
        ),
        None => write!(xml, r#"<fill><patternFill patternType="{pattern}"/></fill>"#),
    };
    written.map_err(xml_error)
}

/// Colors are stored as ARGB; a bare RGB triple gets an opaque alpha.
fn argb(color: &str) -> Cow<'_, str> {
    let color = color.trim_start_matches('#');
    if color.len() == 6 {
        Cow::Owned(format!("FF{}", color.to_ascii_uppercase()))
    } else {
        escape(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CellRange;
    use crate::model::{ExtraKind, ExtraType};
    use crate::producer::xlsx::{XlsxProducer, ZipParts};
    use crate::producer::{RowProducer, Token};
    use crate::write::WriteBackend;

    fn package(workbook: &MemoryWorkbook) -> Vec<u8> {
        let mut out = Vec::new();
        workbook.serialize_as(crate::WorkbookFormat::Xlsx, &mut out).unwrap();
        out
    }

    fn sheet_tokens(bytes: Vec<u8>, sheet: usize) -> Vec<Token> {
        let mut producer = XlsxProducer::new(ZipParts::new(Cursor::new(bytes)).unwrap()).unwrap();
        producer.begin_sheet(sheet, ExtraType::MERGE).unwrap();
        let mut tokens = Vec::new();
        loop {
            match producer.next_token().unwrap() {
                Token::SheetEnd | Token::EndOfStream => break,
                token => tokens.push(token),
            }
        }
        tokens
    }

    fn cell_at(tokens: &[Token], row: u32, col: u32) -> Option<&CellData> {
        tokens.iter().find_map(|t| match t {
            Token::Cell(c) if c.row_index == row && c.column_index == col => Some(c),
            _ => None,
        })
    }

    #[test]
    fn test_values_styles_and_merges_survive_reload() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.create_sheet("Orders & Co").unwrap();
        workbook.set_cell_value(sheet, 0, 0, CellData::string("Title")).unwrap();
        workbook.add_merged_region(sheet, CellRange::new(0, 0, 0, 2)).unwrap();
        workbook
            .set_cell_style(
                sheet,
                0,
                0,
                CellStyle::new()
                    .with_font(CellFont {
                        bold: true,
                        ..Default::default()
                    })
                    .with_fill(CellFill::solid("FFFF00"))
                    .with_alignment(HorizontalAlignment::Center),
            )
            .unwrap();
        workbook.set_cell_value(sheet, 1, 0, CellData::string("a<b")).unwrap();
        workbook.set_cell_value(sheet, 1, 1, CellData::number(45000.0)).unwrap();
        workbook
            .set_cell_style(sheet, 1, 1, CellStyle::new().with_number_format("yyyy-mm-dd"))
            .unwrap();
        workbook.set_cell_value(sheet, 1, 2, CellData::boolean(true)).unwrap();
        workbook.set_cell_value(sheet, 2, 0, CellData::direct_string(" padded ")).unwrap();
        workbook.set_cell_value(sheet, 2, 1, CellData::number(0.25)).unwrap();
        workbook
            .set_cell_style(sheet, 2, 1, CellStyle::new().with_number_format("0.00%"))
            .unwrap();
        workbook.set_cell_value(sheet, 2, 2, CellData::string("Title")).unwrap();

        let bytes = package(&workbook);
        let producer = XlsxProducer::new(ZipParts::new(Cursor::new(bytes.clone())).unwrap()).unwrap();
        assert_eq!(producer.sheets()[0].name, "Orders & Co");

        let tokens = sheet_tokens(bytes, 0);
        assert_eq!(cell_at(&tokens, 0, 0).unwrap().value.as_str(), Some("Title"));
        assert_eq!(cell_at(&tokens, 1, 0).unwrap().value.as_str(), Some("a<b"));
        let date = cell_at(&tokens, 1, 1).unwrap();
        assert_eq!(date.value, CellValue::Number(45000.0));
        assert_eq!(date.format_pattern(), Some("yyyy-mm-dd"));
        assert!(date.is_date());
        assert_eq!(cell_at(&tokens, 1, 2).unwrap().value, CellValue::Boolean(true));
        assert_eq!(cell_at(&tokens, 2, 0).unwrap().value.as_str(), Some(" padded "));
        let percent = cell_at(&tokens, 2, 1).unwrap();
        assert_eq!(percent.format.as_ref().map(|f| f.index), Some(10));
        assert_eq!(cell_at(&tokens, 2, 2).unwrap().value.as_str(), Some("Title"));

        let merges: Vec<CellRange> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Extra(extra) if extra.kind == ExtraKind::Merge => Some(extra.range),
                _ => None,
            })
            .collect();
        assert_eq!(merges, vec![CellRange::new(0, 0, 0, 2)]);
    }

    #[test]
    fn test_styles_part_dedups_formats() {
        let mut workbook = MemoryWorkbook::new();
        let sheet = workbook.create_sheet("S").unwrap();
        let bold = CellStyle::new().with_font(CellFont {
            bold: true,
            ..Default::default()
        });
        for col in 0..3 {
            workbook.set_cell_value(sheet, 0, col, CellData::string("h")).unwrap();
            workbook.set_cell_style(sheet, 0, col, bold.clone()).unwrap();
        }
        // Styled but never given a value
        workbook.set_cell_style(sheet, 4, 4, CellStyle::new().with_fill(CellFill::solid("00FF00"))).unwrap();

        let mut strings = SharedStrings::default();
        let mut styles = StylesBuilder::new();
        let xml = sheet_xml(&workbook.sheets[0], &mut strings, &mut styles).unwrap();
        assert_eq!(strings.strings, vec!["h".to_string()]);
        assert_eq!(strings.references, 3);
        assert_eq!(styles.cell_formats.len(), 3);
        assert_eq!(styles.fonts.len(), 2);
        assert_eq!(styles.fills.len(), 3);
        assert!(xml.contains(r#"<c r="A1" s="1" t="s"><v>0</v></c>"#));
        assert!(xml.contains(r#"<c r="E5" s="2"/>"#));

        let styles_xml = styles.to_xml().unwrap();
        assert!(styles_xml.contains("<b/>"));
        assert!(styles_xml.contains(r#"<fgColor rgb="FF00FF00"/>"#));
    }

    #[test]
    fn test_date1904_and_unnamed_sheets() {
        let mut workbook = MemoryWorkbook::new().with_1904_windowing(true);
        workbook.create_sheet("").unwrap();
        workbook.create_sheet("Second").unwrap();
        workbook.set_cell_value(1, 0, 0, CellData::number(1.5)).unwrap();

        let bytes = package(&workbook);
        let producer = XlsxProducer::new(ZipParts::new(Cursor::new(bytes.clone())).unwrap()).unwrap();
        assert!(producer.date1904());
        let names: Vec<&str> = producer.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Sheet1", "Second"]);
        let tokens = sheet_tokens(bytes, 1);
        assert_eq!(cell_at(&tokens, 0, 0).unwrap().value, CellValue::Number(1.5));
    }

    #[test]
    fn test_non_finite_numbers_become_errors() {
        let mut xml = String::new();
        let mut strings = SharedStrings::default();
        write_cell(&mut xml, 0, 0, Some(&CellData::number(f64::NAN)), 0, &mut strings).unwrap();
        assert_eq!(xml, r#"<c r="A1" t="e"><v>#NUM!</v></c>"#);
    }
}
