//! Workbook-level parts: sheet list, relationships, shared strings, styles.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;

use super::xml::{attr, is_true, push_entity, push_text, reader};
use crate::common::Result;
use crate::model::DataFormat;

/// A `<sheet>` entry of `workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub rel_id: String,
    pub hidden: bool,
}

/// Parsed `workbook.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPart {
    pub sheets: Vec<SheetEntry>,
    pub date1904: bool,
}

pub fn parse_workbook<R: BufRead>(input: R) -> Result<WorkbookPart> {
    let mut reader = reader(input);
    let mut buf = Vec::new();
    let mut part = WorkbookPart::default();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    part.date1904 = attr(e, b"date1904")?.is_some_and(|v| is_true(&v));
                },
                b"sheet" => {
                    let name = attr(e, b"name")?.unwrap_or_default();
                    let rel_id = attr(e, b"id")?.unwrap_or_default();
                    let hidden = attr(e, b"state")?.is_some_and(|s| s != "visible");
                    part.sheets.push(SheetEntry {
                        name,
                        rel_id,
                        hidden,
                    });
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    Ok(part)
}

/// One `<Relationship>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

pub fn parse_relationships<R: BufRead>(input: R) -> Result<Vec<Relationship>> {
    let mut reader = reader(input);
    let mut buf = Vec::new();
    let mut rels = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                rels.push(Relationship {
                    id: attr(e, b"Id")?.unwrap_or_default(),
                    rel_type: attr(e, b"Type")?.unwrap_or_default(),
                    target: attr(e, b"Target")?.unwrap_or_default(),
                    external: attr(e, b"TargetMode")?.is_some_and(|m| m == "External"),
                });
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    Ok(rels)
}

/// Shared string table: plain and rich text items, phonetic runs dropped.
pub fn parse_shared_strings<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut reader = reader(input);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                },
                b"t" => in_text = in_item && !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {},
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(ref t) if in_text => push_text(&mut current, t),
            Event::CData(ref t) if in_text => current.push_str(&String::from_utf8_lossy(t)),
            Event::GeneralRef(ref r) if in_text => push_entity(&mut current, r),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                },
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    Ok(strings)
}

/// Number format of each cell style (`cellXfs` entry).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTable {
    formats: Vec<Option<DataFormat>>,
}

impl StyleTable {
    /// Format of a style index; `General` styles carry none.
    pub fn format(&self, style: usize) -> Option<&DataFormat> {
        self.formats.get(style).and_then(Option::as_ref)
    }
}

pub fn parse_styles<R: BufRead>(input: R) -> Result<StyleTable> {
    let mut reader = reader(input);
    let mut buf = Vec::new();
    let mut custom: HashMap<u16, String> = HashMap::new();
    let mut xf_formats: Vec<u16> = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(e, b"numFmtId")?.and_then(|v| v.parse::<u16>().ok());
                    if let (Some(id), Some(code)) = (id, attr(e, b"formatCode")?) {
                        custom.insert(id, code);
                    }
                },
                b"xf" if in_cell_xfs => {
                    let id = attr(e, b"numFmtId")?
                        .and_then(|v| v.parse::<u16>().ok())
                        .unwrap_or(0);
                    xf_formats.push(id);
                },
                _ => {},
            },
            Event::End(ref e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    let formats = xf_formats
        .into_iter()
        .map(|id| match custom.get(&id) {
            Some(pattern) => Some(DataFormat::new(id, pattern.clone())),
            None if id == 0 => None,
            None => DataFormat::builtin(id),
        })
        .collect();
    Ok(StyleTable { formats })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workbook() {
        let xml = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
            <workbookPr date1904="1"/>
            <sheets>
              <sheet name="Data" sheetId="1" r:id="rId1"/>
              <sheet name="Hidden &amp; Old" sheetId="2" state="hidden" r:id="rId2"/>
            </sheets></workbook>"#;
        let part = parse_workbook(xml.as_bytes()).unwrap();
        assert!(part.date1904);
        assert_eq!(part.sheets.len(), 2);
        assert_eq!(part.sheets[1].name, "Hidden & Old");
        assert!(part.sheets[1].hidden);
        assert_eq!(part.sheets[0].rel_id, "rId1");
    }

    #[test]
    fn test_parse_shared_strings() {
        let xml = r#"<sst><si><t>plain</t></si>
            <si><r><t>ri</t></r><r><t xml:space="preserve">ch </t></r><rPh><t>x</t></rPh></si>
            <si><t>a &lt; b</t></si><si/></sst>"#;
        let strings = parse_shared_strings(xml.as_bytes()).unwrap();
        assert_eq!(strings, vec!["plain", "rich ", "a < b", ""]);
    }

    #[test]
    fn test_parse_styles() {
        let xml = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
            <cellStyleXfs count="1"><xf numFmtId="0"/></cellStyleXfs>
            <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="14"/></cellXfs>
            </styleSheet>"#;
        let styles = parse_styles(xml.as_bytes()).unwrap();
        assert_eq!(styles.format(0), None);
        assert_eq!(styles.format(1).map(|f| f.pattern.as_str()), Some("yyyy-mm-dd"));
        assert!(styles.format(1).unwrap().is_date());
        assert_eq!(styles.format(2).map(|f| f.index), Some(14));
        assert_eq!(styles.format(9), None);
    }
}
