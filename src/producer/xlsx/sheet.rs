//! Streaming worksheet reader.
//!
//! Turns `<sheetData>` into cell and row-boundary tokens one XML event at a
//! time, then reports merged regions and hyperlinks found after the data.

use std::collections::{HashMap, VecDeque};
use std::io::BufRead;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, trace};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::workbook::StyleTable;
use super::xml::{attr, is_true, push_entity, push_text, reader};
use crate::common::date::datetime_to_serial;
use crate::common::numfmt::DEFAULT_DATE_PATTERN;
use crate::common::reference::{parse_cell_reference, parse_column};
use crate::common::{CellRange, Error, Result};
use crate::model::{CellData, CellExtra, DataFormat, ExtraType};
use crate::producer::Token;

/// Lookup tables shared by every sheet of a workbook.
pub(crate) struct SheetContext<'a> {
    pub shared_strings: &'a [String],
    pub styles: &'a StyleTable,
    pub date1904: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Value,
    Formula,
    Inline,
}

#[derive(Debug, Default)]
struct PendingCell {
    row: u32,
    col: u32,
    kind: Option<String>,
    style: Option<usize>,
    value: String,
    formula: String,
    inline: String,
}

pub(crate) struct SheetReader {
    reader: Reader<Box<dyn BufRead>>,
    buf: Vec<u8>,
    extras: ExtraType,
    /// Hyperlink relationship id -> target
    links: HashMap<String, String>,
    pending: VecDeque<Token>,
    row: Option<u32>,
    next_row: u32,
    next_col: u32,
    cell: Option<PendingCell>,
    target: Option<TextTarget>,
    in_phonetic: bool,
    finished: bool,
}

impl SheetReader {
    pub fn new(input: Box<dyn BufRead>, extras: ExtraType, links: HashMap<String, String>) -> Self {
        Self {
            reader: reader(input),
            buf: Vec::with_capacity(1024),
            extras,
            links,
            pending: VecDeque::new(),
            row: None,
            next_row: 0,
            next_col: 0,
            cell: None,
            target: None,
            in_phonetic: false,
            finished: false,
        }
    }

    /// Queue tokens delivered after the remaining body tokens.
    pub fn queue(&mut self, tokens: Vec<Token>) {
        self.pending.extend(tokens);
    }

    /// Next token of the sheet body; `None` once the part is exhausted.
    pub fn next(&mut self, ctx: &SheetContext<'_>) -> Result<Option<Token>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            if self.finished {
                return Ok(None);
            }
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let e = e.into_owned();
                    self.on_start(&e, false, ctx)?;
                },
                Event::Empty(e) => {
                    let e = e.into_owned();
                    self.on_start(&e, true, ctx)?;
                },
                Event::End(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    self.on_end(&name, ctx)?;
                },
                Event::Text(t) => {
                    if let Some(text) = text_slot(&mut self.cell, self.target) {
                        push_text(text, &t);
                    }
                },
                Event::CData(t) => {
                    if let Some(text) = text_slot(&mut self.cell, self.target) {
                        text.push_str(&String::from_utf8_lossy(&t));
                    }
                },
                Event::GeneralRef(r) => {
                    if let Some(text) = text_slot(&mut self.cell, self.target) {
                        push_entity(text, &r);
                    }
                },
                Event::Eof => {
                    if let Some(row) = self.row.take() {
                        self.pending.push_back(Token::RowEnd(row));
                    }
                    self.finished = true;
                },
                _ => {},
            }
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>, empty: bool, ctx: &SheetContext<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"row" => {
                let row = match attr(e, b"r")? {
                    Some(r) => r
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .and_then(|r| r.checked_sub(1))
                        .ok_or_else(|| Error::InvalidReference(r.clone()))?,
                    None => self.next_row,
                };
                self.next_col = 0;
                if empty {
                    self.end_row(row);
                } else {
                    self.row = Some(row);
                }
            },
            b"c" => {
                let (row, col) = match attr(e, b"r")? {
                    Some(reference) => match self.row {
                        Some(row) => (row, parse_column(&reference)?),
                        None => parse_cell_reference(&reference)?,
                    },
                    None => (self.row.unwrap_or(self.next_row), self.next_col),
                };
                let style = attr(e, b"s")?.and_then(|s| s.trim().parse::<usize>().ok());
                let cell = PendingCell {
                    row,
                    col,
                    kind: attr(e, b"t")?,
                    style,
                    ..PendingCell::default()
                };
                if empty {
                    self.finish_cell(cell, ctx)?;
                } else {
                    self.cell = Some(cell);
                }
            },
            b"v" if !empty => self.target = Some(TextTarget::Value),
            b"f" if !empty => self.target = Some(TextTarget::Formula),
            b"t" if !empty && !self.in_phonetic && self.cell.is_some() => {
                self.target = Some(TextTarget::Inline)
            },
            b"rPh" if !empty => self.in_phonetic = true,
            b"mergeCell" if self.extras.contains(ExtraType::MERGE) => {
                if let Some(reference) = attr(e, b"ref")? {
                    let range = CellRange::parse(&reference)?;
                    trace!("merge region {}", range);
                    self.pending.push_back(Token::Extra(CellExtra::merge(range)));
                }
            },
            b"hyperlink" if self.extras.contains(ExtraType::HYPERLINK) => {
                let Some(reference) = attr(e, b"ref")? else {
                    return Ok(());
                };
                let range = CellRange::parse(&reference)?;
                let target = match attr(e, b"id")? {
                    Some(id) => self.links.get(&id).cloned(),
                    None => None,
                };
                match target.or(attr(e, b"location")?) {
                    Some(target) => self
                        .pending
                        .push_back(Token::Extra(CellExtra::hyperlink(range, target))),
                    None => debug!("hyperlink at {} has no target", reference),
                }
            },
            _ => {},
        }
        Ok(())
    }

    fn on_end(&mut self, name: &[u8], ctx: &SheetContext<'_>) -> Result<()> {
        match name {
            b"row" => {
                if let Some(row) = self.row.take() {
                    self.end_row(row);
                }
            },
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    self.finish_cell(cell, ctx)?;
                }
                self.target = None;
            },
            b"v" | b"f" | b"t" => self.target = None,
            b"rPh" => self.in_phonetic = false,
            _ => {},
        }
        Ok(())
    }

    fn end_row(&mut self, row: u32) {
        self.pending.push_back(Token::RowEnd(row));
        self.next_row = row + 1;
    }

    fn finish_cell(&mut self, cell: PendingCell, ctx: &SheetContext<'_>) -> Result<()> {
        self.next_col = cell.col + 1;
        let (row, col) = (cell.row, cell.col);
        let data = decode_cell(cell, ctx)?.at(row, col);
        self.pending.push_back(Token::Cell(data));
        Ok(())
    }
}

fn text_slot(cell: &mut Option<PendingCell>, target: Option<TextTarget>) -> Option<&mut String> {
    let cell = cell.as_mut()?;
    Some(match target? {
        TextTarget::Value => &mut cell.value,
        TextTarget::Formula => &mut cell.formula,
        TextTarget::Inline => &mut cell.inline,
    })
}

fn decode_cell(cell: PendingCell, ctx: &SheetContext<'_>) -> Result<CellData> {
    let format = cell.style.and_then(|s| ctx.styles.format(s)).cloned();
    let kind = cell.kind.as_deref().unwrap_or("n");
    let value = cell.value.trim();

    let mut data = match kind {
        "inlineStr" if !cell.inline.is_empty() => CellData::string(cell.inline),
        _ if value.is_empty() => CellData::empty(),
        "s" => {
            let index: usize = value
                .parse()
                .map_err(|_| Error::Corrupted(format!("bad shared string index {value:?}")))?;
            let text = ctx.shared_strings.get(index).ok_or_else(|| {
                Error::Corrupted(format!("shared string {index} out of range"))
            })?;
            CellData::string(text.clone())
        },
        // Formula string results keep their whitespace
        "str" => CellData::string(cell.value),
        "inlineStr" => CellData::string(cell.value),
        "b" => CellData::boolean(is_true(value)),
        "e" => CellData::error(value),
        "d" => match parse_iso_datetime(value) {
            Some(dt) => CellData::number(datetime_to_serial(&dt, ctx.date1904)).with_format(
                format
                    .clone()
                    .unwrap_or_else(|| DataFormat::from_pattern(DEFAULT_DATE_PATTERN)),
            ),
            None => CellData::string(value),
        },
        _ => match fast_float2::parse::<f64, _>(value.as_bytes()) {
            Ok(number) => CellData::number(number),
            Err(_) => {
                debug!("non-numeric value {:?} in a numeric cell", value);
                CellData::string(value)
            },
        },
    };
    if let Some(format) = format {
        data = data.with_format(format);
    }
    if !cell.formula.is_empty() {
        data = data.with_formula(cell.formula);
    }
    Ok(data)
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| {
            // Time-only values sit on serial day 0
            NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .ok()
                .and_then(|t| NaiveDate::from_ymd_opt(1899, 12, 31).map(|d| d.and_time(t)))
        })
}

/// Comments part: one COMMENT extra per `<comment>`, text runs concatenated.
pub(crate) fn parse_comments<R: BufRead>(input: R) -> Result<Vec<CellExtra>> {
    let mut reader = reader(input);
    let mut buf = Vec::new();
    let mut comments = Vec::new();
    let mut current: Option<((u32, u32), String)> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"comment" => {
                    if let Some(reference) = attr(e, b"ref")? {
                        current = Some((parse_cell_reference(&reference)?, String::new()));
                    }
                },
                b"t" => in_text = current.is_some() && !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {},
            },
            Event::Text(ref t) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    push_text(text, t);
                }
            },
            Event::GeneralRef(ref r) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    push_entity(text, r);
                }
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"comment" => {
                    if let Some(((row, col), text)) = current.take() {
                        comments.push(CellExtra::comment(row, col, text));
                    }
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
    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, ExtraKind};
    use std::io::Cursor;

    fn tokens(xml: &str, extras: ExtraType, strings: &[String], styles: &StyleTable) -> Vec<Token> {
        let input: Box<dyn BufRead> = Box::new(Cursor::new(xml.as_bytes().to_vec()));
        let mut links = HashMap::new();
        links.insert("rId1".to_string(), "https://example.com".to_string());
        let mut reader = SheetReader::new(input, extras, links);
        let ctx = SheetContext {
            shared_strings: strings,
            styles,
            date1904: false,
        };
        let mut out = Vec::new();
        while let Some(token) = reader.next(&ctx).unwrap() {
            out.push(token);
        }
        out
    }

    fn cells(tokens: &[Token]) -> Vec<CellData> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Cell(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_cell_types() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1"><v>2.5</v></c><c r="C1" t="b"><v>1</v></c></row>
            <row r="2"><c r="A2" t="inlineStr"><is><t>in &amp; line</t></is></c><c r="B2" t="e"><v>#DIV/0!</v></c>
              <c r="C2" t="str"><f>A1&amp;"x"</f><v>bx</v></c><c r="D2" s="1"/></row>
            </sheetData></worksheet>"#;
        let strings = vec!["a".to_string(), "b".to_string()];
        let tokens = tokens(xml, ExtraType::empty(), &strings, &StyleTable::default());
        let cells = cells(&tokens);
        assert_eq!(cells[0].value, CellValue::String("b".into()));
        assert_eq!(cells[1].value, CellValue::Number(2.5));
        assert_eq!(cells[2].value, CellValue::Boolean(true));
        assert_eq!(cells[3].value, CellValue::String("in & line".into()));
        assert_eq!((cells[3].row_index, cells[3].column_index), (1, 0));
        assert_eq!(cells[4].value, CellValue::Error("#DIV/0!".into()));
        assert_eq!(cells[5].value, CellValue::String("bx".into()));
        assert_eq!(cells[5].formula.as_deref(), Some("A1&\"x\""));
        assert!(cells[6].is_empty());
        assert_eq!(cells[6].column_index, 3);
        assert!(matches!(tokens.last(), Some(Token::RowEnd(1))));
    }

    #[test]
    fn test_empty_rows_and_implicit_positions() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c><v>1</v></c><c><v>2</v></c></row>
            <row r="3"/>
            <row><c r="C4"><v>4</v></c></row>
            </sheetData></worksheet>"#;
        let tokens = tokens(xml, ExtraType::empty(), &[], &StyleTable::default());
        let ends: Vec<u32> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::RowEnd(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec![0, 2, 3]);
        let cells = cells(&tokens);
        assert_eq!(cells[1].column_index, 1);
        assert_eq!((cells[2].row_index, cells[2].column_index), (3, 2));
    }

    #[test]
    fn test_extras_follow_flags() {
        let xml = r#"<worksheet xmlns:r="r"><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>
            <mergeCells count="1"><mergeCell ref="A1:B2"/></mergeCells>
            <hyperlinks><hyperlink ref="A1" r:id="rId1"/><hyperlink ref="B1" location="Sheet2!A1"/></hyperlinks>
            </worksheet>"#;
        let none = tokens(xml, ExtraType::empty(), &[], &StyleTable::default());
        assert!(!none.iter().any(|t| matches!(t, Token::Extra(_))));

        let all = tokens(
            xml,
            ExtraType::MERGE | ExtraType::HYPERLINK,
            &[],
            &StyleTable::default(),
        );
        let extras: Vec<&CellExtra> = all
            .iter()
            .filter_map(|t| match t {
                Token::Extra(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(extras.len(), 3);
        assert_eq!(extras[0].kind, ExtraKind::Merge);
        assert_eq!(extras[0].range, CellRange::new(0, 1, 0, 1));
        assert_eq!(extras[1].text.as_deref(), Some("https://example.com"));
        assert_eq!(extras[2].text.as_deref(), Some("Sheet2!A1"));
    }

    #[test]
    fn test_iso_date_cell() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="d"><v>2023-03-15T12:00:00</v></c></row></sheetData></worksheet>"#;
        let cells = cells(&tokens(xml, ExtraType::empty(), &[], &StyleTable::default()));
        assert_eq!(cells[0].value, CellValue::Number(45000.5));
        assert!(cells[0].is_date());
    }

    #[test]
    fn test_bad_shared_string_index() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>9</v></c></row></sheetData></worksheet>"#;
        let input: Box<dyn BufRead> = Box::new(Cursor::new(xml.as_bytes().to_vec()));
        let mut reader = SheetReader::new(input, ExtraType::empty(), HashMap::new());
        let styles = StyleTable::default();
        let ctx = SheetContext {
            shared_strings: &[],
            styles: &styles,
            date1904: false,
        };
        let result = (0..4).try_for_each(|_| reader.next(&ctx).map(|_| ()));
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_parse_comments() {
        let xml = r#"<comments><authors><author>me</author></authors><commentList>
            <comment ref="B2" authorId="0"><text><r><t>Note: </t></r><r><t>check</t></r></text></comment>
            </commentList></comments>"#;
        let comments = parse_comments(xml.as_bytes()).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].kind, ExtraKind::Comment);
        assert_eq!((comments[0].first_row(), comments[0].first_column()), (1, 1));
        assert_eq!(comments[0].text.as_deref(), Some("Note: check"));
    }
}
