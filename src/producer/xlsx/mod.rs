//! OOXML workbook producer.
//!
//! Workbook-level parts (sheet list, shared strings, styles) are parsed when
//! the producer is built; worksheet parts are streamed one at a time.

mod parts;
mod sheet;
mod workbook;
mod xml;

pub use parts::{MemoryParts, PartSource, ZipParts};
pub use workbook::{Relationship, SheetEntry, StyleTable, WorkbookPart};

use std::collections::HashMap;

use log::debug;

use self::sheet::{SheetContext, SheetReader, parse_comments};
use self::workbook::{parse_relationships, parse_shared_strings, parse_styles, parse_workbook};
use self::xml::{parent_dir, rels_path, resolve_target};
use super::{RowProducer, SheetInfo, Token};
use crate::common::{Error, Result, WorkbookFormat};
use crate::model::ExtraType;

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_SHARED_STRINGS: &str = "/sharedStrings";
const REL_STYLES: &str = "/styles";
const REL_HYPERLINK: &str = "/hyperlink";
const REL_COMMENTS: &str = "/comments";

struct OpenSheet {
    path: String,
    reader: SheetReader,
    extras: ExtraType,
    rels: Vec<Relationship>,
    body_done: bool,
}

/// Producer over the parts of an OOXML package.
pub struct XlsxProducer<S: PartSource> {
    parts: S,
    sheets: Vec<SheetInfo>,
    sheet_paths: Vec<String>,
    date1904: bool,
    shared_strings: Vec<String>,
    styles: StyleTable,
    current: Option<OpenSheet>,
}

impl<S: PartSource> XlsxProducer<S> {
    pub fn new(mut parts: S) -> Result<Self> {
        let workbook_path = find_workbook_part(&mut parts)?;
        let workbook = match parts.open_part(&workbook_path)? {
            Some(input) => parse_workbook(input)?,
            None => return Err(Error::Corrupted(format!("missing part {workbook_path}"))),
        };
        let base = parent_dir(&workbook_path).to_string();
        let rels = match parts.open_part(&rels_path(&workbook_path))? {
            Some(input) => parse_relationships(input)?,
            None => Vec::new(),
        };
        let by_id: HashMap<&str, &Relationship> = rels.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut sheets = Vec::with_capacity(workbook.sheets.len());
        let mut sheet_paths = Vec::with_capacity(workbook.sheets.len());
        for (index, entry) in workbook.sheets.iter().enumerate() {
            let path = match by_id.get(entry.rel_id.as_str()) {
                Some(rel) => resolve_target(&base, &rel.target),
                // Packages without workbook relationships follow the default layout
                None => format!("{}/worksheets/sheet{}.xml", base, index + 1),
            };
            let mut info = SheetInfo::new(index, entry.name.clone());
            info.hidden = entry.hidden;
            sheets.push(info);
            sheet_paths.push(path);
        }

        let related = |suffix: &str, fallback: &str| {
            rels.iter()
                .find(|r| r.rel_type.ends_with(suffix))
                .map(|r| resolve_target(&base, &r.target))
                .unwrap_or_else(|| format!("{base}/{fallback}"))
        };
        let shared_strings = match parts.open_part(&related(REL_SHARED_STRINGS, "sharedStrings.xml"))? {
            Some(input) => parse_shared_strings(input)?,
            None => Vec::new(),
        };
        let styles = match parts.open_part(&related(REL_STYLES, "styles.xml"))? {
            Some(input) => parse_styles(input)?,
            None => StyleTable::default(),
        };
        debug!(
            "xlsx workbook: {} sheets, {} shared strings, date1904={}",
            sheets.len(),
            shared_strings.len(),
            workbook.date1904
        );

        Ok(Self {
            parts,
            sheets,
            sheet_paths,
            date1904: workbook.date1904,
            shared_strings,
            styles,
            current: None,
        })
    }

    /// Comments of the open sheet, read once its body is exhausted.
    fn comment_tokens(&mut self, open: &OpenSheet) -> Result<Vec<Token>> {
        if !open.extras.contains(ExtraType::COMMENT) {
            return Ok(Vec::new());
        }
        let base = parent_dir(&open.path).to_string();
        let mut tokens = Vec::new();
        for rel in open.rels.iter().filter(|r| r.rel_type.ends_with(REL_COMMENTS)) {
            let path = resolve_target(&base, &rel.target);
            if let Some(input) = self.parts.open_part(&path)? {
                tokens.extend(parse_comments(input)?.into_iter().map(Token::Extra));
            }
        }
        Ok(tokens)
    }
}

fn find_workbook_part<S: PartSource>(parts: &mut S) -> Result<String> {
    let Some(input) = parts.open_part("_rels/.rels")? else {
        return Ok(DEFAULT_WORKBOOK_PART.to_string());
    };
    Ok(parse_relationships(input)?
        .into_iter()
        .find(|r| r.rel_type.ends_with(REL_OFFICE_DOCUMENT))
        .map(|r| resolve_target("", &r.target))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()))
}

impl<S: PartSource> RowProducer for XlsxProducer<S> {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Xlsx
    }

    fn sheets(&self) -> &[SheetInfo] {
        &self.sheets
    }

    fn date1904(&self) -> bool {
        self.date1904
    }

    fn begin_sheet(&mut self, index: usize, extras: ExtraType) -> Result<()> {
        let path = self
            .sheet_paths
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("no sheet at index {index}")))?;
        let rels = match self.parts.open_part(&rels_path(&path))? {
            Some(input) => parse_relationships(input)?,
            None => Vec::new(),
        };
        let links = rels
            .iter()
            .filter(|r| r.rel_type.ends_with(REL_HYPERLINK))
            .map(|r| (r.id.clone(), r.target.clone()))
            .collect();
        let input = self
            .parts
            .open_part(&path)?
            .ok_or_else(|| Error::Corrupted(format!("missing part {path}")))?;
        debug!("xlsx: streaming sheet {} from {}", index, path);
        self.current = Some(OpenSheet {
            path,
            reader: SheetReader::new(input, extras, links),
            extras,
            rels,
            body_done: false,
        });
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token> {
        let Some(mut open) = self.current.take() else {
            return Ok(Token::EndOfStream);
        };
        loop {
            let ctx = SheetContext {
                shared_strings: &self.shared_strings,
                styles: &self.styles,
                date1904: self.date1904,
            };
            match open.reader.next(&ctx)? {
                Some(token) => {
                    self.current = Some(open);
                    return Ok(token);
                },
                None if !open.body_done => {
                    open.body_done = true;
                    let comments = self.comment_tokens(&open)?;
                    open.reader.queue(comments);
                },
                None => return Ok(Token::SheetEnd),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}
