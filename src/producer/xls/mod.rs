//! Legacy binary workbook producer.
//!
//! The workbook globals (sheet list, date system, codepage, formats, shared
//! strings) are read when the producer is built. A sheet is decoded only when
//! selected: the reader seeks straight to its BOF record.

mod hlink;
pub mod records;
mod sst;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, trace, warn};

use self::hlink::parse_hlink;
use self::records::*;
use self::sst::SharedStrings;
use super::{RowProducer, SheetInfo, Token};
use crate::cache::CacheLocation;
use crate::common::binary::{read_f64_le, read_u16_le, read_u32_le};
use crate::common::encoding::{DEFAULT_CODEPAGE, decode_codepage};
use crate::common::{CellRange, Error, Result, WorkbookFormat};
use crate::model::{CellData, CellExtra, DataFormat, ExtraType};

/// The workbook stream (`Workbook`, or `Book` for BIFF5) of a compound file,
/// read in place.
pub struct XlsStream<F> {
    stream: cfb::Stream<F>,
    // Streams only hold a weak handle on the container's allocator
    _compound: cfb::CompoundFile<F>,
}

impl<F: Read + Seek> Read for XlsStream<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<F: Read + Seek> Seek for XlsStream<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl<F> XlsStream<F> {
    /// Length of the workbook stream in bytes.
    pub fn len(&self) -> u64 {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.len() == 0
    }
}

/// Locate the workbook stream of a compound file.
pub fn open_xls_stream<F: Read + Seek>(file: F) -> Result<XlsStream<F>> {
    let mut compound = cfb::CompoundFile::open(file)
        .map_err(|e| Error::FormatDetection(format!("not a compound file: {e}")))?;
    let stream = match compound.open_stream("/Workbook") {
        Ok(stream) => stream,
        Err(_) => compound.open_stream("/Book").map_err(|_| {
            Error::FormatDetection("compound file has no workbook stream".to_string())
        })?,
    };
    Ok(XlsStream {
        stream,
        _compound: compound,
    })
}

/// XF index to number format.
#[derive(Debug, Default)]
struct FormatTable {
    custom: HashMap<u16, String>,
    xf_formats: Vec<u16>,
}

impl FormatTable {
    fn get(&self, xf: u16) -> Option<DataFormat> {
        let index = *self.xf_formats.get(xf as usize)?;
        match self.custom.get(&index) {
            Some(pattern) => Some(DataFormat::new(index, pattern.clone())),
            None if index == 0 => None,
            None => DataFormat::builtin(index),
        }
    }
}

/// Formula whose cached text arrives in the following STRING record.
#[derive(Debug)]
struct PendingFormula {
    row: u32,
    col: u32,
    format: Option<DataFormat>,
}

#[derive(Debug)]
struct SheetState {
    extras: ExtraType,
    pending: VecDeque<Token>,
    current_row: Option<u32>,
    /// Rows announced by ROW records and not yet closed
    declared: BTreeSet<u32>,
    formula: Option<PendingFormula>,
    note_object: Option<u16>,
    note_texts: HashMap<u16, String>,
    depth: u32,
    done: bool,
}

impl SheetState {
    fn new(extras: ExtraType) -> Self {
        Self {
            extras,
            pending: VecDeque::new(),
            current_row: None,
            declared: BTreeSet::new(),
            formula: None,
            note_object: None,
            note_texts: HashMap::new(),
            depth: 0,
            done: false,
        }
    }

    fn advance_to(&mut self, row: u32) {
        if self.current_row == Some(row) {
            return;
        }
        if let Some(current) = self.current_row.take() {
            self.pending.push_back(Token::RowEnd(current));
        }
        while let Some(&declared) = self.declared.first() {
            if declared >= row {
                break;
            }
            self.declared.remove(&declared);
            self.pending.push_back(Token::RowEnd(declared));
        }
        self.declared.remove(&row);
        self.current_row = Some(row);
    }

    fn close_rows(&mut self) {
        if let Some(current) = self.current_row.take() {
            self.pending.push_back(Token::RowEnd(current));
        }
        while let Some(row) = self.declared.pop_first() {
            self.pending.push_back(Token::RowEnd(row));
        }
    }

    fn cell(&mut self, row: u32, col: u32, data: CellData) {
        self.advance_to(row);
        self.pending.push_back(Token::Cell(data.at(row, col)));
    }

    fn extra(&mut self, extra: CellExtra) {
        self.close_rows();
        self.pending.push_back(Token::Extra(extra));
    }

    fn flush_formula(&mut self, text: String) {
        if let Some(PendingFormula { row, col, format }) = self.formula.take() {
            let mut data = CellData::string(text);
            if let Some(format) = format {
                data = data.with_format(format);
            }
            self.cell(row, col, data);
        }
    }
}

fn with_format(data: CellData, format: Option<DataFormat>) -> CellData {
    match format {
        Some(format) => data.with_format(format),
        None => data,
    }
}

/// Producer over a BIFF5/BIFF8 workbook stream.
pub struct XlsProducer<R> {
    source: BiffRecordSource<R>,
    version: BiffVersion,
    codepage: u16,
    date1904: bool,
    sheets: Vec<SheetInfo>,
    offsets: Vec<u64>,
    formats: FormatTable,
    strings: SharedStrings,
    sheet: Option<SheetState>,
}

impl<F: Read + Seek> XlsProducer<XlsStream<F>> {
    /// Read the workbook stream of a compound file without copying it out.
    pub fn from_compound_file(file: F, cache: CacheLocation) -> Result<Self> {
        Self::from_stream(open_xls_stream(file)?, cache)
    }
}

impl<R: Read + Seek> XlsProducer<R> {
    /// Read the workbook globals of a raw workbook stream.
    pub fn from_stream(reader: R, cache: CacheLocation) -> Result<Self> {
        let mut source = BiffRecordSource::new(reader)?;
        let bof = match source.next_record()? {
            Some(record) if record.record_type == BOF => record,
            _ => return Err(Error::Corrupted("workbook stream does not start with BOF".to_string())),
        };
        let version = BiffVersion::from_bof(&bof.data)?;
        if read_u16_le(&bof.data, 2)? != BOF_GLOBALS {
            return Err(Error::Corrupted("first substream is not the workbook globals".to_string()));
        }

        let mut producer = Self {
            source,
            version,
            codepage: DEFAULT_CODEPAGE,
            date1904: false,
            sheets: Vec::new(),
            offsets: Vec::new(),
            formats: FormatTable::default(),
            strings: SharedStrings::empty(cache),
            sheet: None,
        };
        producer.read_globals()?;
        debug!(
            "xls workbook: {:?}, {} sheets, {} shared strings, date1904={}",
            producer.version,
            producer.sheets.len(),
            producer.strings.len(),
            producer.date1904
        );
        Ok(producer)
    }

    fn read_globals(&mut self) -> Result<()> {
        while let Some(record) = self.source.next_record()? {
            let data = &record.data;
            match record.record_type {
                EOF => return Ok(()),
                CODEPAGE => self.codepage = read_u16_le(data, 0)?,
                DATEMODE => self.date1904 = read_u16_le(data, 0)? == 1,
                FORMAT => {
                    let index = read_u16_le(data, 0)?;
                    let pattern = match self.version {
                        BiffVersion::Biff8 => {
                            read_unicode_string(&data[2..], self.version, self.codepage)?
                        },
                        BiffVersion::Biff5 => {
                            read_short_string(&data[2..], self.version, self.codepage)?
                        },
                    };
                    self.formats.custom.insert(index, pattern);
                },
                XF => self.formats.xf_formats.push(read_u16_le(data, 2)?),
                BOUNDSHEET => {
                    let sheet = BoundSheet::parse(data, self.version, self.codepage)?;
                    if sheet.sheet_type != 0 {
                        trace!("skipping non-worksheet {:?}", sheet.name);
                        continue;
                    }
                    let mut info = SheetInfo::new(self.sheets.len(), sheet.name);
                    info.hidden = sheet.hidden;
                    self.sheets.push(info);
                    self.offsets.push(sheet.offset as u64);
                },
                SST => {
                    let continues = self.source.read_continues()?;
                    self.strings.load(record.data, continues)?;
                },
                _ => {},
            }
        }
        Err(Error::Corrupted("workbook globals have no EOF".to_string()))
    }

    fn handle_record(&mut self, record: Record) -> Result<()> {
        let Some(state) = self.sheet.as_mut() else {
            return Ok(());
        };
        let data = &record.data;

        if state.depth > 0 {
            match record.record_type {
                BOF => state.depth += 1,
                EOF => state.depth -= 1,
                _ => {},
            }
            return Ok(());
        }

        if state.formula.is_some() {
            match record.record_type {
                STRING => {
                    let text = read_unicode_string(data, self.version, self.codepage)?;
                    state.flush_formula(text);
                    return Ok(());
                },
                // ARRAY, SHRFMLA and TABLE may sit between a formula and its text
                0x0221 | 0x04BC | 0x0236 => return Ok(()),
                _ => {
                    warn!("formula without cached text record");
                    state.flush_formula(String::new());
                },
            }
        }

        match record.record_type {
            BOF => state.depth += 1,
            EOF => {
                state.close_rows();
                state.done = true;
            },
            ROW => {
                state.declared.insert(read_u16_le(data, 0)? as u32);
            },
            BLANK => {
                let (row, col, xf) = cell_header(data)?;
                state.cell(row, col, with_format(CellData::empty(), self.formats.get(xf)));
            },
            MULBLANK => {
                let row = read_u16_le(data, 0)? as u32;
                let first = read_u16_le(data, 2)? as u32;
                let count = data.len().saturating_sub(6) / 2;
                for i in 0..count {
                    let xf = read_u16_le(data, 4 + i * 2)?;
                    let data = with_format(CellData::empty(), self.formats.get(xf));
                    state.cell(row, first + i as u32, data);
                }
            },
            NUMBER => {
                let (row, col, xf) = cell_header(data)?;
                let value = read_f64_le(data, 6)?;
                state.cell(row, col, with_format(CellData::number(value), self.formats.get(xf)));
            },
            RK => {
                let (row, col, xf) = cell_header(data)?;
                let value = rk_to_f64(read_u32_le(data, 6)?);
                state.cell(row, col, with_format(CellData::number(value), self.formats.get(xf)));
            },
            MULRK => {
                let row = read_u16_le(data, 0)? as u32;
                let first = read_u16_le(data, 2)? as u32;
                let count = data.len().saturating_sub(6) / 6;
                for i in 0..count {
                    let offset = 4 + i * 6;
                    let xf = read_u16_le(data, offset)?;
                    let value = rk_to_f64(read_u32_le(data, offset + 2)?);
                    let data = with_format(CellData::number(value), self.formats.get(xf));
                    state.cell(row, first + i as u32, data);
                }
            },
            LABEL => {
                let (row, col, xf) = cell_header(data)?;
                let text = read_unicode_string(&data[6..], self.version, self.codepage)?;
                state.cell(row, col, with_format(CellData::string(text), self.formats.get(xf)));
            },
            LABELSST => {
                let (row, col, xf) = cell_header(data)?;
                let text = self.strings.get(read_u32_le(data, 6)?)?;
                state.cell(row, col, with_format(CellData::string(text), self.formats.get(xf)));
            },
            BOOLERR => {
                let (row, col, xf) = cell_header(data)?;
                let value = *data.get(6).ok_or_else(|| truncated(BOOLERR))?;
                let cell = match data.get(7) {
                    Some(1) => CellData::error(error_text(value)),
                    _ => CellData::boolean(value != 0),
                };
                state.cell(row, col, with_format(cell, self.formats.get(xf)));
            },
            FORMULA => {
                let (row, col, xf) = cell_header(data)?;
                let format = self.formats.get(xf);
                let result = data.get(6..14).ok_or_else(|| truncated(FORMULA))?;
                if result[6] == 0xFF && result[7] == 0xFF {
                    match result[0] {
                        0 => state.formula = Some(PendingFormula { row, col, format }),
                        1 => state.cell(row, col, with_format(CellData::boolean(result[2] != 0), format)),
                        2 => state.cell(row, col, CellData::error(error_text(result[2]))),
                        // Empty string result
                        _ => state.cell(row, col, with_format(CellData::empty(), format)),
                    }
                } else {
                    let value = read_f64_le(data, 6)?;
                    state.cell(row, col, with_format(CellData::number(value), format));
                }
            },
            MERGEDCELLS if state.extras.contains(ExtraType::MERGE) => {
                let count = read_u16_le(data, 0)? as usize;
                for i in 0..count {
                    let offset = 2 + i * 8;
                    let range = CellRange::new(
                        read_u16_le(data, offset)? as u32,
                        read_u16_le(data, offset + 2)? as u32,
                        read_u16_le(data, offset + 4)? as u32,
                        read_u16_le(data, offset + 6)? as u32,
                    );
                    state.extra(CellExtra::merge(range));
                }
            },
            HLINK if state.extras.contains(ExtraType::HYPERLINK) => match parse_hlink(data)? {
                Some((range, target)) => state.extra(CellExtra::hyperlink(range, target)),
                None => debug!("hyperlink record without a target"),
            },
            OBJ if state.extras.contains(ExtraType::COMMENT) => {
                // First sub-record is always ftCmo: type, object id
                let object_type = read_u16_le(data, 4)?;
                state.note_object = (object_type == 0x19).then_some(read_u16_le(data, 6)?);
            },
            TXO if state.extras.contains(ExtraType::COMMENT) => {
                let length = read_u16_le(data, 10)? as usize;
                let continues = self.source.read_continues()?;
                if let Some(id) = state.note_object.take() {
                    state.note_texts.insert(id, txo_text(&continues, length, self.codepage, self.version));
                }
            },
            NOTE if state.extras.contains(ExtraType::COMMENT) => {
                let row = read_u16_le(data, 0)? as u32;
                let col = read_u16_le(data, 2)? as u32;
                let text = match self.version {
                    BiffVersion::Biff8 => state.note_texts.remove(&read_u16_le(data, 6)?),
                    BiffVersion::Biff5 => {
                        let length = read_u16_le(data, 4)? as usize;
                        data.get(6..6 + length).map(|bytes| decode_codepage(bytes, self.codepage))
                    },
                };
                match text {
                    Some(text) => state.extra(CellExtra::comment(row, col, text)),
                    None => debug!("note at ({row}, {col}) has no text object"),
                }
            },
            _ => {},
        }
        Ok(())
    }
}

fn truncated(record_type: u16) -> Error {
    Error::Corrupted(format!("record {record_type:#06x} is truncated"))
}

/// Comment text stored in the CONTINUE records after a TXO. Each text
/// continuation restarts with an option byte.
fn txo_text(continues: &[Vec<u8>], length: usize, codepage: u16, version: BiffVersion) -> String {
    let mut text = String::with_capacity(length);
    let mut remaining = length;
    for payload in continues {
        if remaining == 0 {
            break;
        }
        let Some((&flags, body)) = payload.split_first() else {
            continue;
        };
        let high_byte = version == BiffVersion::Biff8 && flags & 0x01 != 0;
        let width = if high_byte { 2 } else { 1 };
        let take = remaining.min(body.len() / width);
        let bytes = &body[..take * width];
        if high_byte {
            text.push_str(&crate::common::binary::decode_utf16le(bytes));
        } else if version == BiffVersion::Biff8 {
            text.push_str(&crate::common::encoding::decode_latin1(bytes));
        } else {
            text.push_str(&decode_codepage(bytes, codepage));
        }
        remaining -= take;
    }
    text
}

impl<R: Read + Seek> RowProducer for XlsProducer<R> {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Xls
    }

    fn sheets(&self) -> &[SheetInfo] {
        &self.sheets
    }

    fn date1904(&self) -> bool {
        self.date1904
    }

    fn begin_sheet(&mut self, index: usize, extras: ExtraType) -> Result<()> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or_else(|| Error::Configuration(format!("no sheet at index {index}")))?;
        self.source.seek(offset)?;
        match self.source.next_record()? {
            Some(record) if record.record_type == BOF => {},
            _ => return Err(Error::Corrupted(format!("sheet {index} does not start with BOF"))),
        }
        debug!("xls: decoding sheet {} at offset {}", index, offset);
        self.sheet = Some(SheetState::new(extras));
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            let Some(state) = self.sheet.as_mut() else {
                return Ok(Token::EndOfStream);
            };
            if let Some(token) = state.pending.pop_front() {
                return Ok(token);
            }
            if state.done {
                self.sheet = None;
                return Ok(Token::SheetEnd);
            }
            match self.source.next_record()? {
                Some(record) => self.handle_record(record)?,
                None => {
                    warn!("sheet substream ends without EOF");
                    state_finish(&mut self.sheet);
                },
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.sheet = None;
        self.strings.clear();
        Ok(())
    }
}

fn state_finish(sheet: &mut Option<SheetState>) {
    if let Some(state) = sheet.as_mut() {
        state.flush_formula(String::new());
        state.close_rows();
        state.done = true;
    }
}

#[cfg(test)]
mod tests;
