//! BIFF record framing.
//!
//! A workbook stream is a flat sequence of records, each a 4-byte header
//! (type, payload length) followed by the payload. Payloads longer than the
//! record limit spill into CONTINUE records.

use std::io::{Read, Seek, SeekFrom};

use crate::common::binary::{read_u16_le, read_u32_le};
use crate::common::encoding::{decode_codepage, decode_latin1};
use crate::common::{Error, Result};

pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;
pub const BOUNDSHEET: u16 = 0x0085;
pub const CODEPAGE: u16 = 0x0042;
pub const DATEMODE: u16 = 0x0022;
pub const FORMAT: u16 = 0x041E;
pub const XF: u16 = 0x00E0;
pub const SST: u16 = 0x00FC;
pub const CONTINUE: u16 = 0x003C;
pub const ROW: u16 = 0x0208;
pub const BLANK: u16 = 0x0201;
pub const MULBLANK: u16 = 0x00BE;
pub const NUMBER: u16 = 0x0203;
pub const RK: u16 = 0x027E;
pub const MULRK: u16 = 0x00BD;
pub const LABEL: u16 = 0x0204;
pub const LABELSST: u16 = 0x00FD;
pub const BOOLERR: u16 = 0x0205;
pub const FORMULA: u16 = 0x0006;
pub const STRING: u16 = 0x0207;
pub const NOTE: u16 = 0x001C;
pub const OBJ: u16 = 0x005D;
pub const TXO: u16 = 0x01B6;
pub const HLINK: u16 = 0x01B8;
pub const MERGEDCELLS: u16 = 0x00E5;

/// BOF substream type of the workbook globals.
pub const BOF_GLOBALS: u16 = 0x0005;

/// Record layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiffVersion {
    Biff5,
    Biff8,
}

impl BiffVersion {
    pub fn from_bof(data: &[u8]) -> Result<Self> {
        match read_u16_le(data, 0)? {
            0x0600 => Ok(BiffVersion::Biff8),
            0x0500 => Ok(BiffVersion::Biff5),
            other => Err(Error::Corrupted(format!("unsupported BIFF version {other:#06x}"))),
        }
    }
}

/// One record: type and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: u16,
    pub data: Vec<u8>,
}

/// Record reader over a workbook stream.
pub struct BiffRecordSource<R> {
    reader: R,
    stream_len: u64,
    position: u64,
}

impl<R: Read + Seek> BiffRecordSource<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            stream_len,
            position: 0,
        })
    }

    /// Offset of the next record header.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.stream_len {
            return Err(Error::Corrupted(format!(
                "record offset {position} beyond stream end {}",
                self.stream_len
            )));
        }
        self.reader.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    fn read_header(&mut self) -> Result<Option<(u16, u16)>> {
        if self.position + 4 > self.stream_len {
            return Ok(None);
        }
        let mut header = [0u8; 4];
        self.reader.read_exact(&mut header)?;
        Ok(Some((
            u16::from_le_bytes([header[0], header[1]]),
            u16::from_le_bytes([header[2], header[3]]),
        )))
    }

    /// Next record; `None` at the end of the stream.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some((record_type, len)) = self.read_header()? else {
            return Ok(None);
        };
        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data).map_err(|_| {
            Error::Corrupted(format!(
                "record {record_type:#06x} at {} is truncated",
                self.position
            ))
        })?;
        self.position += 4 + len as u64;
        Ok(Some(Record { record_type, data }))
    }

    /// Payloads of the CONTINUE records directly following the current one.
    pub fn read_continues(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut payloads = Vec::new();
        loop {
            let start = self.position;
            match self.read_header()? {
                Some((CONTINUE, _)) => {
                    self.reader.seek(SeekFrom::Start(start))?;
                    if let Some(record) = self.next_record()? {
                        payloads.push(record.data);
                    }
                },
                _ => {
                    self.reader.seek(SeekFrom::Start(start))?;
                    return Ok(payloads);
                },
            }
        }
    }
}

/// Decode `len` characters stored with a BIFF8 option byte (bit 0 set means
/// 16-bit units). Returns the text and the bytes consumed after the flags.
pub fn decode_chars(data: &[u8], len: usize, high_byte: bool) -> Result<(String, usize)> {
    let width = if high_byte { len * 2 } else { len };
    let bytes = data.get(..width).ok_or_else(|| {
        Error::Corrupted(format!("string needs {width} bytes, {} left", data.len()))
    })?;
    let text = if high_byte {
        crate::common::binary::decode_utf16le(bytes)
    } else {
        decode_latin1(bytes)
    };
    Ok((text, width))
}

/// XLUnicodeString: 16-bit length, option byte, characters. BIFF5 stores a
/// 16-bit length followed by codepage bytes.
pub fn read_unicode_string(data: &[u8], version: BiffVersion, codepage: u16) -> Result<String> {
    let len = read_u16_le(data, 0)? as usize;
    match version {
        BiffVersion::Biff8 => {
            let flags = *data.get(2).ok_or_else(|| truncated("string options"))?;
            let mut offset = 3;
            // Rich-text and phonetic headers precede the characters
            if flags & 0x08 != 0 {
                offset += 2;
            }
            if flags & 0x04 != 0 {
                offset += 4;
            }
            let rest = data.get(offset..).ok_or_else(|| truncated("string header"))?;
            Ok(decode_chars(rest, len, flags & 0x01 != 0)?.0)
        },
        BiffVersion::Biff5 => {
            let bytes = data.get(2..2 + len).ok_or_else(|| truncated("byte string"))?;
            Ok(decode_codepage(bytes, codepage))
        },
    }
}

/// ShortXLUnicodeString: 8-bit length, then option byte (BIFF8 only).
pub fn read_short_string(data: &[u8], version: BiffVersion, codepage: u16) -> Result<String> {
    let len = *data.first().ok_or_else(|| truncated("short string"))? as usize;
    match version {
        BiffVersion::Biff8 => {
            let flags = *data.get(1).ok_or_else(|| truncated("short string options"))?;
            let rest = data.get(2..).ok_or_else(|| truncated("short string"))?;
            Ok(decode_chars(rest, len, flags & 0x01 != 0)?.0)
        },
        BiffVersion::Biff5 => {
            let bytes = data.get(1..1 + len).ok_or_else(|| truncated("short string"))?;
            Ok(decode_codepage(bytes, codepage))
        },
    }
}

fn truncated(what: &str) -> Error {
    Error::Corrupted(format!("truncated {what}"))
}

/// Decode an RK number: 30-bit integer or high 30 bits of a double, with an
/// optional divide-by-100 flag.
pub fn rk_to_f64(rk: u32) -> f64 {
    let value = if rk & 0x02 != 0 {
        ((rk as i32) >> 2) as f64
    } else {
        f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32)
    };
    if rk & 0x01 != 0 { value / 100.0 } else { value }
}

/// Text of a BIFF error code.
pub fn error_text(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        _ => "#ERR!",
    }
}

/// Row, column and XF index shared by every cell record.
pub fn cell_header(data: &[u8]) -> Result<(u32, u32, u16)> {
    Ok((
        read_u16_le(data, 0)? as u32,
        read_u16_le(data, 2)? as u32,
        read_u16_le(data, 4)?,
    ))
}

/// A BOUNDSHEET entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSheet {
    pub offset: u32,
    pub hidden: bool,
    /// 0 = worksheet, 2 = chart, 6 = VB module
    pub sheet_type: u8,
    pub name: String,
}

impl BoundSheet {
    pub fn parse(data: &[u8], version: BiffVersion, codepage: u16) -> Result<Self> {
        let offset = read_u32_le(data, 0)?;
        let state = *data.get(4).ok_or_else(|| truncated("BOUNDSHEET"))?;
        let sheet_type = *data.get(5).ok_or_else(|| truncated("BOUNDSHEET"))?;
        let name = read_short_string(data.get(6..).unwrap_or_default(), version, codepage)?;
        Ok(Self {
            offset,
            hidden: state & 0x03 != 0,
            sheet_type,
            name,
        })
    }
}
