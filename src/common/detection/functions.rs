//! Core format detection functions.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::types::WorkbookFormat;
use crate::common::{Error, Result};

/// OLE2 compound file signature.
pub const OLE2_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Local file header signature of a zip archive.
pub const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const SNIFF_LEN: usize = 8192;

/// Detect the workbook format from the leading bytes of a file.
///
/// Zip archives are accepted as OOXML only when a `xl/` entry name appears in
/// the inspected bytes or the archive is too short to tell; text is accepted
/// when it contains no NUL bytes and decodes as UTF-8 (a truncated trailing
/// character is tolerated).
///
/// # Examples
///
/// ```
/// use sheetflow::common::detection::{WorkbookFormat, detect_format};
///
/// assert_eq!(detect_format(b"a,b\n1,2\n").unwrap(), WorkbookFormat::Csv);
/// assert!(detect_format(b"").is_err());
/// ```
pub fn detect_format(bytes: &[u8]) -> Result<WorkbookFormat> {
    if bytes.is_empty() {
        return Err(Error::FormatDetection("empty input".to_string()));
    }
    if bytes.starts_with(&OLE2_SIGNATURE) {
        return Ok(WorkbookFormat::Xls);
    }
    if bytes.starts_with(&ZIP_SIGNATURE) {
        let window = &bytes[..bytes.len().min(SNIFF_LEN)];
        let has_workbook_part = memchr::memmem::find(window, b"xl/").is_some();
        let looks_other_office = memchr::memmem::find(window, b"word/").is_some()
            || memchr::memmem::find(window, b"ppt/").is_some();
        if has_workbook_part || !looks_other_office {
            return Ok(WorkbookFormat::Xlsx);
        }
        return Err(Error::FormatDetection(
            "zip package is not a spreadsheet".to_string(),
        ));
    }
    if looks_like_text(&bytes[..bytes.len().min(SNIFF_LEN)]) {
        return Ok(WorkbookFormat::Csv);
    }
    Err(Error::FormatDetection(
        "unknown binary signature".to_string(),
    ))
}

/// Detect the workbook format from a seekable reader, restoring its position.
pub fn detect_format_from_reader<R: Read + Seek>(reader: &mut R) -> Result<WorkbookFormat> {
    let start = reader.stream_position()?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    reader.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut buffer)?;
    reader.seek(SeekFrom::Start(start))?;
    detect_format(&buffer)
}

/// Detect the workbook format of a file on disk.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<WorkbookFormat> {
    let mut file = File::open(path)?;
    detect_format_from_reader(&mut file)
}

fn looks_like_text(bytes: &[u8]) -> bool {
    if memchr::memchr(0, bytes).is_some() {
        return false;
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        // A multi-byte character cut by the sniff window is still text
        Err(e) => e.error_len().is_none(),
    }
}
