//! HLINK record: the cell range followed by a serialized hyperlink object.

use crate::common::binary::{decode_utf16le, read_u16_le, read_u32_le};
use crate::common::{CellRange, Error, Result};

const HAS_MONIKER: u32 = 0x01;
const HAS_LOCATION: u32 = 0x08;
const HAS_DISPLAY_NAME: u32 = 0x10;
const HAS_FRAME_NAME: u32 = 0x80;
const MONIKER_SAVED_AS_STRING: u32 = 0x100;

const URL_MONIKER: [u8; 16] = [
    0xE0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11, 0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
];
const FILE_MONIKER: [u8; 16] = [
    0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .data
            .get(self.offset..self.offset + len)
            .ok_or_else(|| Error::Corrupted("truncated hyperlink record".to_string()))?;
        self.offset += len;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16> {
        let value = read_u16_le(self.data, self.offset)?;
        self.offset += 2;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32> {
        let value = read_u32_le(self.data, self.offset)?;
        self.offset += 4;
        Ok(value)
    }

    /// Character count (terminator included) then UTF-16 text.
    fn counted_string(&mut self) -> Result<String> {
        let chars = self.u32()? as usize;
        let bytes = self.take(chars * 2)?;
        Ok(trim_nul(decode_utf16le(bytes)))
    }
}

fn trim_nul(mut text: String) -> String {
    while text.ends_with('\0') {
        text.pop();
    }
    text
}

/// Range and target of a hyperlink; `None` when the record names no target.
pub(super) fn parse_hlink(data: &[u8]) -> Result<Option<(CellRange, String)>> {
    let range = CellRange::new(
        read_u16_le(data, 0)? as u32,
        read_u16_le(data, 2)? as u32,
        read_u16_le(data, 4)? as u32,
        read_u16_le(data, 6)? as u32,
    );
    // Skip the class id and stream version
    let mut cursor = Cursor { data, offset: 28 };
    let flags = cursor.u32()?;

    if flags & HAS_DISPLAY_NAME != 0 {
        cursor.counted_string()?;
    }
    if flags & HAS_FRAME_NAME != 0 {
        cursor.counted_string()?;
    }
    let mut target = None;
    if flags & HAS_MONIKER != 0 {
        target = if flags & MONIKER_SAVED_AS_STRING != 0 {
            Some(cursor.counted_string()?)
        } else {
            moniker(&mut cursor)?
        };
    }
    if flags & HAS_LOCATION != 0 {
        let location = cursor.counted_string()?;
        target = Some(match target {
            Some(base) => format!("{base}#{location}"),
            None => location,
        });
    }
    Ok(target.map(|t| (range, t)))
}

fn moniker(cursor: &mut Cursor<'_>) -> Result<Option<String>> {
    let class_id = cursor.take(16)?;
    if *class_id == URL_MONIKER {
        let len = cursor.u32()? as usize;
        let bytes = cursor.take(len)?;
        return Ok(Some(trim_nul(decode_utf16le(bytes))));
    }
    if *class_id == FILE_MONIKER {
        let up_levels = cursor.u16()? as usize;
        let ansi_len = cursor.u32()? as usize;
        let ansi = cursor.take(ansi_len)?;
        // End server, version, reserved
        cursor.take(24)?;
        let unicode_size = cursor.u32()?;
        let path = if unicode_size > 0 {
            let len = cursor.u32()? as usize;
            cursor.u16()?;
            decode_utf16le(cursor.take(len)?)
        } else {
            let end = ansi.iter().position(|&b| b == 0).unwrap_or(ansi.len());
            String::from_utf8_lossy(&ansi[..end]).into_owned()
        };
        return Ok(Some(format!("{}{}", "../".repeat(up_levels), path)));
    }
    Ok(None)
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect()
    }

    /// HLINK payload with a URL moniker.
    pub(crate) fn url_hlink(first_row: u16, first_col: u16, url: &str) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [first_row, first_row, first_col, first_col] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&(HAS_MONIKER | 0x02).to_le_bytes());
        data.extend_from_slice(&URL_MONIKER);
        let text = utf16(url);
        data.extend_from_slice(&(text.len() as u32).to_le_bytes());
        data.extend_from_slice(&text);
        data
    }

    #[test]
    fn test_url_moniker() {
        let data = url_hlink(2, 1, "https://example.com/");
        let (range, target) = parse_hlink(&data).unwrap().unwrap();
        assert_eq!(range, CellRange::new(2, 2, 1, 1));
        assert_eq!(target, "https://example.com/");
    }

    #[test]
    fn test_location_only() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&HAS_LOCATION.to_le_bytes());
        let text = utf16("Sheet2!A1");
        data.extend_from_slice(&((text.len() / 2) as u32).to_le_bytes());
        data.extend_from_slice(&text);
        let (_, target) = parse_hlink(&data).unwrap().unwrap();
        assert_eq!(target, "Sheet2!A1");
    }

    #[test]
    fn test_truncated_is_error() {
        let data = url_hlink(0, 0, "https://example.com/");
        assert!(parse_hlink(&data[..40]).is_err());
    }
}
