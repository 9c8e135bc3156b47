//! Codepage text decoding for legacy workbook records.
//!
//! Byte strings in BIFF5 records and compressed BIFF8 strings are stored in
//! the workbook codepage announced by the CODEPAGE record.

use encoding_rs::Encoding;

/// Codepage assumed until a workbook announces its own.
pub const DEFAULT_CODEPAGE: u16 = 1252;

/// Map a Windows codepage identifier to an `encoding_rs` encoding.
///
/// # Examples
/// ```
/// use sheetflow::common::encoding::codepage_to_encoding;
///
/// assert_eq!(codepage_to_encoding(936).unwrap().name(), "GBK");
/// assert!(codepage_to_encoding(1).is_none());
/// ```
#[inline]
pub fn codepage_to_encoding(codepage: u16) -> Option<&'static Encoding> {
    match codepage {
        // OEM pages used by very old workbooks
        437 | 850 => Some(encoding_rs::IBM866),
        874 => Some(encoding_rs::WINDOWS_874),
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        1200 => Some(encoding_rs::UTF_16LE),
        1201 => Some(encoding_rs::UTF_16BE),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        // 367 is US-ASCII; BIFF writers use it interchangeably with 1252
        367 | 1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),
        10000 => Some(encoding_rs::MACINTOSH),
        20866 => Some(encoding_rs::KOI8_R),
        21866 => Some(encoding_rs::KOI8_U),
        28592 => Some(encoding_rs::ISO_8859_2),
        28605 => Some(encoding_rs::ISO_8859_15),
        // Mac codepage marker used by BIFF files written on classic Mac OS
        32768 => Some(encoding_rs::MACINTOSH),
        54936 => Some(encoding_rs::GB18030),
        65001 => Some(encoding_rs::UTF_8),
        _ => None,
    }
}

/// Decode single-byte or multi-byte codepage text; unknown codepages fall
/// back to Windows-1252.
pub fn decode_codepage(bytes: &[u8], codepage: u16) -> String {
    let encoding = codepage_to_encoding(codepage).unwrap_or(encoding_rs::WINDOWS_1252);
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Decode BIFF8 "compressed" text: each byte is the low byte of a UTF-16
/// code unit.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepage_lookup() {
        assert_eq!(codepage_to_encoding(1252).unwrap().name(), "windows-1252");
        assert_eq!(codepage_to_encoding(1251).unwrap().name(), "windows-1251");
        assert!(codepage_to_encoding(9999).is_none());
    }

    #[test]
    fn test_decode_codepage() {
        assert_eq!(decode_codepage(&[0x80], 1252), "\u{20ac}");
        assert_eq!(decode_codepage(&[0xC0], 1251), "\u{410}");
        assert_eq!(decode_codepage(b"plain", 9999), "plain");
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_latin1(&[0x63, 0x61, 0x66, 0xE9]), "caf\u{e9}");
    }
}
