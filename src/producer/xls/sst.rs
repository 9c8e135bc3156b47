//! Shared string table.
//!
//! The raw SST payload (the record plus its CONTINUE records) is retained for
//! the whole session. One pass over it records where every string starts and
//! offers each decoded string to the [`ReadCache`]; lookups the cache cannot
//! answer re-decode from the recorded position.

use log::debug;

use crate::cache::{CacheLocation, ReadCache, new_cache};
use crate::common::binary::decode_utf16le;
use crate::common::encoding::decode_latin1;
use crate::common::{Error, Result};

/// Reads across record boundaries. A character run that crosses into a
/// CONTINUE record restarts with a fresh option byte.
struct SegmentCursor<'a> {
    segments: &'a [Vec<u8>],
    segment: usize,
    offset: usize,
}

impl<'a> SegmentCursor<'a> {
    fn at(segments: &'a [Vec<u8>], segment: usize, offset: usize) -> Self {
        Self {
            segments,
            segment,
            offset,
        }
    }

    fn position(&self) -> (usize, usize) {
        (self.segment, self.offset)
    }

    fn remaining_in_segment(&self) -> usize {
        self.segments
            .get(self.segment)
            .map_or(0, |s| s.len().saturating_sub(self.offset))
    }

    fn advance_segment(&mut self) -> Result<()> {
        self.segment += 1;
        self.offset = 0;
        if self.segment >= self.segments.len() {
            return Err(Error::Corrupted("shared string table ends mid-string".to_string()));
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        while self.remaining_in_segment() == 0 {
            self.advance_segment()?;
        }
        let byte = self.segments[self.segment][self.offset];
        self.offset += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes([self.read_u8()?, self.read_u8()?]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes([
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
        ]))
    }

    fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.remaining_in_segment() == 0 {
                self.advance_segment()?;
                continue;
            }
            let step = count.min(self.remaining_in_segment());
            self.offset += step;
            count -= step;
        }
        Ok(())
    }

    fn read_chars(&mut self, mut count: usize, mut high_byte: bool) -> Result<String> {
        let mut text = String::with_capacity(count);
        while count > 0 {
            if self.remaining_in_segment() == 0 {
                self.advance_segment()?;
                high_byte = self.read_u8()? & 0x01 != 0;
                continue;
            }
            let width = if high_byte { 2 } else { 1 };
            let take = count.min(self.remaining_in_segment() / width);
            if take == 0 {
                return Err(Error::Corrupted("split character in shared string".to_string()));
            }
            let bytes = &self.segments[self.segment][self.offset..self.offset + take * width];
            if high_byte {
                text.push_str(&decode_utf16le(bytes));
            } else {
                text.push_str(&decode_latin1(bytes));
            }
            self.offset += take * width;
            count -= take;
        }
        Ok(text)
    }

    /// One XLUnicodeRichExtendedString.
    fn read_string(&mut self) -> Result<String> {
        let count = self.read_u16()? as usize;
        let flags = self.read_u8()?;
        let runs = if flags & 0x08 != 0 { self.read_u16()? as usize } else { 0 };
        let ext = if flags & 0x04 != 0 { self.read_u32()? as usize } else { 0 };
        let text = self.read_chars(count, flags & 0x01 != 0)?;
        self.skip(runs * 4 + ext)?;
        Ok(text)
    }
}

/// Shared strings of one workbook.
pub struct SharedStrings {
    segments: Vec<Vec<u8>>,
    starts: Vec<(usize, usize)>,
    cache: Box<dyn ReadCache>,
}

impl SharedStrings {
    pub fn empty(location: CacheLocation) -> Self {
        Self {
            segments: Vec::new(),
            starts: Vec::new(),
            cache: new_cache(location),
        }
    }

    /// Index the SST record payload and its CONTINUE payloads.
    pub fn load(&mut self, sst: Vec<u8>, continues: Vec<Vec<u8>>) -> Result<()> {
        let unique = crate::common::binary::read_u32_le(&sst, 4)? as usize;
        let mut segments = Vec::with_capacity(continues.len() + 1);
        segments.push(sst);
        segments.extend(continues);

        let mut starts = Vec::with_capacity(unique);
        let mut cursor = SegmentCursor::at(&segments, 0, 8);
        for index in 0..unique {
            if cursor.remaining_in_segment() == 0 && cursor.segment + 1 >= segments.len() {
                debug!("shared string table declares {unique} strings, holds {index}");
                break;
            }
            if cursor.remaining_in_segment() == 0 {
                cursor.advance_segment()?;
            }
            starts.push(cursor.position());
            let text = cursor.read_string()?;
            self.cache.put(index as u32, text);
        }
        debug!("indexed {} shared strings", starts.len());
        self.starts = starts;
        self.segments = segments;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn get(&mut self, index: u32) -> Result<String> {
        if let Some(text) = self.cache.get(index) {
            return Ok(text);
        }
        let &(segment, offset) = self
            .starts
            .get(index as usize)
            .ok_or_else(|| Error::Corrupted(format!("shared string {index} out of range")))?;
        let text = SegmentCursor::at(&self.segments, segment, offset).read_string()?;
        self.cache.put(index, text.clone());
        Ok(text)
    }

    /// Drop cached strings and the raw payload.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.segments.clear();
        self.starts.clear();
    }
}
