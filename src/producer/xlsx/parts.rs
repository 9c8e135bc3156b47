//! Package part access for OOXML workbooks.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use parking_lot::Mutex;
use zip::{CompressionMethod, ZipArchive};

use crate::common::{Error, Result};

/// Source of named package parts (`xl/workbook.xml`, ...).
pub trait PartSource {
    /// Open a part for reading; `Ok(None)` when the package has no such part.
    fn open_part(&mut self, name: &str) -> Result<Option<Box<dyn BufRead>>>;
}

/// Parts held in memory, keyed by package path.
#[derive(Debug, Clone, Default)]
pub struct MemoryParts {
    parts: HashMap<String, Vec<u8>>,
}

impl MemoryParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.parts.insert(name.into(), content.into());
    }

    pub fn with_part(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }
}

impl PartSource for MemoryParts {
    fn open_part(&mut self, name: &str) -> Result<Option<Box<dyn BufRead>>> {
        Ok(self
            .parts
            .get(name.trim_start_matches('/'))
            .map(|content| Box::new(Cursor::new(content.clone())) as Box<dyn BufRead>))
    }
}

/// One handle on a reader shared by the archive index and every open part.
/// Each handle keeps its own position.
struct SharedReader<R> {
    inner: Arc<Mutex<R>>,
    position: u64,
}

impl<R> SharedReader<R> {
    fn at(&self, position: u64) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            position,
        }
    }
}

impl<R: Read + Seek> Read for SharedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.seek(SeekFrom::Start(self.position))?;
        let read = inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<R: Read + Seek> Seek for SharedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(_) => self.inner.lock().seek(pos)?,
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek before start of archive")
            })?,
        };
        Ok(self.position)
    }
}

/// Parts read from a zip package.
///
/// An opened part streams straight from the archive: the compressed bytes are
/// read and inflated as the XML parser asks for them.
pub struct ZipParts<R: Read + Seek> {
    archive: ZipArchive<SharedReader<R>>,
    source: SharedReader<R>,
}

impl<R: Read + Seek> ZipParts<R> {
    pub fn new(reader: R) -> Result<Self> {
        let shared = SharedReader {
            inner: Arc::new(Mutex::new(reader)),
            position: 0,
        };
        Ok(Self {
            archive: ZipArchive::new(shared.at(0))?,
            source: shared,
        })
    }
}

impl<R: Read + Seek + 'static> PartSource for ZipParts<R> {
    fn open_part(&mut self, name: &str) -> Result<Option<Box<dyn BufRead>>> {
        let Some(index) = self.archive.index_for_name(name.trim_start_matches('/')) else {
            return Ok(None);
        };
        let entry = self.archive.by_index_raw(index)?;
        if entry.encrypted() {
            return Err(Error::Zip(format!("part {name} is encrypted")));
        }
        let start = entry
            .data_start()
            .ok_or_else(|| Error::Zip(format!("part {name} has no data offset")))?;
        let (method, compressed) = (entry.compression(), entry.compressed_size());
        drop(entry);

        let raw = self.source.at(start).take(compressed);
        match method {
            CompressionMethod::Stored => Ok(Some(Box::new(BufReader::new(raw)))),
            CompressionMethod::Deflated => Ok(Some(Box::new(BufReader::new(DeflateDecoder::new(raw))))),
            other => Err(Error::Zip(format!("part {name} uses unsupported compression {other}"))),
        }
    }
}
