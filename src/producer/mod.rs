//! Row producers: one adapter per container format.
//!
//! A producer turns its container's records or XML into one ordered token
//! stream per sheet: cells in row order, a row boundary after each row,
//! extra events where the format stores them and a sheet boundary at the
//! end. Producers know nothing about headers, converters or listeners.

#[cfg(feature = "csv")]
pub mod csv;
#[cfg(feature = "xls")]
pub mod xls;
#[cfg(feature = "xlsx")]
pub mod xlsx;

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use log::debug;

use crate::common::{Error, Result, WorkbookFormat, detect_format};
use crate::holder::ReadOptions;
use crate::model::{CellData, CellExtra, ExtraType};

/// One element of a producer's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A cell; its coordinates are set
    Cell(CellData),
    /// Every cell of the given row has been produced
    RowEnd(u32),
    /// Out-of-band metadata
    Extra(CellExtra),
    /// The current sheet is exhausted
    SheetEnd,
    /// No sheet is open
    EndOfStream,
}

/// A sheet as listed by the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    /// Position in workbook order, starting at 0
    pub index: usize,
    pub name: String,
    pub hidden: bool,
}

impl SheetInfo {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            hidden: false,
        }
    }
}

/// Pull source of row/cell tokens for one workbook.
pub trait RowProducer {
    fn format(&self) -> WorkbookFormat;

    /// Sheets in workbook order.
    fn sheets(&self) -> &[SheetInfo];

    /// Whether the workbook declares the 1904 date system.
    fn date1904(&self) -> bool;

    /// Position on a sheet; tokens of that sheet follow. Sheets not begun are
    /// never decoded.
    fn begin_sheet(&mut self, index: usize, extras: ExtraType) -> Result<()>;

    fn next_token(&mut self) -> Result<Token>;

    /// Release caches and handles.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<P: RowProducer + ?Sized> RowProducer for Box<P> {
    fn format(&self) -> WorkbookFormat {
        (**self).format()
    }

    fn sheets(&self) -> &[SheetInfo] {
        (**self).sheets()
    }

    fn date1904(&self) -> bool {
        (**self).date1904()
    }

    fn begin_sheet(&mut self, index: usize, extras: ExtraType) -> Result<()> {
        (**self).begin_sheet(index, extras)
    }

    fn next_token(&mut self) -> Result<Token> {
        (**self).next_token()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

fn check_options(format: WorkbookFormat, options: &ReadOptions) -> Result<()> {
    if options.csv.is_some() && format != WorkbookFormat::Csv {
        return Err(Error::Configuration(format!(
            "delimited-text options cannot be used with {:?} input",
            format
        )));
    }
    Ok(())
}

fn unsupported(format: WorkbookFormat) -> Error {
    Error::Configuration(format!("support for {:?} is not compiled in", format))
}

/// Open a producer for a workbook held in memory.
pub fn open_producer_from_bytes(bytes: Vec<u8>, options: &ReadOptions) -> Result<Box<dyn RowProducer>> {
    let format = match options.format {
        Some(format) => format,
        None => detect_format(&bytes)?,
    };
    check_options(format, options)?;
    debug!("opening {:?} workbook from {} bytes", format, bytes.len());
    match format {
        #[cfg(feature = "xls")]
        WorkbookFormat::Xls => Ok(Box::new(xls::XlsProducer::from_compound_file(
            Cursor::new(bytes),
            options.cache,
        )?)),
        #[cfg(feature = "xlsx")]
        WorkbookFormat::Xlsx => Ok(Box::new(xlsx::XlsxProducer::new(
            xlsx::ZipParts::new(Cursor::new(bytes))?,
        )?)),
        #[cfg(feature = "csv")]
        WorkbookFormat::Csv => Ok(Box::new(csv::CsvProducer::new(
            Cursor::new(bytes),
            options.csv.clone().unwrap_or_default(),
        ))),
        #[allow(unreachable_patterns)]
        other => Err(unsupported(other)),
    }
}

/// Open a producer for a workbook file, detecting its format unless one is
/// forced through the options.
pub fn open_producer<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Box<dyn RowProducer>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let format = match options.format {
        Some(format) => format,
        None => {
            let mut head = Vec::with_capacity(8192);
            (&mut file).take(8192).read_to_end(&mut head)?;
            let detected = detect_format(&head);
            // Extension breaks ties only for inputs the signature rejects
            match (detected, path.extension().and_then(|e| e.to_str())) {
                (Ok(format), _) => format,
                (Err(e), Some(ext)) => WorkbookFormat::from_extension(ext).ok_or(e)?,
                (Err(e), None) => return Err(e),
            }
        },
    };
    check_options(format, options)?;
    let file = File::open(path)?;
    debug!("opening {:?} workbook {}", format, path.display());
    match format {
        #[cfg(feature = "xls")]
        WorkbookFormat::Xls => Ok(Box::new(xls::XlsProducer::from_compound_file(
            BufReader::new(file),
            options.cache,
        )?)),
        #[cfg(feature = "xlsx")]
        WorkbookFormat::Xlsx => Ok(Box::new(xlsx::XlsxProducer::new(xlsx::ZipParts::new(
            file,
        )?)?)),
        #[cfg(feature = "csv")]
        WorkbookFormat::Csv => Ok(Box::new(csv::CsvProducer::new(
            BufReader::new(file),
            options.csv.clone().unwrap_or_default(),
        ))),
        #[allow(unreachable_patterns)]
        other => Err(unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::CsvConfig;

    #[cfg(feature = "csv")]
    #[test]
    fn test_text_input_opens_as_csv() {
        let mut producer = open_producer_from_bytes(b"a,b\n1,2\n".to_vec(), &ReadOptions::default()).unwrap();
        assert_eq!(producer.format(), WorkbookFormat::Csv);
        assert_eq!(producer.sheets().len(), 1);
        producer.begin_sheet(0, ExtraType::empty()).unwrap();
        assert_eq!(producer.next_token().unwrap(), Token::Cell(CellData::string("a").at(0, 0)));
    }

    #[test]
    fn test_csv_options_on_other_formats_are_rejected() {
        let options = ReadOptions::default()
            .with_format(WorkbookFormat::Xlsx)
            .with_csv(CsvConfig::tab_separated());
        let err = open_producer_from_bytes(b"PK\x03\x04".to_vec(), &options).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_empty_input_is_undetectable() {
        let err = open_producer_from_bytes(Vec::new(), &ReadOptions::default()).err().unwrap();
        assert!(matches!(err, Error::FormatDetection(_)));
    }
}
