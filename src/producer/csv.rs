//! Delimited-text producer.
//!
//! A delimited file is a single sheet whose every field is a string cell;
//! empty fields become empty cells.

use std::collections::VecDeque;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::trace;

use super::{RowProducer, SheetInfo, Token};
use crate::common::{Error, Result, WorkbookFormat};
use crate::holder::CsvConfig;
use crate::model::{CellData, ExtraType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Reading,
    Finished,
}

/// Producer over a delimited-text stream.
pub struct CsvProducer<R: Read> {
    reader: csv::Reader<R>,
    sheets: Vec<SheetInfo>,
    record: StringRecord,
    pending: VecDeque<Token>,
    row_index: u32,
    state: State,
}

impl<R: Read> CsvProducer<R> {
    pub fn new(input: R, config: CsvConfig) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(config.delimiter)
            .quote(config.quote)
            .comment(config.comment)
            .trim(if config.trim_whitespace { Trim::All } else { Trim::None })
            .from_reader(input);
        Self {
            reader,
            sheets: vec![SheetInfo::new(0, config.sheet_name)],
            record: StringRecord::new(),
            pending: VecDeque::new(),
            row_index: 0,
            state: State::Idle,
        }
    }
}

impl<R: Read> RowProducer for CsvProducer<R> {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Csv
    }

    fn sheets(&self) -> &[SheetInfo] {
        &self.sheets
    }

    fn date1904(&self) -> bool {
        false
    }

    fn begin_sheet(&mut self, index: usize, _extras: ExtraType) -> Result<()> {
        if index != 0 {
            return Err(Error::Configuration(format!(
                "delimited text has a single sheet, got index {index}"
            )));
        }
        if self.state != State::Idle {
            return Err(Error::Configuration(
                "delimited text can only be read once".to_string(),
            ));
        }
        self.state = State::Reading;
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(token);
        }
        match self.state {
            State::Idle | State::Finished => return Ok(Token::EndOfStream),
            State::Reading => {},
        }
        if !self.reader.read_record(&mut self.record)? {
            self.state = State::Finished;
            return Ok(Token::SheetEnd);
        }
        let row = self.row_index;
        self.row_index += 1;
        trace!("csv row {} with {} fields", row, self.record.len());
        for (col, field) in self.record.iter().enumerate() {
            let cell = if field.is_empty() {
                CellData::empty()
            } else {
                CellData::string(field)
            };
            self.pending.push_back(Token::Cell(cell.at(row, col as u32)));
        }
        self.pending.push_back(Token::RowEnd(row));
        // At least the row boundary is queued
        Ok(self.pending.pop_front().unwrap_or(Token::RowEnd(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;
    use std::io::Cursor;

    fn drain(producer: &mut impl RowProducer) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = producer.next_token().unwrap();
            let done = matches!(token, Token::SheetEnd | Token::EndOfStream);
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    #[test]
    fn test_tokens() {
        let mut producer = CsvProducer::new(Cursor::new("a,,c\n1\n"), CsvConfig::default());
        assert_eq!(producer.sheets()[0].name, "Sheet1");
        producer.begin_sheet(0, ExtraType::empty()).unwrap();
        let tokens = drain(&mut producer);
        assert_eq!(tokens.len(), 7);
        assert_eq!(
            tokens[0],
            Token::Cell(CellData::string("a").at(0, 0))
        );
        assert_eq!(tokens[1], Token::Cell(CellData::empty().at(0, 1)));
        assert_eq!(tokens[3], Token::RowEnd(0));
        match &tokens[4] {
            Token::Cell(cell) => {
                assert_eq!(cell.value, CellValue::String("1".to_string()));
                assert_eq!((cell.row_index, cell.column_index), (1, 0));
            },
            other => panic!("unexpected token {other:?}"),
        }
        assert_eq!(tokens[5], Token::RowEnd(1));
        assert_eq!(tokens[6], Token::SheetEnd);
        assert_eq!(producer.next_token().unwrap(), Token::EndOfStream);
    }

    #[test]
    fn test_dialect() {
        let config = CsvConfig::tab_separated();
        let mut producer = CsvProducer::new(Cursor::new("x\t\"y\tz\"\n"), config);
        producer.begin_sheet(0, ExtraType::empty()).unwrap();
        let tokens = drain(&mut producer);
        assert_eq!(tokens[1], Token::Cell(CellData::string("y\tz").at(0, 1)));
    }

    #[test]
    fn test_single_pass() {
        let mut producer = CsvProducer::new(Cursor::new("a\n"), CsvConfig::default());
        assert!(producer.begin_sheet(1, ExtraType::empty()).is_err());
        producer.begin_sheet(0, ExtraType::empty()).unwrap();
        assert!(matches!(
            producer.begin_sheet(0, ExtraType::empty()),
            Err(Error::Configuration(_))
        ));
    }
}
