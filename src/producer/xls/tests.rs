use super::hlink::tests::url_hlink;
use super::*;
use crate::model::{CellValue, ExtraKind};
use std::cell::Cell;
use std::io::{Cursor, SeekFrom, Write};
use std::rc::Rc;

fn record(record_type: u16, data: &[u8]) -> Vec<u8> {
    let mut out = record_type.to_le_bytes().to_vec();
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn bof(substream: u16) -> Vec<u8> {
    let mut data = 0x0600u16.to_le_bytes().to_vec();
    data.extend_from_slice(&substream.to_le_bytes());
    data.extend_from_slice(&[0u8; 12]);
    record(BOF, &data)
}

fn cell(row: u16, col: u16, xf: u16) -> Vec<u8> {
    [row, col, xf].iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn xl_string(text: &str) -> Vec<u8> {
    let mut data = (text.len() as u16).to_le_bytes().to_vec();
    data.push(0);
    data.extend_from_slice(text.as_bytes());
    data
}

fn xf(format: u16) -> Vec<u8> {
    let mut data = 0u16.to_le_bytes().to_vec();
    data.extend_from_slice(&format.to_le_bytes());
    data.extend_from_slice(&[0u8; 16]);
    record(XF, &data)
}

fn bound_sheet(offset: u32, hidden: bool, name: &str) -> Vec<u8> {
    let mut data = offset.to_le_bytes().to_vec();
    data.push(hidden as u8);
    data.push(0);
    data.push(name.len() as u8);
    data.push(0);
    data.extend_from_slice(name.as_bytes());
    record(BOUNDSHEET, &data)
}

fn globals(offsets: [u32; 2]) -> Vec<u8> {
    let mut out = bof(BOF_GLOBALS);
    out.extend(record(CODEPAGE, &1200u16.to_le_bytes()));
    out.extend(record(DATEMODE, &0u16.to_le_bytes()));
    let mut format = 164u16.to_le_bytes().to_vec();
    format.extend(xl_string("0.0%"));
    out.extend(record(FORMAT, &format));
    out.extend(xf(0));
    out.extend(xf(14));
    out.extend(xf(164));
    out.extend(bound_sheet(offsets[0], false, "People"));
    out.extend(bound_sheet(offsets[1], true, "Second"));
    let mut sst = 3u32.to_le_bytes().to_vec();
    sst.extend_from_slice(&3u32.to_le_bytes());
    for text in ["Name", "Age", "Ada"] {
        sst.extend(xl_string(text));
    }
    out.extend(record(SST, &sst));
    out.extend(record(EOF, &[]));
    out
}

fn first_sheet() -> Vec<u8> {
    let mut out = bof(0x0010);
    for row in [0u16, 1, 3] {
        let mut data = row.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 14]);
        out.extend(record(ROW, &data));
    }
    for (row, col, sst) in [(0u16, 0u16, 0u32), (0, 1, 1), (1, 0, 2)] {
        let mut data = cell(row, col, 0);
        data.extend_from_slice(&sst.to_le_bytes());
        out.extend(record(LABELSST, &data));
    }
    let mut rk = cell(1, 1, 0);
    rk.extend_from_slice(&((36u32 << 2) | 0x02).to_le_bytes());
    out.extend(record(RK, &rk));
    let mut number = cell(1, 2, 1);
    number.extend_from_slice(&45000.0f64.to_le_bytes());
    out.extend(record(NUMBER, &number));

    // String-valued formula, cached text in the STRING record
    let mut formula = cell(2, 0, 0);
    formula.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
    formula.extend_from_slice(&[0u8; 8]);
    out.extend(record(FORMULA, &formula));
    out.extend(record(STRING, &xl_string("calc")));
    let mut boolean = cell(2, 1, 0);
    boolean.extend_from_slice(&[1, 0]);
    out.extend(record(BOOLERR, &boolean));
    let mut mulrk = [2u16, 2].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();
    for (xf, value) in [(2u16, 25u32), (0, 7)] {
        mulrk.extend_from_slice(&xf.to_le_bytes());
        mulrk.extend_from_slice(&((value << 2) | 0x03).to_le_bytes());
    }
    mulrk.extend_from_slice(&3u16.to_le_bytes());
    out.extend(record(MULRK, &mulrk));

    let mut merged = 1u16.to_le_bytes().to_vec();
    for v in [0u16, 0, 2, 3] {
        merged.extend_from_slice(&v.to_le_bytes());
    }
    out.extend(record(MERGEDCELLS, &merged));
    out.extend(record(HLINK, &url_hlink(1, 0, "https://example.com/ada")));

    let mut obj = Vec::new();
    for v in [0x15u16, 0x12, 0x19, 1, 0] {
        obj.extend_from_slice(&v.to_le_bytes());
    }
    obj.extend_from_slice(&[0u8; 16]);
    out.extend(record(OBJ, &obj));
    let mut txo = vec![0u8; 18];
    txo[10] = 2;
    out.extend(record(TXO, &txo));
    out.extend(record(CONTINUE, &[0, b'h', b'i']));
    out.extend(record(CONTINUE, &[0u8; 16]));
    let mut note = cell(1, 1, 0);
    note.extend_from_slice(&1u16.to_le_bytes());
    note.extend(xl_string("me"));
    out.extend(record(NOTE, &note));

    // Embedded chart substream
    out.extend(bof(0x0020));
    let mut hidden = cell(9, 9, 0);
    hidden.extend_from_slice(&1.0f64.to_le_bytes());
    out.extend(record(NUMBER, &hidden));
    out.extend(record(EOF, &[]));

    out.extend(record(EOF, &[]));
    out
}

fn second_sheet() -> Vec<u8> {
    let mut out = bof(0x0010);
    let mut label = cell(0, 0, 0);
    label.extend(xl_string("second"));
    out.extend(record(LABEL, &label));
    out.extend(record(EOF, &[]));
    out
}

fn workbook_stream() -> Vec<u8> {
    let sheet1 = first_sheet();
    let sheet2 = second_sheet();
    let globals_len = globals([0, 0]).len() as u32;
    let mut out = globals([globals_len, globals_len + sheet1.len() as u32]);
    out.extend(sheet1);
    out.extend(sheet2);
    out
}

fn producer(cache: CacheLocation) -> XlsProducer<Cursor<Vec<u8>>> {
    XlsProducer::from_stream(Cursor::new(workbook_stream()), cache).unwrap()
}

fn drain(producer: &mut impl RowProducer) -> Vec<Token> {
    let mut tokens = Vec::new();
    loop {
        match producer.next_token().unwrap() {
            Token::SheetEnd => return tokens,
            Token::EndOfStream => panic!("sheet ended without a boundary"),
            token => tokens.push(token),
        }
    }
}

fn value_at(tokens: &[Token], row: u32, col: u32) -> CellData {
    tokens
        .iter()
        .find_map(|t| match t {
            Token::Cell(c) if c.row_index == row && c.column_index == col => Some(c.clone()),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_globals() {
    let producer = producer(CacheLocation::Memory);
    assert_eq!(producer.format(), WorkbookFormat::Xls);
    assert!(!producer.date1904());
    let names: Vec<&str> = producer.sheets().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["People", "Second"]);
    assert!(producer.sheets()[1].hidden);
}

#[test]
fn test_cells_and_row_boundaries() {
    for cache in [CacheLocation::None, CacheLocation::Memory, CacheLocation::ThreadLocal] {
        let mut producer = producer(cache);
        producer.begin_sheet(0, ExtraType::empty()).unwrap();
        let tokens = drain(&mut producer);

        assert_eq!(value_at(&tokens, 0, 0).value, CellValue::String("Name".into()));
        assert_eq!(value_at(&tokens, 1, 0).value, CellValue::String("Ada".into()));
        assert_eq!(value_at(&tokens, 1, 1).value, CellValue::Number(36.0));
        let date = value_at(&tokens, 1, 2);
        assert!(date.is_date());
        assert_eq!(value_at(&tokens, 2, 0).value, CellValue::String("calc".into()));
        assert_eq!(value_at(&tokens, 2, 1).value, CellValue::Boolean(true));
        let percent = value_at(&tokens, 2, 2);
        assert_eq!(percent.value, CellValue::Number(0.25));
        assert_eq!(percent.format_pattern(), Some("0.0%"));
        assert_eq!(value_at(&tokens, 2, 3).value, CellValue::Number(0.07));

        let ends: Vec<u32> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::RowEnd(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec![0, 1, 2, 3]);
        assert!(!tokens.iter().any(|t| matches!(t, Token::Extra(_))));
        // Chart substream cells never leak
        assert!(!tokens.iter().any(|t| matches!(t, Token::Cell(c) if c.row_index == 9)));
        producer.close().unwrap();
    }
}

#[test]
fn test_extras() {
    let mut producer = producer(CacheLocation::Memory);
    producer.begin_sheet(0, ExtraType::all()).unwrap();
    let tokens = drain(&mut producer);
    let extras: Vec<&CellExtra> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Extra(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(extras.len(), 3);
    assert_eq!(extras[0].kind, ExtraKind::Merge);
    assert_eq!(extras[0].range, CellRange::new(0, 0, 2, 3));
    assert_eq!(extras[1].text.as_deref(), Some("https://example.com/ada"));
    assert_eq!(extras[2].kind, ExtraKind::Comment);
    assert_eq!(extras[2].text.as_deref(), Some("hi"));
    assert_eq!((extras[2].first_row(), extras[2].first_column()), (1, 1));
}

#[test]
fn test_seek_to_second_sheet() {
    let mut producer = producer(CacheLocation::Memory);
    producer.begin_sheet(1, ExtraType::empty()).unwrap();
    let tokens = drain(&mut producer);
    assert_eq!(value_at(&tokens, 0, 0).value, CellValue::String("second".into()));
    assert_eq!(producer.next_token().unwrap(), Token::EndOfStream);
    assert!(matches!(
        producer.begin_sheet(2, ExtraType::empty()),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_rejects_non_workbook_stream() {
    let result = XlsProducer::from_stream(Cursor::new(record(EOF, &[])), CacheLocation::Memory);
    assert!(matches!(result, Err(Error::Corrupted(_))));
}

#[test]
fn test_compound_file() {
    let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    {
        let mut stream = compound.create_stream("/Workbook").unwrap();
        stream.write_all(&workbook_stream()).unwrap();
    }
    compound.flush().unwrap();
    let bytes = compound.into_inner().into_inner();
    assert_eq!(
        crate::common::detect_format(&bytes).unwrap(),
        WorkbookFormat::Xls
    );

    let mut producer =
        XlsProducer::from_compound_file(Cursor::new(bytes), CacheLocation::None).unwrap();
    producer.begin_sheet(0, ExtraType::empty()).unwrap();
    let tokens = drain(&mut producer);
    assert_eq!(value_at(&tokens, 0, 1).value, CellValue::String("Age".into()));
}

/// Counts the bytes pulled from the underlying file.
struct CountingReader {
    inner: Cursor<Vec<u8>>,
    read: Rc<Cell<u64>>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read.set(self.read.get() + n as u64);
        Ok(n)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn test_unselected_sheets_are_never_read() {
    let sheet1 = first_sheet();
    let mut sheet2 = bof(0x0010);
    for row in 0..8_000u16 {
        let mut label = cell(row, 0, 0);
        label.extend(xl_string("padding text"));
        sheet2.extend(record(LABEL, &label));
    }
    sheet2.extend(record(EOF, &[]));
    let globals_len = globals([0, 0]).len() as u32;
    let mut stream = globals([globals_len, globals_len + sheet1.len() as u32]);
    stream.extend(sheet1);
    stream.extend(sheet2);

    let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    compound.create_stream("/Workbook").unwrap().write_all(&stream).unwrap();
    compound.flush().unwrap();
    let bytes = compound.into_inner().into_inner();
    let total = bytes.len() as u64;

    let read = Rc::new(Cell::new(0));
    let file = CountingReader {
        inner: Cursor::new(bytes),
        read: Rc::clone(&read),
    };
    let mut producer = XlsProducer::from_compound_file(file, CacheLocation::None).unwrap();
    producer.begin_sheet(0, ExtraType::empty()).unwrap();
    let tokens = drain(&mut producer);
    assert_eq!(value_at(&tokens, 1, 0).value, CellValue::String("Ada".into()));
    assert!(read.get() < total / 4, "read {} of {} bytes", read.get(), total);
}

