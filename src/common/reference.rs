//! A1-style cell references and rectangular ranges.
//!
//! All indices in this crate are 0-based; the textual form is 1-based rows
//! with bijective base-26 column letters.

use crate::common::{Error, Result};

/// A rectangular block of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRange {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl CellRange {
    pub fn new(first_row: u32, last_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
            first_col: first_col.min(last_col),
            last_col: first_col.max(last_col),
        }
    }

    /// Parse `A1:B2` or a single `A1`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once(':') {
            Some((start, end)) => {
                let (r1, c1) = parse_cell_reference(start)?;
                let (r2, c2) = parse_cell_reference(end)?;
                Ok(Self::new(r1, r2, c1, c2))
            },
            None => {
                let (r, c) = parse_cell_reference(text)?;
                Ok(Self::new(r, r, c, c))
            },
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    /// Move the range down when it starts at or below `from_row`.
    pub fn shift_rows(&mut self, from_row: u32, count: u32) {
        if self.first_row >= from_row {
            self.first_row += count;
            self.last_row += count;
        }
    }

    /// Move the range right when it starts at or right of `from_col`.
    pub fn shift_columns(&mut self, from_col: u32, count: u32) {
        if self.first_col >= from_col {
            self.first_col += count;
            self.last_col += count;
        }
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            cell_reference(self.first_row, self.first_col),
            cell_reference(self.last_row, self.last_col)
        )
    }
}

/// Convert a 0-based column index to letters (0 -> A, 26 -> AA).
pub fn column_index_to_name(col: u32) -> String {
    let mut n = col + 1;
    let mut name = Vec::with_capacity(3);
    while n > 0 {
        n -= 1;
        name.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    name.reverse();
    // Only ASCII letters were pushed
    String::from_utf8(name).unwrap_or_default()
}

/// Convert column letters to a 0-based index (A -> 0, AA -> 26).
pub fn column_name_to_index(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let mut result: u32 = 0;
    for byte in name.bytes() {
        let byte = byte.to_ascii_uppercase();
        if !byte.is_ascii_uppercase() {
            return None;
        }
        result = result.checked_mul(26)?.checked_add((byte - b'A') as u32 + 1)?;
    }
    Some(result - 1)
}

/// Convert 0-based row and column to an A1 reference.
pub fn cell_reference(row: u32, col: u32) -> String {
    let mut out = column_index_to_name(col);
    out.push_str(itoa::Buffer::new().format(row + 1));
    out
}

/// Parse an A1 reference (absolute `$` markers allowed) into 0-based (row, col).
pub fn parse_cell_reference(reference: &str) -> Result<(u32, u32)> {
    let cleaned: String = reference.chars().filter(|c| *c != '$').collect();
    let bytes = cleaned.as_bytes();
    let split = bytes
        .iter()
        .position(|b| b.is_ascii_digit())
        .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
    if split == 0 {
        return Err(Error::InvalidReference(reference.to_string()));
    }

    let col = column_name_to_index(&cleaned[..split])
        .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
    let row: u32 = atoi_simd::parse::<u32, false, false>(&bytes[split..])
        .map_err(|_| Error::InvalidReference(reference.to_string()))?;
    if row == 0 {
        return Err(Error::InvalidReference(reference.to_string()));
    }
    Ok((row - 1, col))
}

/// Parse only the column part of a reference such as `C7`.
pub fn parse_column(reference: &str) -> Result<u32> {
    let letters: String = reference
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();
    column_name_to_index(&letters).ok_or_else(|| Error::InvalidReference(reference.to_string()))
}
