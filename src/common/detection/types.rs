//! Workbook format enumeration.

use serde::{Deserialize, Serialize};

/// Physical encodings a workbook can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbookFormat {
    /// Legacy binary workbook (OLE2 compound file, .xls)
    Xls,
    /// OOXML workbook (zip/XML package, .xlsx)
    Xlsx,
    /// Delimited text (.csv, .tsv)
    Csv,
}

impl WorkbookFormat {
    /// Guess a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xls" => Some(WorkbookFormat::Xls),
            "xlsx" | "xlsm" => Some(WorkbookFormat::Xlsx),
            "csv" | "tsv" | "txt" => Some(WorkbookFormat::Csv),
            _ => None,
        }
    }
}
