//! Unified error types for sheetflow.
//!
//! The variants follow the failure taxonomy of the engines: detection,
//! conversion, configuration, cooperative stop and I/O, plus the errors
//! raised at the container boundary.
use thiserror::Error;

use crate::converter::NativeType;
use crate::model::CellDataType;

/// Main error type for sheetflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized or corrupt container
    #[error("Unrecognized workbook format: {0}")]
    FormatDetection(String),

    /// A cell or value failed to convert
    #[error("Conversion error at row {row:?}, column {column:?}: {message}")]
    Conversion {
        row: Option<u32>,
        column: Option<u32>,
        message: String,
    },

    /// No converter registered for the requested pair
    #[error("No converter for {native:?} <-> {cell:?}")]
    ConverterNotFound {
        native: NativeType,
        cell: Option<CellDataType>,
    },

    /// Invalid or contradictory options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cooperative early termination requested by a listener
    #[error("Analysis stopped by listener")]
    AnalysisStop,

    /// Corrupted or malformed container data
    #[error("Corrupted file: {0}")]
    Corrupted(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// Delimited text error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Invalid A1-style reference
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a conversion error without position information.
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion {
            row: None,
            column: None,
            message: message.into(),
        }
    }

    /// Attach a cell position to a conversion error; other errors pass through.
    pub fn at(self, row: u32, column: u32) -> Self {
        match self {
            Error::Conversion { message, .. } => Error::Conversion {
                row: Some(row),
                column: Some(column),
                message,
            },
            other => other,
        }
    }

    /// Whether this error belongs to the conversion family.
    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion { .. } | Error::ConverterNotFound { .. })
    }

    /// Whether this error always aborts a session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::FormatDetection(_) | Error::Corrupted(_) | Error::Zip(_)
        )
    }
}

/// Result type for sheetflow operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_position() {
        let err = Error::conversion("bad number").at(3, 2);
        match err {
            Error::Conversion { row, column, .. } => {
                assert_eq!(row, Some(3));
                assert_eq!(column, Some(2));
            },
            other => panic!("unexpected error: {other:?}"),
        }

        let io = Error::Io(std::io::Error::other("boom")).at(1, 1);
        assert!(io.is_fatal());
        assert!(!io.is_conversion());
    }

    #[test]
    fn test_not_found_is_conversion() {
        let err = Error::ConverterNotFound {
            native: NativeType::Integer,
            cell: Some(CellDataType::Error),
        };
        assert!(err.is_conversion());
        assert!(!err.is_fatal());
    }
}
