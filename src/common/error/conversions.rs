//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from
//! collaborator error types to the unified Error type.

use super::types::Error;

#[cfg(feature = "xlsx")]
impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

#[cfg(feature = "xlsx")]
impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}

#[cfg(feature = "xlsx")]
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(e) => Error::Io(e),
                other => Error::Csv(format!("{other:?}")),
            }
        } else {
            Error::Csv(err.to_string())
        }
    }
}

#[cfg(feature = "xls")]
impl From<crate::common::binary::BinaryError> for Error {
    fn from(err: crate::common::binary::BinaryError) -> Self {
        Error::Corrupted(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Corrupted(err.to_string())
    }
}
