//! Out-of-band sheet metadata: comments, hyperlinks and merged regions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::CellRange;

bitflags! {
    /// Set of extra event kinds a read session asks for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ExtraType: u8 {
        const COMMENT = 0b0000_0001;
        const HYPERLINK = 0b0000_0010;
        const MERGE = 0b0000_0100;
    }
}

/// Kind of a single extra event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtraKind {
    Comment,
    Hyperlink,
    Merge,
}

impl ExtraKind {
    /// The flag selecting this kind.
    pub fn flag(self) -> ExtraType {
        match self {
            ExtraKind::Comment => ExtraType::COMMENT,
            ExtraKind::Hyperlink => ExtraType::HYPERLINK,
            ExtraKind::Merge => ExtraType::MERGE,
        }
    }
}

/// One extra event anchored to a cell range.
///
/// `text` is the comment body or hyperlink target; merges carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct CellExtra {
    pub kind: ExtraKind,
    pub text: Option<String>,
    pub range: CellRange,
}

impl CellExtra {
    pub fn comment(row: u32, column: u32, text: impl Into<String>) -> Self {
        Self {
            kind: ExtraKind::Comment,
            text: Some(text.into()),
            range: CellRange::new(row, row, column, column),
        }
    }

    pub fn hyperlink(range: CellRange, target: impl Into<String>) -> Self {
        Self {
            kind: ExtraKind::Hyperlink,
            text: Some(target.into()),
            range,
        }
    }

    pub fn merge(range: CellRange) -> Self {
        Self {
            kind: ExtraKind::Merge,
            text: None,
            range,
        }
    }

    pub fn first_row(&self) -> u32 {
        self.range.first_row
    }

    pub fn first_column(&self) -> u32 {
        self.range.first_col
    }
}
