//! Column heads and header resolution.
//!
//! An [`ExcelHeadProperty`] binds columns to record fields or to plain label
//! paths. Heads are declared once, then resolved against a concrete header
//! row when reading, or filtered and laid out when writing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use log::debug;
use smallvec::SmallVec;

use crate::common::{CellRange, Error, Result};
use crate::converter::record::{FieldDescriptor, RecordSchema};
use crate::converter::{Converter, NativeType};
use crate::model::CellDataType;
use crate::model::style::CellStyle;

/// How a head found its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadBinding {
    /// Fixed column declared on the field
    ByIndex,
    /// Matched against header text
    ByName,
    /// Next free column in declaration order
    Positional,
}

/// One column binding.
#[derive(Clone)]
pub struct Head {
    pub field_name: Option<String>,
    /// Header label path, one entry per header row
    pub labels: SmallVec<[String; 2]>,
    pub column_index: u32,
    pub binding: HeadBinding,
    pub native_type: Option<NativeType>,
    pub converter: Option<Arc<dyn Converter>>,
    pub format: Option<String>,
    pub cell_type: Option<CellDataType>,
    pub style: Option<CellStyle>,
}

impl fmt::Debug for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Head")
            .field("field_name", &self.field_name)
            .field("labels", &self.labels)
            .field("column_index", &self.column_index)
            .field("binding", &self.binding)
            .field("native_type", &self.native_type)
            .field("custom_converter", &self.converter.is_some())
            .finish()
    }
}

impl Head {
    /// A positional head carrying only labels.
    pub fn labelled<I, S>(column_index: u32, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_name: None,
            labels: labels.into_iter().map(Into::into).collect(),
            column_index,
            binding: HeadBinding::Positional,
            native_type: None,
            converter: None,
            format: None,
            cell_type: None,
            style: None,
        }
    }

    fn from_field(field: &FieldDescriptor) -> Self {
        let labels: SmallVec<[String; 2]> = if field.labels.is_empty() {
            SmallVec::from_iter([field.name.to_string()])
        } else {
            field.labels.iter().cloned().collect()
        };
        Self {
            field_name: Some(field.name.to_string()),
            labels,
            column_index: field.index.unwrap_or(0),
            binding: if field.labels.is_empty() {
                HeadBinding::Positional
            } else {
                HeadBinding::ByName
            },
            native_type: Some(field.native_type),
            converter: field.converter.clone(),
            format: field.format.clone(),
            cell_type: field.cell_type,
            style: field.style.clone(),
        }
    }

    /// Label matched against the innermost header row.
    pub fn leaf_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }
}

/// Header text normalization used for name matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch {
    Exact,
    /// Trim leading and trailing whitespace
    Trim,
    /// Remove every whitespace character
    StripAll,
}

impl HeaderMatch {
    pub fn from_flags(auto_trim: bool, auto_strip: bool) -> Self {
        if auto_strip {
            HeaderMatch::StripAll
        } else if auto_trim {
            HeaderMatch::Trim
        } else {
            HeaderMatch::Exact
        }
    }

    pub fn normalize(self, text: &str) -> String {
        match self {
            HeaderMatch::Exact => text.to_string(),
            HeaderMatch::Trim => text.trim().to_string(),
            HeaderMatch::StripAll => text.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

/// Include/exclude column selection for writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilter {
    pub include_indexes: Vec<u32>,
    pub include_names: Vec<String>,
    pub exclude_indexes: Vec<u32>,
    pub exclude_names: Vec<String>,
    pub order_by_include_column: bool,
}

impl ColumnFilter {
    fn has_include(&self) -> bool {
        !self.include_indexes.is_empty() || !self.include_names.is_empty()
    }

    fn has_exclude(&self) -> bool {
        !self.exclude_indexes.is_empty() || !self.exclude_names.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_include() && !self.has_exclude()
    }

    /// Reject filters that both include and exclude columns.
    pub fn validate(&self) -> Result<()> {
        if self.has_include() && self.has_exclude() {
            return Err(Error::Configuration(
                "include and exclude column filters cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    fn include_position(&self, head: &Head) -> Option<usize> {
        if let Some(name) = &head.field_name
            && let Some(pos) = self.include_names.iter().position(|n| n == name)
        {
            return Some(pos);
        }
        self.include_indexes
            .iter()
            .position(|i| *i == head.column_index)
    }

    fn keeps(&self, head: &Head) -> bool {
        if self.has_include() {
            return self.include_position(head).is_some();
        }
        let excluded_name = head
            .field_name
            .as_ref()
            .is_some_and(|name| self.exclude_names.contains(name));
        !excluded_name && !self.exclude_indexes.contains(&head.column_index)
    }
}

/// Where the heads came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    /// No declared heads; rows bind positionally
    None,
    /// Plain label lists
    Labels,
    /// Fields of a record schema
    Record,
}

/// Ordered map of column index to head.
#[derive(Debug, Clone)]
pub struct ExcelHeadProperty {
    kind: HeadKind,
    declared: Vec<Head>,
    heads: BTreeMap<u32, Head>,
}

impl Default for ExcelHeadProperty {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExcelHeadProperty {
    pub fn empty() -> Self {
        Self {
            kind: HeadKind::None,
            declared: Vec::new(),
            heads: BTreeMap::new(),
        }
    }

    /// Build heads from label paths, one path per column in order.
    pub fn from_labels(paths: &[Vec<String>]) -> Self {
        let declared: Vec<Head> = paths
            .iter()
            .enumerate()
            .map(|(i, path)| Head::labelled(i as u32, path.iter().cloned()))
            .collect();
        let mut property = Self {
            kind: HeadKind::Labels,
            declared,
            heads: BTreeMap::new(),
        };
        property.reset();
        property
    }

    /// Build heads from a record schema.
    ///
    /// Fields with an explicit index take that column; a repeated index falls
    /// back to the free-column rule. Remaining fields take the lowest free
    /// column in declaration order. Ignored fields produce no head.
    pub fn from_schema(schema: &RecordSchema) -> Self {
        let mut taken = BTreeSet::new();
        let mut declared = Vec::new();
        let mut floating = Vec::new();

        for field in schema.fields().iter().filter(|f| !f.ignore) {
            let mut head = Head::from_field(field);
            match field.index {
                Some(index) if taken.insert(index) => {
                    head.column_index = index;
                    head.binding = HeadBinding::ByIndex;
                },
                Some(index) => {
                    debug!("column {} already bound, field '{}' floats", index, field.name);
                    floating.push(declared.len());
                },
                None => floating.push(declared.len()),
            }
            declared.push(head);
        }

        let mut next = 0u32;
        for position in floating {
            while taken.contains(&next) {
                next += 1;
            }
            declared[position].column_index = next;
            taken.insert(next);
        }

        let mut property = Self {
            kind: HeadKind::Record,
            declared,
            heads: BTreeMap::new(),
        };
        property.reset();
        property
    }

    fn reset(&mut self) {
        self.heads = self
            .declared
            .iter()
            .map(|h| (h.column_index, h.clone()))
            .collect();
    }

    pub fn kind(&self) -> HeadKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Resolved heads keyed by column.
    pub fn heads(&self) -> &BTreeMap<u32, Head> {
        &self.heads
    }

    pub fn head(&self, column: u32) -> Option<&Head> {
        self.heads.get(&column)
    }

    /// Head bound to a field name.
    pub fn head_for_field(&self, name: &str) -> Option<&Head> {
        self.heads
            .values()
            .find(|h| h.field_name.as_deref() == Some(name))
    }

    pub fn max_column(&self) -> Option<u32> {
        self.heads.keys().next_back().copied()
    }

    /// Resolve name-bound heads against one header row.
    ///
    /// Resolution always starts from the declared heads, so repeating it with
    /// the same header row yields the same mapping. Columns held by index or
    /// positional heads are never reassigned; among equal header texts the
    /// leftmost unclaimed column wins. Heads without a match stay unmapped.
    pub fn resolve_by_name(&mut self, header: &BTreeMap<u32, String>, policy: HeaderMatch) {
        let mut heads: BTreeMap<u32, Head> = self
            .declared
            .iter()
            .filter(|h| h.binding != HeadBinding::ByName)
            .map(|h| (h.column_index, h.clone()))
            .collect();

        let normalized: Vec<(u32, String)> = header
            .iter()
            .map(|(col, text)| (*col, policy.normalize(text)))
            .collect();

        for head in self.declared.iter().filter(|h| h.binding == HeadBinding::ByName) {
            let Some(label) = head.leaf_label() else {
                continue;
            };
            let target = policy.normalize(label);
            let mut matched = None;
            for (col, text) in &normalized {
                if heads.contains_key(col) || *text != target {
                    continue;
                }
                if matched.is_none() {
                    matched = Some(*col);
                } else {
                    debug!("duplicate header '{}' at column {}, keeping first", target, col);
                }
            }
            match matched {
                Some(col) => {
                    let mut resolved = head.clone();
                    resolved.column_index = col;
                    heads.insert(col, resolved);
                },
                None => debug!("header '{}' not found, field left unmapped", target),
            }
        }
        self.heads = heads;
    }

    /// Apply an include/exclude filter and lay the kept heads out in
    /// consecutive columns starting at 0.
    ///
    /// Returns where each kept column moved to.
    pub fn apply_filter(&mut self, filter: &ColumnFilter) -> Result<BTreeMap<u32, u32>> {
        filter.validate()?;
        if filter.is_empty() {
            return Ok(self.heads.keys().map(|c| (*c, *c)).collect());
        }
        let mut kept: Vec<Head> = self
            .heads
            .values()
            .filter(|h| filter.keeps(h))
            .cloned()
            .collect();
        if filter.order_by_include_column && filter.has_include() {
            kept.sort_by_key(|h| filter.include_position(h).unwrap_or(usize::MAX));
        }
        let mut moved = BTreeMap::new();
        for (i, head) in kept.iter_mut().enumerate() {
            moved.insert(head.column_index, i as u32);
            head.column_index = i as u32;
        }
        self.declared = kept;
        self.reset();
        Ok(moved)
    }

    /// Number of header rows: the depth of the longest label path.
    pub fn head_row_count(&self) -> usize {
        self.heads.values().map(|h| h.labels.len()).max().unwrap_or(0)
    }

    /// Header labels as a grid of `head_row_count` rows, one entry per head
    /// in column order. Shorter paths repeat their last label.
    pub fn label_grid(&self) -> Vec<Vec<(u32, String)>> {
        let depth = self.head_row_count();
        (0..depth)
            .map(|row| {
                self.heads
                    .values()
                    .map(|h| {
                        let label = h
                            .labels
                            .get(row)
                            .or_else(|| h.labels.last())
                            .cloned()
                            .unwrap_or_default();
                        (h.column_index, label)
                    })
                    .collect()
            })
            .collect()
    }

    /// Regions of equal adjacent header labels, relative to the first header
    /// row. Each region grows right first, then down.
    pub fn merge_ranges(&self) -> Vec<CellRange> {
        let grid = self.label_grid();
        let rows = grid.len();
        let cols = grid.first().map_or(0, Vec::len);
        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        let mut ranges = Vec::new();

        for row in 0..rows {
            for col in 0..cols {
                if visited.contains(&(row, col)) {
                    continue;
                }
                let label = &grid[row][col].1;
                let adjacent = |a: usize, b: usize| grid[row][b].0 == grid[row][a].0 + 1;

                let mut last_col = col;
                while last_col + 1 < cols
                    && adjacent(last_col, last_col + 1)
                    && grid[row][last_col + 1].1 == *label
                    && !visited.contains(&(row, last_col + 1))
                {
                    last_col += 1;
                }
                let mut last_row = row;
                while last_row + 1 < rows
                    && (col..=last_col).all(|c| {
                        grid[last_row + 1][c].1 == *label && !visited.contains(&(last_row + 1, c))
                    })
                {
                    last_row += 1;
                }
                for r in row..=last_row {
                    for c in col..=last_col {
                        visited.insert((r, c));
                    }
                }
                if last_row > row || last_col > col {
                    ranges.push(CellRange::new(
                        row as u32,
                        last_row as u32,
                        grid[row][col].0,
                        grid[row][last_col].0,
                    ));
                }
            }
        }
        ranges
    }
}
