//! Fill inputs and settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::template::ListBinding;
use crate::converter::NativeValue;
use crate::converter::record::ExcelRecord;

/// Direction list elements grow in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillDirection {
    /// One row per element
    #[default]
    Vertical,
    /// One column per element
    Horizontal,
}

/// Settings of one fill call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    pub direction: FillDirection,
    /// Insert a fresh row (or column) per element instead of writing over
    /// whatever lies below the list
    pub force_new_row: bool,
}

impl FillConfig {
    pub fn vertical() -> Self {
        Self::default()
    }

    pub fn horizontal() -> Self {
        Self {
            direction: FillDirection::Horizontal,
            ..Self::default()
        }
    }

    pub fn with_force_new_row(mut self, force: bool) -> Self {
        self.force_new_row = force;
        self
    }
}

/// One element of a list fill: a bare value for `{prefix.}` or named fields
/// for `{prefix.field}`.
#[derive(Debug, Clone, PartialEq)]
pub enum FillElement {
    Value(NativeValue),
    Fields(BTreeMap<String, NativeValue>),
}

impl FillElement {
    /// Element built from a record's fields.
    pub fn record<T: ExcelRecord>(record: &T) -> Self {
        FillElement::Fields(
            record
                .to_fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub(crate) fn value(&self, binding: ListBinding<'_>) -> Option<&NativeValue> {
        match (self, binding) {
            (FillElement::Value(value), ListBinding::Element) => Some(value),
            (FillElement::Fields(fields), ListBinding::Field(name)) => fields.get(name),
            _ => None,
        }
    }
}

impl From<NativeValue> for FillElement {
    fn from(value: NativeValue) -> Self {
        FillElement::Value(value)
    }
}

impl From<BTreeMap<String, NativeValue>> for FillElement {
    fn from(fields: BTreeMap<String, NativeValue>) -> Self {
        FillElement::Fields(fields)
    }
}

/// A named collection, bound to `{name.}` and `{name.field}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct FillWrapper {
    pub name: Option<String>,
    pub items: Vec<FillElement>,
}

impl FillWrapper {
    pub fn new<I, E>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FillElement>,
    {
        Self {
            name: Some(name.into()),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Collection bound to unprefixed `{.field}` placeholders.
    pub fn unnamed<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FillElement>,
    {
        Self {
            name: None,
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Data of one fill call.
#[derive(Debug, Clone, PartialEq)]
pub enum FillData {
    /// Values for scalar `{name}` placeholders
    Map(BTreeMap<String, NativeValue>),
    /// Elements for unprefixed list placeholders
    List(Vec<FillElement>),
    Wrapper(FillWrapper),
}

impl FillData {
    pub fn map<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NativeValue>,
    {
        FillData::Map(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FillElement>,
    {
        FillData::List(items.into_iter().map(Into::into).collect())
    }

    pub fn wrapper(wrapper: FillWrapper) -> Self {
        FillData::Wrapper(wrapper)
    }
}
