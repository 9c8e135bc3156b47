//! Record binding: field descriptor tables and value extraction.
//!
//! A record type describes its columns once through [`ExcelRecord::schema`];
//! the table is cached per type and reused by every read and write.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::traits::Converter;
use super::types::{NativeType, NativeValue};
use crate::common::{Error, Result};
use crate::model::CellDataType;
use crate::model::style::CellStyle;

/// Column binding of one record field.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub native_type: NativeType,
    /// Fixed column, if any
    pub index: Option<u32>,
    /// Header label path; when set the field is matched by name on read
    pub labels: Vec<String>,
    pub converter: Option<Arc<dyn Converter>>,
    pub format: Option<String>,
    pub cell_type: Option<CellDataType>,
    pub style: Option<CellStyle>,
    pub ignore: bool,
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("native_type", &self.native_type)
            .field("index", &self.index)
            .field("labels", &self.labels)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl FieldDescriptor {
    pub fn new(name: &'static str, native_type: NativeType) -> Self {
        Self {
            name,
            native_type,
            index: None,
            labels: Vec::new(),
            converter: None,
            format: None,
            cell_type: None,
            style: None,
            ignore: false,
        }
    }

    pub fn index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn header<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn format(mut self, pattern: impl Into<String>) -> Self {
        self.format = Some(pattern.into());
        self
    }

    pub fn cell_type(mut self, cell_type: CellDataType) -> Self {
        self.cell_type = Some(cell_type);
        self
    }

    pub fn style(mut self, style: CellStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Ordered field table of a record type.
#[derive(Debug, Clone, Default)]
pub struct RecordSchema {
    fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A type that maps to one spreadsheet row.
pub trait ExcelRecord: Sized + 'static {
    /// Field table; built once per type.
    fn schema() -> RecordSchema;

    /// Field values in declaration order.
    fn to_fields(&self) -> Vec<(&'static str, NativeValue)>;

    /// Assemble a record from converted field values.
    fn from_fields(fields: &mut FieldValues) -> Result<Self>;
}

static SCHEMA_CACHE: Lazy<RwLock<HashMap<TypeId, Arc<RecordSchema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Cached schema of a record type.
pub fn schema_of<T: ExcelRecord>() -> Arc<RecordSchema> {
    let key = TypeId::of::<T>();
    if let Some(schema) = SCHEMA_CACHE.read().get(&key) {
        return Arc::clone(schema);
    }
    let mut cache = SCHEMA_CACHE.write();
    Arc::clone(cache.entry(key).or_insert_with(|| Arc::new(T::schema())))
}

/// Converted values of one row, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    values: HashMap<String, NativeValue>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: NativeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take a field's value out as `T`.
    pub fn take<T: FromNative>(&mut self, name: &str) -> Result<T> {
        match self.values.remove(name) {
            Some(value) => T::from_native(value).map_err(|e| match e {
                Error::Conversion { row, column, message } => Error::Conversion {
                    row,
                    column,
                    message: format!("field '{name}': {message}"),
                },
                other => other,
            }),
            None => T::missing(name),
        }
    }

    /// Take a field's value, falling back to `T::default()` when absent.
    pub fn take_or_default<T: FromNative + Default>(&mut self, name: &str) -> Result<T> {
        match self.values.contains_key(name) {
            true => self.take(name),
            false => Ok(T::default()),
        }
    }
}

/// Extraction of a Rust value from a [`NativeValue`].
pub trait FromNative: Sized {
    fn from_native(value: NativeValue) -> Result<Self>;

    /// Value used when the row has no cell for the field.
    fn missing(field: &str) -> Result<Self> {
        Err(Error::conversion(format!("no value for field '{field}'")))
    }
}

fn mismatch<T>(expected: &str, value: &NativeValue) -> Result<T> {
    Err(Error::conversion(format!(
        "expected {expected}, found {:?}",
        value.native_type()
    )))
}

impl FromNative for NativeValue {
    fn from_native(value: NativeValue) -> Result<Self> {
        Ok(value)
    }

    fn missing(_field: &str) -> Result<Self> {
        Ok(NativeValue::Null)
    }
}

impl FromNative for String {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value {
            NativeValue::String(s) => Ok(s),
            other => mismatch("string", &other),
        }
    }
}

impl FromNative for bool {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value {
            NativeValue::Boolean(b) => Ok(b),
            other => mismatch("boolean", &other),
        }
    }
}

impl FromNative for i64 {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value.coerce(NativeType::Integer) {
            Some(NativeValue::Integer(i)) => Ok(i),
            _ => mismatch("integer", &value),
        }
    }
}

impl FromNative for i32 {
    fn from_native(value: NativeValue) -> Result<Self> {
        let wide = i64::from_native(value)?;
        i32::try_from(wide).map_err(|_| Error::conversion(format!("{wide} overflows i32")))
    }
}

impl FromNative for u32 {
    fn from_native(value: NativeValue) -> Result<Self> {
        let wide = i64::from_native(value)?;
        u32::try_from(wide).map_err(|_| Error::conversion(format!("{wide} overflows u32")))
    }
}

impl FromNative for f64 {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value.coerce(NativeType::Float) {
            Some(NativeValue::Float(f)) => Ok(f),
            _ => mismatch("float", &value),
        }
    }
}

impl FromNative for NaiveDateTime {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value.coerce(NativeType::DateTime) {
            Some(NativeValue::DateTime(dt)) => Ok(dt),
            _ => mismatch("date-time", &value),
        }
    }
}

impl FromNative for NaiveDate {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value {
            NativeValue::Date(d) => Ok(d),
            NativeValue::DateTime(dt) => Ok(dt.date()),
            other => mismatch("date", &other),
        }
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn from_native(value: NativeValue) -> Result<Self> {
        match value {
            NativeValue::Null => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }

    fn missing(_field: &str) -> Result<Self> {
        Ok(None)
    }
}
