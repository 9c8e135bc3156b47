//! Converter lookup keyed by (native type, cell type).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::builtin::{DEFAULT_PAIRS, DefaultConverter, default_write_cell_type};
use super::traits::Converter;
use super::types::NativeType;
use crate::common::{Error, Result};
use crate::model::CellDataType;

static DEFAULT_REGISTRY: Lazy<ConverterRegistry> = Lazy::new(|| {
    let mut registry = ConverterRegistry::new();
    for &(native, cell) in DEFAULT_PAIRS {
        registry
            .pairs
            .insert((native, cell), Arc::new(DefaultConverter::new(native, cell)));
    }
    for native in [
        NativeType::String,
        NativeType::Boolean,
        NativeType::Integer,
        NativeType::Float,
        NativeType::DateTime,
        NativeType::Date,
    ] {
        let cell = default_write_cell_type(native);
        registry
            .write_defaults
            .insert(native, Arc::new(DefaultConverter::new(native, cell)));
    }
    registry
});

/// Converter lookup table.
///
/// Cloning is cheap (converters are shared) and is how scopes snapshot their
/// parent's converters.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    pairs: HashMap<(NativeType, CellDataType), Arc<dyn Converter>>,
    write_defaults: HashMap<NativeType, Arc<dyn Converter>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.pairs.keys().collect();
        keys.sort();
        f.debug_struct("ConverterRegistry")
            .field("pairs", &keys)
            .finish()
    }
}

impl ConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every default converter.
    pub fn with_defaults() -> Self {
        DEFAULT_REGISTRY.clone()
    }

    /// Register a converter for its (native, cell) pair and as the write
    /// default of its native type. Later registrations replace earlier ones.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        let native = converter.native_type();
        let cell = converter.cell_type();
        self.pairs.insert((native, cell), Arc::clone(&converter));
        self.write_defaults.insert(native, converter);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Converter reading `observed` cells into `native` values.
    ///
    /// Inline strings fall back to the plain string converter.
    pub fn resolve_for_read(
        &self,
        native: NativeType,
        observed: CellDataType,
    ) -> Result<Arc<dyn Converter>> {
        self.pairs
            .get(&(native, observed))
            .or_else(|| match observed {
                CellDataType::DirectString => self.pairs.get(&(native, CellDataType::String)),
                _ => None,
            })
            .cloned()
            .ok_or(Error::ConverterNotFound {
                native,
                cell: Some(observed),
            })
    }

    /// Converter writing `native` values, into `declared` cells when given or
    /// the type's default cell kind otherwise.
    pub fn resolve_for_write(
        &self,
        native: NativeType,
        declared: Option<CellDataType>,
    ) -> Result<Arc<dyn Converter>> {
        let found = match declared {
            Some(cell) => self.pairs.get(&(native, cell)),
            None => self.write_defaults.get(&native),
        };
        found.cloned().ok_or(Error::ConverterNotFound {
            native,
            cell: declared,
        })
    }
}
