//! Converter registry: bridges between native values and cell data.
//!
//! Every supported (native type, cell type) pair has a default converter;
//! sessions can register their own converters on top, and record fields can
//! carry a per-field override.

pub mod builtin;
pub mod record;
pub mod registry;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use builtin::{DefaultConverter, default_write_cell_type};
pub use record::{ExcelRecord, FieldDescriptor, FieldValues, FromNative, RecordSchema, schema_of};
pub use registry::ConverterRegistry;
pub use traits::Converter;
pub use types::{ConversionContext, NativeType, NativeValue};
