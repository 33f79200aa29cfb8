//! Typed records for pucks, barcode flavors and species references.
//!
//! Registries store loosely typed field maps; callers that consume a
//! variable go through these records instead.

mod barcode_flavor;
mod puck;
mod species;

pub use barcode_flavor::BarcodeFlavor;
pub use puck::Puck;
pub use species::SpeciesReference;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Category, FieldMap, FieldValue};

fn required_str(category: Category, name: &str, fields: &FieldMap, field: &str) -> ConfigResult<String> {
    optional_str(fields, field).ok_or_else(|| ConfigError::MissingRequiredField {
        category,
        name: name.to_string(),
        field: field.to_string(),
    })
}

fn optional_str(fields: &FieldMap, field: &str) -> Option<String> {
    fields.get(field).and_then(FieldValue::as_str).map(str::to_string)
}
