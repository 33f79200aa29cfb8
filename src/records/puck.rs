use serde::Serialize;

use super::optional_str;
use crate::error::{ConfigError, ConfigResult};
use crate::files::is_unset;
use crate::schema::FieldMap;

/// A spatial capture surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Puck {
    pub name: String,
    pub width_um: Option<f64>,
    pub spot_diameter_um: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcodes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate_system: Option<String>,
}

impl Puck {
    /// A puck with no settings, used when a sample names an unknown puck.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width_um: None,
            spot_diameter_um: None,
            barcodes: None,
            coordinate_system: None,
        }
    }

    pub fn from_fields(name: &str, fields: &FieldMap) -> ConfigResult<Self> {
        let float = |field: &str| -> ConfigResult<Option<f64>> {
            match fields.get(field) {
                None => Ok(None),
                Some(value) => value
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| ConfigError::invalid_value(field, "a number", value)),
            }
        };

        Ok(Self {
            name: name.to_string(),
            width_um: float("width_um")?,
            spot_diameter_um: float("spot_diameter_um")?,
            barcodes: optional_str(fields, "barcodes"),
            coordinate_system: optional_str(fields, "coordinate_system"),
        })
    }

    /// True if a barcode file is set and is not the `None` placeholder.
    pub fn has_barcodes(&self) -> bool {
        self.barcodes.as_deref().is_some_and(|p| !is_unset(p))
    }

    pub fn has_coordinate_system(&self) -> bool {
        self.coordinate_system.as_deref().is_some_and(|p| !is_unset(p))
    }
}
