use serde::Serialize;
use spacemake_barcode::BarcodeStructure;

use super::required_str;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Category, FieldMap, BAM_TAGS_TEMPLATE};

/// Cell barcode and UMI extraction rules of a library preparation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarcodeFlavor {
    pub name: String,
    pub cell: BarcodeStructure,
    #[serde(rename = "UMI")]
    pub umi: BarcodeStructure,
    pub bam_tags: String,
}

impl BarcodeFlavor {
    pub fn from_fields(name: &str, fields: &FieldMap) -> ConfigResult<Self> {
        let structure = |field: &str| -> ConfigResult<BarcodeStructure> {
            let expression = required_str(Category::BarcodeFlavor, name, fields, field)?;
            BarcodeStructure::parse(&expression).map_err(|source| {
                ConfigError::InvalidBarcodeStructure {
                    field: field.to_string(),
                    source,
                }
            })
        };

        Ok(Self {
            name: name.to_string(),
            cell: structure("cell")?,
            umi: structure("UMI")?,
            bam_tags: super::optional_str(fields, "bam_tags")
                .unwrap_or_else(|| BAM_TAGS_TEMPLATE.to_string()),
        })
    }

    /// Extract `(cell, umi)` from a read pair.
    pub fn extract(&self, r1: &[u8], r2: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (self.cell.extract(r1, r2), self.umi.extract(r1, r2))
    }
}
