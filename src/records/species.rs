use serde::Serialize;

use super::{optional_str, required_str};
use crate::error::ConfigResult;
use crate::files::is_unset;
use crate::schema::{Category, FieldMap};

/// One named reference (genome, rRNA, ...) of a species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesReference {
    pub species: String,
    pub reference: String,
    pub sequence: String,
    pub annotation: Option<String>,
    #[serde(rename = "STAR_index_dir", skip_serializing_if = "Option::is_none")]
    pub star_index_dir: Option<String>,
    #[serde(rename = "BT2_index", skip_serializing_if = "Option::is_none")]
    pub bt2_index: Option<String>,
    #[serde(rename = "BT2_flags", skip_serializing_if = "Option::is_none")]
    pub bt2_flags: Option<String>,
    #[serde(rename = "STAR_flags", skip_serializing_if = "Option::is_none")]
    pub star_flags: Option<String>,
}

impl SpeciesReference {
    pub fn from_fields(species: &str, reference: &str, fields: &FieldMap) -> ConfigResult<Self> {
        let set = |field: &str| optional_str(fields, field).filter(|v| !is_unset(v));
        Ok(Self {
            species: species.to_string(),
            reference: reference.to_string(),
            sequence: required_str(
                Category::Species,
                &format!("{}.{}", species, reference),
                fields,
                "sequence",
            )?,
            annotation: set("annotation"),
            star_index_dir: set("STAR_index_dir"),
            bt2_index: set("BT2_index"),
            bt2_flags: set("BT2_flags"),
            star_flags: set("STAR_flags"),
        })
    }

    pub fn has_annotation(&self) -> bool {
        self.annotation.is_some()
    }
}
