//! Typed view of a resolved run mode.

use std::fmt;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Category, FieldMap, FieldValue};

/// Shape of the spots of a meshed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshType {
    Circle,
    Hexagon,
}

impl fmt::Display for MeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshType::Circle => f.write_str("circle"),
            MeshType::Hexagon => f.write_str("hexagon"),
        }
    }
}

/// Analysis parameters of a run mode after inheritance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_mode: Option<String>,
    pub n_beads: i64,
    pub umi_cutoff: Vec<i64>,
    pub clean_dge: bool,
    pub detect_tissue: bool,
    #[serde(rename = "polyA_adapter_trimming")]
    pub polya_adapter_trimming: bool,
    pub count_mm_reads: bool,
    pub count_intronic_reads: bool,
    pub mesh_data: bool,
    pub mesh_type: MeshType,
    pub mesh_spot_diameter_um: f64,
    pub mesh_spot_distance_um: f64,
    pub spatial_barcode_min_matches: f64,
}

impl RunMode {
    /// Build from a fully resolved field mapping.
    pub fn from_fields(name: &str, fields: &FieldMap) -> ConfigResult<Self> {
        let lookup = Lookup { name, fields };

        let mesh_type = match lookup.str("mesh_type")? {
            "circle" => MeshType::Circle,
            "hexagon" => MeshType::Hexagon,
            other => {
                return Err(ConfigError::invalid_value(
                    "mesh_type",
                    "one of circle, hexagon",
                    other,
                ))
            }
        };

        Ok(Self {
            name: name.to_string(),
            parent_run_mode: fields
                .get(super::PARENT_FIELD)
                .and_then(FieldValue::as_str)
                .map(str::to_string),
            n_beads: lookup.int("n_beads")?,
            umi_cutoff: lookup.int_list("umi_cutoff")?,
            clean_dge: lookup.bool("clean_dge")?,
            detect_tissue: lookup.bool("detect_tissue")?,
            polya_adapter_trimming: lookup.bool("polyA_adapter_trimming")?,
            count_mm_reads: lookup.bool("count_mm_reads")?,
            count_intronic_reads: lookup.bool("count_intronic_reads")?,
            mesh_data: lookup.bool("mesh_data")?,
            mesh_type,
            mesh_spot_diameter_um: lookup.float("mesh_spot_diameter_um")?,
            mesh_spot_distance_um: lookup.float("mesh_spot_distance_um")?,
            spatial_barcode_min_matches: lookup.float("spatial_barcode_min_matches")?,
        })
    }
}

struct Lookup<'a> {
    name: &'a str,
    fields: &'a FieldMap,
}

impl<'a> Lookup<'a> {
    fn get(&self, field: &str) -> ConfigResult<&'a FieldValue> {
        self.fields
            .get(field)
            .ok_or_else(|| ConfigError::MissingRequiredField {
                category: Category::RunMode,
                name: self.name.to_string(),
                field: field.to_string(),
            })
    }

    fn typed<T>(
        &self,
        field: &str,
        expected: &str,
        convert: impl FnOnce(&'a FieldValue) -> Option<T>,
    ) -> ConfigResult<T> {
        let value = self.get(field)?;
        convert(value).ok_or_else(|| ConfigError::invalid_value(field, expected, value))
    }

    fn str(&self, field: &str) -> ConfigResult<&'a str> {
        self.typed(field, "a string", FieldValue::as_str)
    }

    fn bool(&self, field: &str) -> ConfigResult<bool> {
        self.typed(field, "a boolean", FieldValue::as_bool)
    }

    fn int(&self, field: &str) -> ConfigResult<i64> {
        self.typed(field, "an integer", FieldValue::as_i64)
    }

    fn float(&self, field: &str) -> ConfigResult<f64> {
        self.typed(field, "a number", FieldValue::as_f64)
    }

    fn int_list(&self, field: &str) -> ConfigResult<Vec<i64>> {
        self.typed(field, "a list of integers", |v| v.as_int_list().map(<[i64]>::to_vec))
    }
}
