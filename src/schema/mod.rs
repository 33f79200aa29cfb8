//! Declarative per-category schemas.
//!
//! Every category carries a static table of field name -> [`FieldType`].
//! One generic routine ([`CategorySchema::coerce`]) interprets the table, so
//! all four categories share the same strict validation path.

mod value;

pub use value::{FieldMap, FieldValue};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spacemake_barcode::BarcodeStructure;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Template stored as `bam_tags` on every barcode flavor.
pub const BAM_TAGS_TEMPLATE: &str = "CR:{cell},CB:{cell},MI:{UMI},RG:{assigned}";

/// Name of the entry every default-requiring category must keep.
pub const DEFAULT_NAME: &str = "default";

/// Reference used for species entries when none is given.
pub const DEFAULT_REFERENCE: &str = "genome";

const FASTA_EXTENSIONS: &[&str] = &[".fa", ".fa.gz"];
const GTF_EXTENSIONS: &[&str] = &[".gtf", ".gtf.gz"];
const MESH_TYPES: &[&str] = &["circle", "hexagon"];

/// The four variable categories of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Puck,
    BarcodeFlavor,
    RunMode,
    Species,
}

impl Category {
    /// All categories, in document order.
    pub const ALL: [Category; 4] = [
        Category::Puck,
        Category::BarcodeFlavor,
        Category::RunMode,
        Category::Species,
    ];

    /// Storage key in the document.
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Puck => "pucks",
            Category::BarcodeFlavor => "barcode_flavors",
            Category::RunMode => "run_modes",
            Category::Species => "species",
        }
    }

    /// Display name used in messages and command names.
    pub fn singular(&self) -> &'static str {
        match self {
            Category::Puck => "puck",
            Category::BarcodeFlavor => "barcode_flavor",
            Category::RunMode => "run_mode",
            Category::Species => "species",
        }
    }

    /// Whether the category must always hold an entry named `default`.
    pub fn requires_default(&self) -> bool {
        !matches!(self, Category::Species)
    }

    /// Whether entries are keyed by (name, reference) instead of name.
    pub fn keyed_by_reference(&self) -> bool {
        matches!(self, Category::Species)
    }

    pub fn schema(&self) -> &'static CategorySchema {
        match self {
            Category::Puck => &PUCK_SCHEMA,
            Category::BarcodeFlavor => &BARCODE_FLAVOR_SCHEMA,
            Category::RunMode => &RUN_MODE_SCHEMA,
            Category::Species => &SPECIES_SCHEMA,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    /// Accepts the plural storage key or the singular name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.plural() == s || c.singular() == s)
            .ok_or_else(|| ConfigError::UnrecognisedVariable {
                variable: s.to_string(),
                allowed: Category::ALL.iter().map(|c| c.plural().to_string()).collect(),
            })
    }
}

/// Type tag of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Str,
    IntList,
    StrList,
    /// File path; an empty extension list accepts any file.
    Path(&'static [&'static str]),
    Directory,
    /// String restricted to a fixed set of values.
    Choice(&'static [&'static str]),
    /// Barcode structure expression.
    Structure,
    /// Value is always the given template, whatever the caller passes.
    Fixed(&'static str),
}

impl FieldType {
    pub fn describe(&self) -> String {
        match self {
            FieldType::Int => "an integer".to_string(),
            FieldType::Float => "a number".to_string(),
            FieldType::Bool => "a boolean".to_string(),
            FieldType::Str => "a string".to_string(),
            FieldType::IntList => "a list of integers".to_string(),
            FieldType::StrList => "a list of strings".to_string(),
            FieldType::Path(_) => "a file path".to_string(),
            FieldType::Directory => "a directory path".to_string(),
            FieldType::Choice(choices) => format!("one of {}", choices.join(", ")),
            FieldType::Structure => "a barcode structure expression".to_string(),
            FieldType::Fixed(template) => format!("'{}'", template),
        }
    }

    /// Convert `value` to this type.
    pub fn coerce(&self, field: &str, value: FieldValue) -> ConfigResult<FieldValue> {
        let mismatch = |value: &FieldValue| ConfigError::invalid_value(field, self.describe(), value);

        match self {
            FieldType::Int => match value {
                FieldValue::Int(_) => Ok(value),
                FieldValue::Float(x) if x.fract() == 0.0 => Ok(FieldValue::Int(x as i64)),
                FieldValue::Str(ref s) => s
                    .trim()
                    .parse()
                    .map(FieldValue::Int)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            FieldType::Float => match value {
                FieldValue::Float(_) => Ok(value),
                FieldValue::Int(i) => Ok(FieldValue::Float(i as f64)),
                FieldValue::Str(ref s) => s
                    .trim()
                    .parse()
                    .map(FieldValue::Float)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            FieldType::Bool => match value {
                FieldValue::Bool(_) => Ok(value),
                FieldValue::Int(0) => Ok(FieldValue::Bool(false)),
                FieldValue::Int(1) => Ok(FieldValue::Bool(true)),
                FieldValue::Str(ref s) => str_to_bool(s)
                    .map(FieldValue::Bool)
                    .ok_or_else(|| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            FieldType::Str | FieldType::Path(_) | FieldType::Directory => match value {
                FieldValue::Str(_) => Ok(value),
                FieldValue::Int(i) => Ok(FieldValue::Str(i.to_string())),
                FieldValue::Float(x) => Ok(FieldValue::Str(x.to_string())),
                other => Err(mismatch(&other)),
            },
            FieldType::Choice(choices) => match value {
                FieldValue::Str(ref s) if choices.contains(&s.as_str()) => Ok(value),
                other => Err(mismatch(&other)),
            },
            FieldType::IntList => match value {
                FieldValue::IntList(_) => Ok(value),
                FieldValue::Int(i) => Ok(FieldValue::IntList(vec![i])),
                FieldValue::Str(ref s) => parse_int_list(std::slice::from_ref(s))
                    .map(FieldValue::IntList)
                    .ok_or_else(|| mismatch(&value)),
                FieldValue::StrList(ref items) => parse_int_list(items)
                    .map(FieldValue::IntList)
                    .ok_or_else(|| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            FieldType::StrList => match value {
                FieldValue::StrList(_) => Ok(value),
                FieldValue::Str(s) => Ok(FieldValue::StrList(vec![s])),
                FieldValue::IntList(items) => Ok(FieldValue::StrList(
                    items.iter().map(i64::to_string).collect(),
                )),
                other => Err(mismatch(&other)),
            },
            FieldType::Structure => match value {
                FieldValue::Str(ref s) => BarcodeStructure::parse(s)
                    .map(|_| value.clone())
                    .map_err(|source| ConfigError::InvalidBarcodeStructure {
                        field: field.to_string(),
                        source,
                    }),
                other => Err(mismatch(&other)),
            },
            FieldType::Fixed(template) => Ok(FieldValue::Str(template.to_string())),
        }
    }
}

fn parse_int_list(items: &[String]) -> Option<Vec<i64>> {
    items
        .iter()
        .flat_map(|s| s.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

/// Parse the boolean spellings accepted on the command line.
pub fn str_to_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// One declared field of a category.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// Must be present after `add`.
    pub required: bool,
    /// Filled in on `add` when the caller omits the field.
    pub default: Option<&'static str>,
}

const fn optional(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        required: false,
        default: None,
    }
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        required: true,
        default: None,
    }
}

/// Field table of one category.
#[derive(Debug)]
pub struct CategorySchema {
    pub category: Category,
    pub fields: &'static [FieldSpec],
}

pub static PUCK_SCHEMA: CategorySchema = CategorySchema {
    category: Category::Puck,
    fields: &[
        required("width_um", FieldType::Float),
        required("spot_diameter_um", FieldType::Float),
        optional("barcodes", FieldType::Path(&[])),
        optional("coordinate_system", FieldType::Path(&[])),
    ],
};

pub static BARCODE_FLAVOR_SCHEMA: CategorySchema = CategorySchema {
    category: Category::BarcodeFlavor,
    fields: &[
        required("cell", FieldType::Structure),
        required("UMI", FieldType::Structure),
        optional("bam_tags", FieldType::Fixed(BAM_TAGS_TEMPLATE)),
    ],
};

pub static RUN_MODE_SCHEMA: CategorySchema = CategorySchema {
    category: Category::RunMode,
    fields: &[
        optional("parent_run_mode", FieldType::Str),
        optional("n_beads", FieldType::Int),
        optional("umi_cutoff", FieldType::IntList),
        optional("clean_dge", FieldType::Bool),
        optional("detect_tissue", FieldType::Bool),
        optional("polyA_adapter_trimming", FieldType::Bool),
        optional("count_mm_reads", FieldType::Bool),
        optional("count_intronic_reads", FieldType::Bool),
        optional("mesh_data", FieldType::Bool),
        optional("mesh_type", FieldType::Choice(MESH_TYPES)),
        optional("mesh_spot_diameter_um", FieldType::Float),
        optional("mesh_spot_distance_um", FieldType::Float),
        optional("spatial_barcode_min_matches", FieldType::Float),
    ],
};

pub static SPECIES_SCHEMA: CategorySchema = CategorySchema {
    category: Category::Species,
    fields: &[
        required("sequence", FieldType::Path(FASTA_EXTENSIONS)),
        FieldSpec {
            name: "annotation",
            ty: FieldType::Path(GTF_EXTENSIONS),
            required: false,
            default: Some(""),
        },
        optional("STAR_index_dir", FieldType::Directory),
        optional("BT2_index", FieldType::Str),
        optional("BT2_flags", FieldType::Str),
        optional("STAR_flags", FieldType::Str),
    ],
};

impl CategorySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.to_string()).collect()
    }

    /// Coerce every field; unknown field names are rejected.
    pub fn coerce(&self, fields: FieldMap) -> ConfigResult<FieldMap> {
        fields
            .into_iter()
            .map(|(name, value)| {
                let spec = self
                    .field(&name)
                    .ok_or_else(|| ConfigError::UnrecognisedVariableField {
                        category: self.category,
                        field: name.clone(),
                        allowed: self.field_names(),
                    })?;
                let value = spec.ty.coerce(spec.name, value)?;
                Ok((name, value))
            })
            .collect()
    }

    /// Coerce fields of an entry read from storage; unknown fields are
    /// dropped with a warning instead of rejected.
    pub fn coerce_stored(&self, entry: &str, fields: FieldMap) -> ConfigResult<FieldMap> {
        let (known, unknown): (FieldMap, FieldMap) = fields
            .into_iter()
            .partition(|(name, _)| self.field(name).is_some());
        for name in unknown.keys() {
            warn!(
                "{} '{}': dropping unrecognised field '{}'",
                self.category, entry, name
            );
        }
        self.coerce(known)
    }

    /// Set fixed-template fields, whether or not the caller supplied them.
    pub fn apply_fixed(&self, fields: &mut FieldMap) {
        for spec in self.fields {
            if let FieldType::Fixed(template) = spec.ty {
                fields.insert(spec.name.to_string(), FieldValue::Str(template.to_string()));
            }
        }
    }

    /// Fill add-time defaults for omitted fields.
    pub fn apply_defaults(&self, fields: &mut FieldMap) {
        for spec in self.fields {
            if let Some(default) = spec.default {
                fields
                    .entry(spec.name.to_string())
                    .or_insert_with(|| FieldValue::Str(default.to_string()));
            }
        }
    }

    /// Fail on the first required field missing from `fields`.
    pub fn check_required(&self, entry: &str, fields: &FieldMap) -> ConfigResult<()> {
        match self
            .fields
            .iter()
            .find(|spec| spec.required && !fields.contains_key(spec.name))
        {
            Some(spec) => Err(ConfigError::MissingRequiredField {
                category: self.category,
                name: entry.to_string(),
                field: spec.name.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Puck.plural(), "pucks");
        assert_eq!(Category::RunMode.singular(), "run_mode");
        assert_eq!(Category::Species.plural(), Category::Species.singular());
        assert_eq!("barcode_flavors".parse::<Category>().unwrap(), Category::BarcodeFlavor);
        assert_eq!("run_mode".parse::<Category>().unwrap(), Category::RunMode);
    }

    #[test]
    fn test_unknown_category() {
        let err = "genomes".parse::<Category>().unwrap_err();
        assert!(matches!(err, ConfigError::UnrecognisedVariable { .. }));
        assert!(err.to_string().contains("pucks"));
    }

    #[test]
    fn test_requires_default() {
        assert!(Category::Puck.requires_default());
        assert!(Category::RunMode.requires_default());
        assert!(Category::BarcodeFlavor.requires_default());
        assert!(!Category::Species.requires_default());
    }

    #[test]
    fn test_coerce_run_mode_fields() {
        let coerced = RUN_MODE_SCHEMA
            .coerce(fields! {
                "n_beads" => "1000",
                "umi_cutoff" => vec!["100".to_string(), "300".to_string()],
                "clean_dge" => "yes",
                "mesh_spot_diameter_um" => 55_i64,
                "mesh_type" => "hexagon",
            })
            .unwrap();
        assert_eq!(coerced["n_beads"], FieldValue::Int(1000));
        assert_eq!(coerced["umi_cutoff"], FieldValue::IntList(vec![100, 300]));
        assert_eq!(coerced["clean_dge"], FieldValue::Bool(true));
        assert_eq!(coerced["mesh_spot_diameter_um"], FieldValue::Float(55.0));
        assert_eq!(coerced["mesh_type"], FieldValue::Str("hexagon".into()));
    }

    #[test]
    fn test_scalar_widens_to_int_list() {
        let coerced = RUN_MODE_SCHEMA
            .coerce(fields! { "umi_cutoff" => 100_i64 })
            .unwrap();
        assert_eq!(coerced["umi_cutoff"], FieldValue::IntList(vec![100]));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PUCK_SCHEMA
            .coerce(fields! { "height_um" => 3.0 })
            .unwrap_err();
        match err {
            ConfigError::UnrecognisedVariableField { field, allowed, .. } => {
                assert_eq!(field, "height_um");
                assert!(allowed.contains(&"width_um".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RUN_MODE_SCHEMA
            .coerce(fields! { "clean_dge" => "maybe" })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFieldValue { .. }));

        let err = RUN_MODE_SCHEMA
            .coerce(fields! { "mesh_type" => "square" })
            .unwrap_err();
        assert!(err.to_string().contains("circle"));

        let err = PUCK_SCHEMA
            .coerce(fields! { "width_um" => "wide" })
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_structure_field_names_field() {
        let err = BARCODE_FLAVOR_SCHEMA
            .coerce(fields! { "UMI" => "r1[0,12]" })
            .unwrap_err();
        match err {
            ConfigError::InvalidBarcodeStructure { field, .. } => assert_eq!(field, "UMI"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fixed_and_defaults() {
        let mut flavor = fields! { "cell" => "r1[0:12]" };
        BARCODE_FLAVOR_SCHEMA.apply_fixed(&mut flavor);
        assert_eq!(flavor["bam_tags"], FieldValue::Str(BAM_TAGS_TEMPLATE.into()));

        let mut species = fields! { "sequence" => "genome.fa" };
        SPECIES_SCHEMA.apply_defaults(&mut species);
        assert_eq!(species["annotation"], FieldValue::Str(String::new()));
    }

    #[test]
    fn test_check_required() {
        let err = PUCK_SCHEMA
            .check_required("p1", &fields! { "width_um" => 1.0 })
            .unwrap_err();
        assert!(err.to_string().contains("spot_diameter_um"));
        assert!(RUN_MODE_SCHEMA.check_required("rm", &FieldMap::new()).is_ok());
    }

    #[test]
    fn test_coerce_stored_drops_unknown() {
        let coerced = RUN_MODE_SCHEMA
            .coerce_stored("legacy", fields! { "n_beads" => 10_i64, "plot_bead_size" => 1.0 })
            .unwrap();
        assert_eq!(coerced.len(), 1);
        assert!(coerced.contains_key("n_beads"));
    }

    #[test]
    fn test_str_to_bool() {
        assert_eq!(str_to_bool("True"), Some(true));
        assert_eq!(str_to_bool("n"), Some(false));
        assert_eq!(str_to_bool("0"), Some(false));
        assert_eq!(str_to_bool("sure"), None);
    }
}
