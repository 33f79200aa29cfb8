//! Generic CRUD over the named variables of one category.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::files::FileAssertion;
use crate::run_mode::check_default_parent;
use crate::schema::{Category, CategorySchema, FieldMap, FieldType, DEFAULT_NAME, DEFAULT_REFERENCE};

/// Identifies one variable of a category.
///
/// Species entries are keyed by (species name, reference name); the
/// reference is ignored for every other category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableKey {
    pub name: String,
    pub reference: Option<String>,
}

impl VariableKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: None,
        }
    }

    pub fn species(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: Some(reference.into()),
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}.{}", self.name, reference),
            None => f.write_str(&self.name),
        }
    }
}

/// All variables of one category, validated through the category schema.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    category: Category,
    entries: BTreeMap<VariableKey, FieldMap>,
}

impl VariableRegistry {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: BTreeMap::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn schema(&self) -> &'static CategorySchema {
        self.category.schema()
    }

    fn normalize(&self, key: &VariableKey) -> VariableKey {
        let reference = if self.category.keyed_by_reference() {
            Some(
                key.reference
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REFERENCE.to_string()),
            )
        } else {
            None
        };
        VariableKey {
            name: key.name.clone(),
            reference,
        }
    }

    fn not_found(&self, key: &VariableKey) -> ConfigError {
        ConfigError::VariableNotFound {
            category: self.category,
            name: key.to_string(),
        }
    }

    pub fn exists(&self, key: &VariableKey) -> bool {
        self.entries.contains_key(&self.normalize(key))
    }

    /// Whether any entry is stored under `name` (any reference, for species).
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.keys().any(|k| k.name == name)
    }

    pub fn get(&self, key: &VariableKey) -> ConfigResult<&FieldMap> {
        let key = self.normalize(key);
        self.entries.get(&key).ok_or_else(|| self.not_found(&key))
    }

    /// Entries in key order.
    pub fn list(&self) -> impl Iterator<Item = (&VariableKey, &FieldMap)> {
        self.entries.iter()
    }

    /// Distinct variable names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.name.as_str()).collect();
        names.dedup();
        names
    }

    /// Reference names stored under a species.
    pub fn references(&self, name: &str) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|k| k.name == name)
            .filter_map(|k| k.reference.as_deref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a new variable. Fails if the key already exists.
    pub fn add(
        &mut self,
        key: &VariableKey,
        fields: FieldMap,
        files: &dyn FileAssertion,
    ) -> ConfigResult<FieldMap> {
        let key = self.normalize(key);
        if self.entries.contains_key(&key) {
            return Err(ConfigError::DuplicateVariable {
                category: self.category,
                name: key.to_string(),
            });
        }

        let schema = self.schema();
        let mut fields = schema.coerce(fields)?;
        self.check_default_parent(&key, &fields)?;
        schema.apply_defaults(&mut fields);
        schema.apply_fixed(&mut fields);
        schema.check_required(&key.to_string(), &fields)?;
        assert_paths(schema, &fields, files)?;

        debug!("adding {} '{}'", self.category, key);
        self.entries.insert(key, fields.clone());
        Ok(fields)
    }

    /// Shallow-merge `fields` into an existing variable.
    pub fn update(
        &mut self,
        key: &VariableKey,
        fields: FieldMap,
        files: &dyn FileAssertion,
    ) -> ConfigResult<FieldMap> {
        let key = self.normalize(key);
        if !self.entries.contains_key(&key) {
            return Err(self.not_found(&key));
        }

        let schema = self.schema();
        let mut fields = schema.coerce(fields)?;
        self.check_default_parent(&key, &fields)?;
        schema.apply_fixed(&mut fields);
        assert_paths(schema, &fields, files)?;

        debug!("updating {} '{}'", self.category, key);
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| ConfigError::VariableNotFound {
                category: self.category,
                name: key.to_string(),
            })?;
        entry.extend(fields);
        Ok(entry.clone())
    }

    /// Remove a variable and return its fields.
    ///
    /// For species this removes one reference; a species left without
    /// references disappears with it.
    pub fn delete(&mut self, key: &VariableKey) -> ConfigResult<FieldMap> {
        let key = self.normalize(key);
        if self.category.requires_default() && key.name == DEFAULT_NAME {
            return Err(ConfigError::ProtectedVariable {
                category: self.category,
            });
        }
        debug!("deleting {} '{}'", self.category, key);
        self.entries.remove(&key).ok_or_else(|| self.not_found(&key))
    }

    fn check_default_parent(&self, key: &VariableKey, fields: &FieldMap) -> ConfigResult<()> {
        if self.category == Category::RunMode && key.name == DEFAULT_NAME {
            check_default_parent(fields)?;
        }
        Ok(())
    }

    /// Insert an entry read from storage, bypassing add-time checks.
    pub(crate) fn insert_stored(&mut self, key: VariableKey, fields: FieldMap) {
        let key = self.normalize(&key);
        self.entries.insert(key, fields);
    }

    /// Serializable view in document shape: `name -> fields`, or
    /// `species -> reference -> fields`.
    pub fn table(&self) -> RegistryTable<'_> {
        RegistryTable(self)
    }
}

fn assert_paths(
    schema: &CategorySchema,
    fields: &FieldMap,
    files: &dyn FileAssertion,
) -> ConfigResult<()> {
    for (name, value) in fields {
        let Some(spec) = schema.field(name) else {
            continue;
        };
        let path = value.as_str().unwrap_or_default();
        match spec.ty {
            FieldType::Path(extensions) => files.assert_file(name, path, extensions)?,
            FieldType::Directory => files.assert_directory(name, path)?,
            _ => {}
        }
    }
    Ok(())
}

/// See [`VariableRegistry::table`].
pub struct RegistryTable<'a>(&'a VariableRegistry);

impl Serialize for RegistryTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let registry = self.0;
        if registry.category.keyed_by_reference() {
            let mut nested: BTreeMap<&str, BTreeMap<&str, &FieldMap>> = BTreeMap::new();
            for (key, fields) in &registry.entries {
                let reference = key.reference.as_deref().unwrap_or(DEFAULT_REFERENCE);
                nested
                    .entry(key.name.as_str())
                    .or_default()
                    .insert(reference, fields);
            }
            nested.serialize(serializer)
        } else {
            let mut map = serializer.serialize_map(Some(registry.entries.len()))?;
            for (key, fields) in &registry.entries {
                map.serialize_entry(&key.name, fields)?;
            }
            map.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::files::SkipFileAssertion;
    use crate::schema::FieldValue;

    #[test]
    fn test_add_then_get() {
        let mut pucks = VariableRegistry::new(Category::Puck);
        let key = VariableKey::new("visium");
        let added = pucks
            .add(
                &key,
                fields! { "width_um" => "6500", "spot_diameter_um" => 55_i64 },
                &SkipFileAssertion,
            )
            .unwrap();
        assert_eq!(added["width_um"], FieldValue::Float(6500.0));
        assert_eq!(pucks.get(&key).unwrap(), &added);
        assert!(pucks.exists(&key));
    }

    #[test]
    fn test_add_twice_is_duplicate() {
        let mut run_modes = VariableRegistry::new(Category::RunMode);
        let key = VariableKey::new("fast");
        run_modes
            .add(&key, fields! { "n_beads" => 10_i64 }, &SkipFileAssertion)
            .unwrap();
        let err = run_modes
            .add(&key, fields! { "n_beads" => 20_i64 }, &SkipFileAssertion)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateVariable { .. }));
        assert_eq!(run_modes.get(&key).unwrap()["n_beads"], FieldValue::Int(10));
    }

    #[test]
    fn test_update_requires_existing() {
        let mut run_modes = VariableRegistry::new(Category::RunMode);
        let err = run_modes
            .update(&VariableKey::new("ghost"), fields! { "n_beads" => 1_i64 }, &SkipFileAssertion)
            .unwrap_err();
        assert!(matches!(err, ConfigError::VariableNotFound { .. }));
    }

    #[test]
    fn test_update_merges_shallowly() {
        let mut run_modes = VariableRegistry::new(Category::RunMode);
        let key = VariableKey::new("visium");
        run_modes
            .add(
                &key,
                fields! { "n_beads" => 10_i64, "umi_cutoff" => vec![100_i64, 200] },
                &SkipFileAssertion,
            )
            .unwrap();
        let merged = run_modes
            .update(&key, fields! { "umi_cutoff" => vec![50_i64] }, &SkipFileAssertion)
            .unwrap();
        assert_eq!(merged["n_beads"], FieldValue::Int(10));
        assert_eq!(merged["umi_cutoff"], FieldValue::IntList(vec![50]));
    }

    #[test]
    fn test_default_run_mode_cannot_take_a_parent() {
        let mut run_modes = VariableRegistry::new(Category::RunMode);
        let default = VariableKey::new("default");
        let err = run_modes
            .add(&default, fields! { "parent_run_mode" => "visium" }, &SkipFileAssertion)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DefaultRunModeParent { .. }));

        run_modes
            .add(&default, fields! { "n_beads" => 1_i64 }, &SkipFileAssertion)
            .unwrap();
        let err = run_modes
            .update(&default, fields! { "parent_run_mode" => "visium" }, &SkipFileAssertion)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DefaultRunModeParent { ref parent } if parent == "visium"));
        assert!(!run_modes.get(&default).unwrap().contains_key("parent_run_mode"));

        run_modes
            .add(&VariableKey::new("fast"), fields! { "parent_run_mode" => "default" }, &SkipFileAssertion)
            .unwrap();
    }

    #[test]
    fn test_delete_default_is_protected() {
        let mut pucks = VariableRegistry::new(Category::Puck);
        let err = pucks.delete(&VariableKey::new("default")).unwrap_err();
        assert!(matches!(err, ConfigError::ProtectedVariable { category: Category::Puck }));
    }

    #[test]
    fn test_delete_missing() {
        let mut flavors = VariableRegistry::new(Category::BarcodeFlavor);
        let err = flavors.delete(&VariableKey::new("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::VariableNotFound { .. }));
    }

    #[test]
    fn test_species_references() {
        let mut species = VariableRegistry::new(Category::Species);
        species
            .add(
                &VariableKey::new("human"),
                fields! { "sequence" => "hg38.fa" },
                &SkipFileAssertion,
            )
            .unwrap();
        species
            .add(
                &VariableKey::species("human", "rRNA"),
                fields! { "sequence" => "rRNA.fa" },
                &SkipFileAssertion,
            )
            .unwrap();

        assert_eq!(species.references("human"), vec!["genome", "rRNA"]);
        assert_eq!(species.names(), vec!["human"]);

        species.delete(&VariableKey::species("human", "genome")).unwrap();
        assert!(species.contains_name("human"));
        species.delete(&VariableKey::species("human", "rRNA")).unwrap();
        assert!(!species.contains_name("human"));
    }

    #[test]
    fn test_species_duplicate_is_per_reference() {
        let mut species = VariableRegistry::new(Category::Species);
        let key = VariableKey::species("mouse", "genome");
        species
            .add(&key, fields! { "sequence" => "mm10.fa" }, &SkipFileAssertion)
            .unwrap();
        let err = species
            .add(&key, fields! { "sequence" => "mm39.fa" }, &SkipFileAssertion)
            .unwrap_err();
        assert_eq!(err.to_string(), "species 'mouse.genome' already exists");
    }

    #[test]
    fn test_table_shape() {
        let mut species = VariableRegistry::new(Category::Species);
        species
            .add(
                &VariableKey::species("human", "genome"),
                fields! { "sequence" => "hg38.fa", "annotation" => "gencode.gtf" },
                &SkipFileAssertion,
            )
            .unwrap();
        let json = serde_json::to_value(species.table()).unwrap();
        assert_eq!(json["human"]["genome"]["sequence"], "hg38.fa");
        assert_eq!(json["human"]["genome"]["annotation"], "gencode.gtf");
    }
}
