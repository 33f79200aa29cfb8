//! Backward-compatible migration of stored documents.
//!
//! [`correct`] rewrites legacy shapes in place; [`backfill`] then fills
//! what is still missing from the factory document.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::merge::deep_merge;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Category, DEFAULT_NAME, RUN_MODE_SCHEMA};

const LEGACY_PUCK_SECTION: &str = "puck_data";
const LEGACY_KNOWLEDGE_SECTION: &str = "knowledge";
const POLYA_TRIMMING: &str = "polyA_adapter_trimming";

/// Migrate a stored document to the current shape.
pub fn correct(doc: &mut Map<String, Value>) -> ConfigResult<()> {
    for category in Category::ALL {
        if doc.get(category.plural()).is_some_and(Value::is_null) {
            doc.remove(category.plural());
        }
    }

    if !doc.contains_key(Category::Puck.plural()) {
        let legacy = doc
            .get_mut(LEGACY_PUCK_SECTION)
            .and_then(Value::as_object_mut)
            .and_then(|section| section.remove("pucks"));
        if let Some(pucks) = legacy {
            debug!("moving pucks out of '{}'", LEGACY_PUCK_SECTION);
            doc.insert(Category::Puck.plural().to_string(), pucks);
        }
    }

    if !doc.contains_key(Category::BarcodeFlavor.plural()) {
        let legacy = doc
            .get(LEGACY_KNOWLEDGE_SECTION)
            .and_then(|knowledge| knowledge.get("barcode_flavor"))
            .cloned();
        if let Some(flavors) = legacy {
            debug!("moving barcode flavors out of '{}'", LEGACY_KNOWLEDGE_SECTION);
            doc.insert(Category::BarcodeFlavor.plural().to_string(), flavors);
        }
    }

    let species = doc
        .entry(Category::Species.plural())
        .or_insert_with(empty_table);
    correct_species(species)?;

    doc.remove(LEGACY_KNOWLEDGE_SECTION);

    if let Some(run_modes) = doc
        .get_mut(Category::RunMode.plural())
        .and_then(Value::as_object_mut)
    {
        for (name, fields) in run_modes.iter_mut() {
            if let Some(fields) = fields.as_object_mut() {
                correct_run_mode(name, fields);
            }
        }
    }

    for category in Category::ALL {
        if let Some(table) = doc.get_mut(category.plural()) {
            drop_nulls(table, category.keyed_by_reference());
        }
    }

    Ok(())
}

/// Rewrite flat `{genome, annotation, rRNA_genome}` species entries into
/// the nested reference shape.
fn correct_species(species: &mut Value) -> ConfigResult<()> {
    let Some(species) = species.as_object_mut() else {
        return Err(ConfigError::MalformedDocument(
            "'species' must be a mapping".to_string(),
        ));
    };

    for (name, data) in species.iter_mut() {
        let Some(entry) = data.as_object() else {
            continue;
        };
        if !entry.get("annotation").is_some_and(|v| !v.is_object()) {
            continue;
        }
        warn!("converting old-style species section for '{}'", name);

        let sequence = entry.get("genome").cloned().ok_or_else(|| {
            ConfigError::MalformedDocument(format!(
                "old-style species '{}' has an annotation but no genome",
                name
            ))
        })?;
        let mut nested = Map::new();
        nested.insert(
            "genome".to_string(),
            reference(sequence, entry["annotation"].clone()),
        );
        if let Some(rrna) = entry.get("rRNA_genome") {
            nested.insert(
                "rRNA".to_string(),
                reference(rrna.clone(), Value::String(String::new())),
            );
        }
        *data = Value::Object(nested);
    }
    Ok(())
}

fn reference(sequence: Value, annotation: Value) -> Value {
    let mut fields = Map::new();
    fields.insert("sequence".to_string(), sequence);
    fields.insert("annotation".to_string(), annotation);
    Value::Object(fields)
}

fn correct_run_mode(name: &str, fields: &mut Map<String, Value>) {
    fields.retain(|field, _| {
        let known = RUN_MODE_SCHEMA.field(field).is_some();
        if !known {
            warn!("run_mode '{}': dropping unsupported field '{}'", name, field);
        }
        known
    });

    if fields.get(POLYA_TRIMMING) == Some(&Value::Bool(false)) {
        warn!(
            "run_mode '{}' sets {}=false, which is no longer supported; using true",
            name, POLYA_TRIMMING
        );
        fields.insert(POLYA_TRIMMING.to_string(), Value::Bool(true));
    }
}

/// Remove null-valued fields; an entry that is null itself becomes empty.
/// `nested` tables hold one more mapping level.
fn drop_nulls(table: &mut Value, nested: bool) {
    let Some(entries) = table.as_object_mut() else {
        return;
    };
    for entry in entries.values_mut() {
        if entry.is_null() {
            *entry = empty_table();
        } else if nested {
            drop_nulls(entry, false);
        } else if let Some(fields) = entry.as_object_mut() {
            fields.retain(|_, v| !v.is_null());
        }
    }
}

/// Copy categories missing from `doc` out of `factory`, and complete each
/// stored `default` entry with factory values for fields it lacks.
pub fn backfill(doc: &mut Map<String, Value>, factory: &Map<String, Value>) {
    for category in Category::ALL {
        let key = category.plural();
        let Some(factory_table) = factory.get(key) else {
            continue;
        };
        let table = doc
            .entry(key)
            .or_insert_with(|| factory_table.clone());

        let Some(factory_default) = factory_table.get(DEFAULT_NAME) else {
            continue;
        };
        if let Some(entries) = table.as_object_mut() {
            let stored = entries.remove(DEFAULT_NAME).unwrap_or(Value::Null);
            let merged = match stored {
                Value::Null => factory_default.clone(),
                stored => deep_merge(factory_default.clone(), stored),
            };
            entries.insert(DEFAULT_NAME.to_string(), merged);
        }
    }
}

fn empty_table() -> Value {
    Value::Object(Map::new())
}
