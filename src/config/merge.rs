//! Layer merging for variable entries.
//!
//! Entries are flat, so the resolver only needs a shallow overlay: keys of
//! the upper layer replace keys of the lower one, lists included. Untyped
//! document trees use [`deep_merge`] while they are being migrated.

use serde_json::Value;

use crate::schema::FieldMap;

/// Overlay `top` onto `base`; `top` wins on every key it defines.
pub fn overlay(mut base: FieldMap, top: &FieldMap) -> FieldMap {
    base.extend(top.iter().map(|(k, v)| (k.clone(), v.clone())));
    base
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a FieldMap>) -> FieldMap {
    layers.into_iter().fold(FieldMap::new(), overlay)
}

/// Deep-merge two untyped document values.
///
/// Mappings merge key by key, anything else (sequences included) is
/// replaced by `overlay`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::schema::FieldValue;
    use serde_json::json;

    #[test]
    fn test_overlay_top_wins() {
        let base = fields! { "n_beads" => 100_i64, "mesh_data" => false };
        let top = fields! { "n_beads" => 200_i64 };
        let merged = overlay(base, &top);
        assert_eq!(merged["n_beads"], FieldValue::Int(200));
        assert_eq!(merged["mesh_data"], FieldValue::Bool(false));
    }

    #[test]
    fn test_overlay_replaces_lists() {
        let base = fields! { "umi_cutoff" => vec![100_i64, 300, 500] };
        let top = fields! { "umi_cutoff" => vec![50_i64] };
        assert_eq!(overlay(base, &top)["umi_cutoff"], FieldValue::IntList(vec![50]));
    }

    #[test]
    fn test_merge_layers_order() {
        let default = fields! { "n_beads" => 1_i64, "clean_dge" => true };
        let parent = fields! { "n_beads" => 2_i64 };
        let child = fields! { "clean_dge" => false };
        let merged = merge_layers([&default, &parent, &child]);
        assert_eq!(merged["n_beads"], FieldValue::Int(2));
        assert_eq!(merged["clean_dge"], FieldValue::Bool(false));
    }

    #[test]
    fn test_deep_merge_nested_documents() {
        let factory = json!({
            "run_modes": {"default": {"n_beads": 100000, "umi_cutoff": [100, 300]}}
        });
        let stored = json!({
            "run_modes": {"default": {"umi_cutoff": [50]}, "custom": {"n_beads": 5}}
        });
        let merged = deep_merge(factory, stored);
        assert_eq!(merged["run_modes"]["default"]["n_beads"], 100000);
        assert_eq!(merged["run_modes"]["default"]["umi_cutoff"], json!([50]));
        assert_eq!(merged["run_modes"]["custom"]["n_beads"], 5);
    }

    #[test]
    fn test_deep_merge_scalar_override() {
        assert_eq!(deep_merge(json!({"a": 1}), json!({"a": null})), json!({"a": null}));
        assert_eq!(deep_merge(json!([1, 2]), json!([3])), json!([3]));
    }
}
