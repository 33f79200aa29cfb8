//! Bundled factory-default document.
//!
//! Used as-is when no configuration file exists yet, and as the source of
//! missing categories and `default` entries when an older file is loaded.

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Factory document shipped with the binary.
pub const FACTORY_CONFIG_YAML: &str = include_str!("../../data/config.yaml");

/// Default for `temp_dir` when a document does not set it.
pub const DEFAULT_TEMP_DIR: &str = "/tmp";

/// Parse the factory document into an untyped mapping.
pub fn factory_document() -> ConfigResult<Map<String, Value>> {
    match serde_yaml::from_str::<Value>(FACTORY_CONFIG_YAML)? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::MalformedDocument(
            "factory document is not a mapping".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;

    #[test]
    fn test_factory_has_every_category() {
        let doc = factory_document().unwrap();
        for category in Category::ALL {
            assert!(doc[category.plural()].is_object(), "{} missing", category.plural());
        }
        assert_eq!(doc["temp_dir"], DEFAULT_TEMP_DIR);
    }

    #[test]
    fn test_factory_defaults_present() {
        let doc = factory_document().unwrap();
        for category in Category::ALL.into_iter().filter(Category::requires_default) {
            assert!(
                doc[category.plural()].get("default").is_some(),
                "{} has no default",
                category.plural()
            );
        }
    }
}
