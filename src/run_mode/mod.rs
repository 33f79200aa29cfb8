//! Run-mode inheritance.
//!
//! A run mode names at most one parent. Its effective settings are, from
//! lowest to highest precedence: the `default` run mode, the root of its
//! parent chain, ..., its parent, itself.

mod record;

pub use record::{MeshType, RunMode};

use tracing::debug;

use crate::config::merge::{merge_layers, overlay};
use crate::error::{ConfigError, ConfigResult};
use crate::registry::{VariableKey, VariableRegistry};
use crate::schema::{Category, FieldMap, FieldValue, DEFAULT_NAME};

/// Field holding the parent name.
pub const PARENT_FIELD: &str = "parent_run_mode";

/// Resolves run modes of one registry against their parents and `default`.
#[derive(Debug, Clone, Copy)]
pub struct RunModeResolver<'a> {
    run_modes: &'a VariableRegistry,
}

impl<'a> RunModeResolver<'a> {
    pub fn new(run_modes: &'a VariableRegistry) -> Self {
        debug_assert_eq!(run_modes.category(), Category::RunMode);
        Self { run_modes }
    }

    /// Effective field mapping of `name`.
    pub fn resolve_fields(&self, name: &str) -> ConfigResult<FieldMap> {
        let mut path = Vec::new();
        let resolved = self.resolve_chain(name, &mut path)?;
        let mut defaults = self.run_modes.get(&VariableKey::new(DEFAULT_NAME))?.clone();
        defaults.remove(PARENT_FIELD);
        debug!("resolved run_mode '{}' via {}", name, path.join(" -> "));
        Ok(merge_layers([&defaults, &resolved]))
    }

    /// Effective settings of `name` as a typed record.
    pub fn resolve(&self, name: &str) -> ConfigResult<RunMode> {
        let fields = self.resolve_fields(name)?;
        RunMode::from_fields(name, &fields)
    }

    /// Resolve every run mode, failing on the first dangling parent or cycle.
    /// `default` itself must not name a parent.
    pub fn check_all(&self) -> ConfigResult<()> {
        let defaults = self.run_modes.get(&VariableKey::new(DEFAULT_NAME))?;
        check_default_parent(defaults)?;
        for name in self.run_modes.names() {
            self.resolve_fields(name)?;
        }
        Ok(())
    }

    /// Own fields of `name` over its fully resolved parent, without defaults.
    fn resolve_chain(&self, name: &str, path: &mut Vec<String>) -> ConfigResult<FieldMap> {
        if path.iter().any(|seen| seen == name) {
            path.push(name.to_string());
            return Err(ConfigError::CyclicRunMode {
                chain: path.clone(),
            });
        }
        path.push(name.to_string());

        let own = self.run_modes.get(&VariableKey::new(name))?;
        let base = match own.get(PARENT_FIELD).and_then(FieldValue::as_str) {
            Some(parent) => self.resolve_chain(parent, path)?,
            None => FieldMap::new(),
        };
        Ok(overlay(base, own))
    }
}

/// Reject a parent on the `default` run mode.
pub(crate) fn check_default_parent(fields: &FieldMap) -> ConfigResult<()> {
    match fields.get(PARENT_FIELD) {
        Some(parent) => Err(ConfigError::DefaultRunModeParent {
            parent: parent.as_str().unwrap_or_default().to_string(),
        }),
        None => Ok(()),
    }
}
