//! Error taxonomy for the configuration store.

use std::io;
use std::path::PathBuf;

use spacemake_barcode::{MismatchError, StructureError};

use crate::config::LockError;
use crate::schema::Category;

/// Result alias used throughout the crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by the registries, the resolver and the store.
///
/// None of these are transient; callers report them and exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unrecognised variable '{variable}'; allowed variables are: {}", allowed.join(", "))]
    UnrecognisedVariable {
        variable: String,
        allowed: Vec<String>,
    },

    #[error("unrecognised {category} field '{field}'; allowed fields are: {}", allowed.join(", "))]
    UnrecognisedVariableField {
        category: Category,
        field: String,
        allowed: Vec<String>,
    },

    #[error("{category} '{name}' already exists")]
    DuplicateVariable { category: Category, name: String },

    #[error("{category} '{name}' not found")]
    VariableNotFound { category: Category, name: String },

    #[error("the 'default' {category} cannot be deleted")]
    ProtectedVariable { category: Category },

    #[error("invalid {field} structure: {source}")]
    InvalidBarcodeStructure {
        field: String,
        #[source]
        source: StructureError,
    },

    #[error(transparent)]
    Mismatch(#[from] MismatchError),

    #[error("the 'default' run_mode cannot have a parent_run_mode ('{parent}')")]
    DefaultRunModeParent { parent: String },

    #[error("cyclic run_mode inheritance: {}", chain.join(" -> "))]
    CyclicRunMode { chain: Vec<String> },

    #[error("{category} '{name}' is missing required field '{field}'")]
    MissingRequiredField {
        category: Category,
        name: String,
        field: String,
    },

    #[error("invalid value {value} for field '{field}': expected {expected}")]
    InvalidFieldValue {
        field: String,
        expected: String,
        value: String,
    },

    #[error("field '{field}': {path}: {reason}")]
    FileAssertion {
        field: String,
        path: String,
        reason: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),

    #[error("could not lock configuration: {0}")]
    Lock(#[from] LockError),

    #[error("{} was modified by another process since it was loaded", path.display())]
    ConcurrentModification { path: PathBuf },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_value(
        field: &str,
        expected: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidFieldValue {
            field: field.to_string(),
            expected: expected.into(),
            value: value.to_string(),
        }
    }
}
