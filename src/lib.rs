//! Spacemake project configuration store
//!
//! Keeps the species, pucks, barcode flavors and run modes of a spacemake
//! project in one YAML document. Each category is a typed registry checked
//! against a declarative schema; run modes inherit from a parent chain
//! rooted at `default`. Barcode structure parsing and mismatch budgets live
//! in the `spacemake-barcode` crate and are re-exported here.

pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod records;
pub mod registry;
pub mod run_mode;
pub mod schema;

pub use config::{ConfigDocument, ConfigLock, ConfigStore, LockError};
pub use error::{ConfigError, ConfigResult};
pub use files::{FileAssertion, FsFileAssertion, SkipFileAssertion};
pub use records::{BarcodeFlavor, Puck, SpeciesReference};
pub use registry::{VariableKey, VariableRegistry};
pub use run_mode::{MeshType, RunMode, RunModeResolver};
pub use schema::{Category, CategorySchema, FieldMap, FieldType, FieldValue};
pub use spacemake_barcode::{
    max_barcode_mismatch, BarcodeStructure, MismatchError, Read, SliceRule, StructureError,
};
