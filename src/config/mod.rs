//! Loading, migrating and persisting the configuration document.
//!
//! A document is read as untyped YAML, migrated by [`migrate::correct`],
//! completed from the bundled factory defaults, and only then split into
//! the four typed registries held by [`ConfigStore`].

mod defaults;
mod lock;
pub mod merge;
pub mod migrate;
mod store;

pub use defaults::{factory_document, DEFAULT_TEMP_DIR, FACTORY_CONFIG_YAML};
pub use lock::{lock_path_for, ConfigLock, LockError};
pub use merge::{deep_merge, merge_layers, overlay};
pub use store::{ConfigDocument, ConfigStore};
