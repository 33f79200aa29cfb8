//! The configuration store: four registries plus top-level settings,
//! loaded from and dumped to one YAML document.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::defaults::{factory_document, DEFAULT_TEMP_DIR};
use super::migrate::{backfill, correct};
use crate::error::{ConfigError, ConfigResult};
use crate::files::{FileAssertion, FsFileAssertion};
use crate::records::{BarcodeFlavor, Puck, SpeciesReference};
use crate::registry::{RegistryTable, VariableKey, VariableRegistry};
use crate::run_mode::{RunMode, RunModeResolver};
use crate::schema::{Category, FieldMap, FieldValue, DEFAULT_NAME};

type StoredTable = BTreeMap<String, Map<String, Value>>;

/// Document shape after migration, before entries are coerced.
#[derive(Debug, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    root_dir: Option<String>,
    #[serde(default)]
    temp_dir: Option<String>,
    pucks: StoredTable,
    barcode_flavors: StoredTable,
    run_modes: StoredTable,
    species: BTreeMap<String, StoredTable>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Serializable view of a store, in document key order.
#[derive(Serialize)]
pub struct ConfigDocument<'a> {
    pub root_dir: &'a str,
    pub temp_dir: &'a str,
    pub species: RegistryTable<'a>,
    pub barcode_flavors: RegistryTable<'a>,
    pub run_modes: RegistryTable<'a>,
    pub pucks: RegistryTable<'a>,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

/// In-memory configuration document.
///
/// Mutation goes through the registries; nothing reaches disk until
/// [`ConfigStore::dump`] succeeds.
pub struct ConfigStore {
    path: PathBuf,
    root_dir: String,
    temp_dir: String,
    extra: Map<String, Value>,
    pucks: VariableRegistry,
    barcode_flavors: VariableRegistry,
    run_modes: VariableRegistry,
    species: VariableRegistry,
    files: Box<dyn FileAssertion>,
    loaded_digest: Option<String>,
}

impl ConfigStore {
    /// Load the document at `path`, or the factory defaults if it does not
    /// exist yet.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    ConfigError::MalformedDocument(format!("{}: {}", path.display(), e))
                })?;
                let mut store = Self::from_yaml_str(&text)?;
                debug!("loaded {}", path.display());
                store.loaded_digest = Some(digest(text.as_bytes()));
                store.path = path;
                Ok(store)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, starting from factory defaults", path.display());
                let mut store = Self::factory_defaults()?;
                store.path = path;
                Ok(store)
            }
            Err(e) => Err(ConfigError::io(path, e)),
        }
    }

    /// Store holding only the bundled factory document.
    pub fn factory_defaults() -> ConfigResult<Self> {
        Self::from_document(factory_document()?)
    }

    /// Parse, migrate and back-fill a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let doc = match serde_yaml::from_str::<Value>(yaml)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ConfigError::MalformedDocument(format!(
                    "top level must be a mapping, found {}",
                    other
                )))
            }
        };
        Self::from_document(doc)
    }

    /// Build a store from an untyped document tree.
    pub fn from_document(mut doc: Map<String, Value>) -> ConfigResult<Self> {
        correct(&mut doc)?;
        backfill(&mut doc, &factory_document()?);

        let stored: StoredDocument = serde_json::from_value(Value::Object(doc))
            .map_err(|e| ConfigError::MalformedDocument(e.to_string()))?;

        let mut species = VariableRegistry::new(Category::Species);
        for (name, references) in stored.species {
            for (reference, fields) in references {
                let key = VariableKey::species(name.clone(), reference);
                species.insert_stored(key.clone(), stored_fields(Category::Species, &key, fields)?);
            }
        }

        Ok(Self {
            path: PathBuf::new(),
            root_dir: stored.root_dir.unwrap_or_default(),
            temp_dir: stored
                .temp_dir
                .unwrap_or_else(|| DEFAULT_TEMP_DIR.to_string()),
            extra: stored.extra,
            pucks: stored_registry(Category::Puck, stored.pucks)?,
            barcode_flavors: stored_registry(Category::BarcodeFlavor, stored.barcode_flavors)?,
            run_modes: stored_registry(Category::RunMode, stored.run_modes)?,
            species,
            files: Box::new(FsFileAssertion),
            loaded_digest: None,
        })
    }

    /// Replace the collaborator used to check path-typed fields.
    pub fn with_file_assertion(mut self, files: impl FileAssertion + 'static) -> Self {
        self.files = Box::new(files);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    pub fn set_root_dir(&mut self, root_dir: impl Into<String>) {
        self.root_dir = root_dir.into();
    }

    pub fn temp_dir(&self) -> &str {
        &self.temp_dir
    }

    pub fn set_temp_dir(&mut self, temp_dir: impl Into<String>) {
        self.temp_dir = temp_dir.into();
    }

    /// Top-level keys this store does not interpret, kept for the dump.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn registry(&self, category: Category) -> &VariableRegistry {
        match category {
            Category::Puck => &self.pucks,
            Category::BarcodeFlavor => &self.barcode_flavors,
            Category::RunMode => &self.run_modes,
            Category::Species => &self.species,
        }
    }

    /// The registry of `category` together with the file collaborator.
    fn parts(&mut self, category: Category) -> (&mut VariableRegistry, &dyn FileAssertion) {
        let registry = match category {
            Category::Puck => &mut self.pucks,
            Category::BarcodeFlavor => &mut self.barcode_flavors,
            Category::RunMode => &mut self.run_modes,
            Category::Species => &mut self.species,
        };
        (registry, self.files.as_ref())
    }

    pub fn add(&mut self, category: Category, key: &VariableKey, fields: FieldMap) -> ConfigResult<FieldMap> {
        let (registry, files) = self.parts(category);
        let added = registry.add(key, fields, files)?;
        info!("added {} '{}'", category, key);
        Ok(added)
    }

    pub fn update(&mut self, category: Category, key: &VariableKey, fields: FieldMap) -> ConfigResult<FieldMap> {
        let (registry, files) = self.parts(category);
        let updated = registry.update(key, fields, files)?;
        info!("updated {} '{}'", category, key);
        Ok(updated)
    }

    pub fn delete(&mut self, category: Category, key: &VariableKey) -> ConfigResult<FieldMap> {
        let (registry, _) = self.parts(category);
        let deleted = registry.delete(key)?;
        info!("deleted {} '{}'", category, key);
        Ok(deleted)
    }

    pub fn get(&self, category: Category, key: &VariableKey) -> ConfigResult<&FieldMap> {
        self.registry(category).get(key)
    }

    pub fn resolver(&self) -> RunModeResolver<'_> {
        RunModeResolver::new(&self.run_modes)
    }

    /// Fully resolved run mode.
    pub fn run_mode(&self, name: &str) -> ConfigResult<RunMode> {
        self.resolver().resolve(name)
    }

    pub fn puck(&self, name: &str) -> ConfigResult<Puck> {
        let fields = self.pucks.get(&VariableKey::new(name))?;
        Puck::from_fields(name, fields)
    }

    /// Like [`ConfigStore::puck`], but an unknown name yields an empty puck.
    pub fn puck_or_empty(&self, name: &str) -> ConfigResult<Puck> {
        if self.pucks.exists(&VariableKey::new(name)) {
            self.puck(name)
        } else {
            Ok(Puck::empty(name))
        }
    }

    pub fn barcode_flavor(&self, name: &str) -> ConfigResult<BarcodeFlavor> {
        let fields = self.barcode_flavors.get(&VariableKey::new(name))?;
        BarcodeFlavor::from_fields(name, fields)
    }

    pub fn species_reference(&self, species: &str, reference: &str) -> ConfigResult<SpeciesReference> {
        let fields = self.species.get(&VariableKey::species(species, reference))?;
        SpeciesReference::from_fields(species, reference, fields)
    }

    /// Every default-requiring category still holds `default`, the run-mode
    /// `default` has no parent, and every run mode resolves.
    pub fn check_integrity(&self) -> ConfigResult<()> {
        for category in Category::ALL.into_iter().filter(Category::requires_default) {
            let registry = self.registry(category);
            if !registry.exists(&VariableKey::new(DEFAULT_NAME)) {
                return Err(ConfigError::VariableNotFound {
                    category,
                    name: DEFAULT_NAME.to_string(),
                });
            }
        }
        self.resolver().check_all()
    }

    pub fn document(&self) -> ConfigDocument<'_> {
        ConfigDocument {
            root_dir: &self.root_dir,
            temp_dir: &self.temp_dir,
            species: self.species.table(),
            barcode_flavors: self.barcode_flavors.table(),
            run_modes: self.run_modes.table(),
            pucks: self.pucks.table(),
            extra: &self.extra,
        }
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(&self.document())?)
    }

    /// Write the document back to [`ConfigStore::path`].
    ///
    /// Fails without touching the file if the integrity check fails, or if
    /// the file changed on disk since it was loaded.
    pub fn dump(&mut self) -> ConfigResult<()> {
        self.check_integrity()?;

        let on_disk = match fs::read(&self.path) {
            Ok(bytes) => Some(digest(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };
        if on_disk.is_some() && on_disk != self.loaded_digest {
            return Err(ConfigError::ConcurrentModification {
                path: self.path.clone(),
            });
        }

        let yaml = self.to_yaml()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let tmp = tmp_path_for(&self.path);
        fs::write(&tmp, yaml.as_bytes()).map_err(|e| ConfigError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| ConfigError::io(&self.path, e))?;

        self.loaded_digest = Some(digest(yaml.as_bytes()));
        info!("wrote {}", self.path.display());
        Ok(())
    }
}

fn stored_registry(category: Category, table: StoredTable) -> ConfigResult<VariableRegistry> {
    let mut registry = VariableRegistry::new(category);
    for (name, fields) in table {
        let key = VariableKey::new(name);
        registry.insert_stored(key.clone(), stored_fields(category, &key, fields)?);
    }
    Ok(registry)
}

fn stored_fields(category: Category, key: &VariableKey, raw: Map<String, Value>) -> ConfigResult<FieldMap> {
    let malformed = |reason: String| ConfigError::MalformedDocument(format!("{} '{}': {}", category, key, reason));

    let mut fields = FieldMap::new();
    for (field, value) in raw {
        let value = FieldValue::from_json(&value)
            .ok_or_else(|| malformed(format!("unsupported value {} for field '{}'", value, field)))?;
        fields.insert(field, value);
    }
    category
        .schema()
        .coerce_stored(&key.to_string(), fields)
        .map_err(|e| malformed(e.to_string()))
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
