use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use dapp_bridge_core::{PersistencePort, PortError};

type Scopes = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl PersistencePort for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        let g = self
            .values
            .lock()
            .map_err(|e| PortError::StorageUnavailable(format!("store lock poisoned: {e}")))?;
        Ok(g.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        let mut g = self
            .values
            .lock()
            .map_err(|e| PortError::StorageUnavailable(format!("store lock poisoned: {e}")))?;
        g.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// JSON file shared by several hosts, one key space per host origin.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    scope: String,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: scope.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Scopes, PortError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Scopes::new()),
            Err(e) => {
                return Err(PortError::StorageUnavailable(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Scopes::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            PortError::StorageUnavailable(format!("corrupt store {}: {e}", self.path.display()))
        })
    }

    fn store(&self, scopes: &Scopes) -> Result<(), PortError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PortError::StorageUnavailable(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let raw = serde_json::to_string_pretty(scopes)
            .map_err(|e| PortError::StorageUnavailable(format!("failed to encode store: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                PortError::StorageUnavailable(format!(
                    "failed to write {}: {e}",
                    self.path.display()
                ))
            })
    }
}

impl PersistencePort for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| PortError::StorageUnavailable(format!("store lock poisoned: {e}")))?;
        let scopes = self.load()?;
        Ok(scopes
            .get(&self.scope)
            .and_then(|values| values.get(key))
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| PortError::StorageUnavailable(format!("store lock poisoned: {e}")))?;
        let mut scopes = self.load()?;
        scopes
            .entry(self.scope.clone())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        self.store(&scopes)?;
        debug!(scope = %self.scope, key, "persisted value");
        Ok(())
    }
}
