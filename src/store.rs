//! Key-value persistence for presets and connections.
//!
//! Values are opaque strings (JSON documents in practice) stored under a
//! namespace. The file store keeps one file per namespace.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when nothing is stored under `namespace`.
    fn get(&self, namespace: &str) -> io::Result<Option<String>>;
    fn put(&self, namespace: &str, value: &str) -> io::Result<()>;
    fn delete(&self, namespace: &str) -> io::Result<()>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(namespace).cloned())
    }

    fn put(&self, namespace: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(namespace.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, namespace: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(namespace);
        Ok(())
    }
}

/// Directory-backed store: `<dir>/<namespace>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        let file: String = namespace
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, namespace: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(namespace)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash never leaves a half-written document.
    fn put(&self, namespace: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(namespace);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "store written");
        Ok(())
    }

    fn delete(&self, namespace: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(namespace)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("ns").unwrap(), None);
        store.put("ns", "[1]").unwrap();
        assert_eq!(store.get("ns").unwrap().as_deref(), Some("[1]"));
        store.put("ns", "[2]").unwrap();
        assert_eq!(store.get("ns").unwrap().as_deref(), Some("[2]"));
        store.delete("ns").unwrap();
        assert_eq!(store.get("ns").unwrap(), None);
        store.delete("ns").unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = TempDir::new().unwrap();
        exercise(&FileStore::open(dir.path()).unwrap());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        FileStore::open(dir.path())
            .unwrap()
            .put("clusterdeck.presets", "[]")
            .unwrap();
        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("clusterdeck.presets").unwrap().as_deref(),
            Some("[]")
        );
        assert!(dir.path().join("clusterdeck.presets.json").exists());
    }

    #[test]
    fn test_namespace_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();
        store.put("../escape", "x").unwrap();
        assert!(dir.path().join("nested").join(".._escape.json").exists());
    }
}
