//! Persistence backends for the counter store.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::value_store::ValueStore;
use crate::error::StoreError;

/// Loads and saves the counter namespaces of a host
pub trait StoreBackend: Send + Sync {
    fn load(&self, host: &str) -> Result<BTreeMap<String, ValueStore>, StoreError>;

    fn save(&self, host: &str, namespaces: &BTreeMap<String, ValueStore>) -> Result<(), StoreError>;
}

/// One JSON file per host below a state directory
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, host: &str) -> PathBuf {
        self.dir.join(format!("{host}.json"))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

impl StoreBackend for FileBackend {
    fn load(&self, host: &str) -> Result<BTreeMap<String, ValueStore>, StoreError> {
        let path = self.path_for(host);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path).map_err(io_error(&path))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Format { path, source })
    }

    fn save(
        &self,
        host: &str,
        namespaces: &BTreeMap<String, ValueStore>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(host);
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let serialized = serde_json::to_string_pretty(namespaces)
            .map_err(|source| StoreError::Format { path: path.clone(), source })?;

        // write-then-rename keeps the previous state if we die half way
        let tmp_path = path.with_extension("json.new");
        fs::write(&tmp_path, serialized).map_err(io_error(&tmp_path))?;
        fs::rename(&tmp_path, &path).map_err(io_error(&path))
    }
}

/// Keeps state in memory; used for previews and tests
#[derive(Default)]
pub struct MemoryBackend {
    hosts: Mutex<HashMap<String, BTreeMap<String, ValueStore>>>,
    saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self, host: &str) -> Result<BTreeMap<String, ValueStore>, StoreError> {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(hosts.get(host).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        host: &str,
        namespaces: &BTreeMap<String, ValueStore>,
    ) -> Result<(), StoreError> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.insert(host.to_string(), namespaces.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("counters"));

        assert!(backend.load("web01").unwrap().is_empty());

        let mut values = ValueStore::new();
        values.set("rate", serde_json::json!([1.0, 2.0]));
        let mut namespaces = BTreeMap::new();
        namespaces.insert("if/eth0".to_string(), values);
        backend.save("web01", &namespaces).unwrap();

        assert_eq!(backend.load("web01").unwrap(), namespaces);
    }

    #[test]
    fn test_file_backend_corrupt_file() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        fs::write(backend.path_for("web01"), "{not json").unwrap();

        assert!(matches!(backend.load("web01"), Err(StoreError::Format { .. })));
    }
}
