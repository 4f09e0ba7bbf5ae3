use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::StorageError;

/// Local durable key-value store holding whole serialized values per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let target = self.path_for(key);
        let temp = target.with_extension("json.tmp");
        if let Err(err) = write_then_rename(&temp, &target, value) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn write_then_rename(temp: &Path, target: &Path, value: &str) -> io::Result<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;
    fs::rename(temp, target)
}

/// Process-local store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: impl Into<String>) -> Self {
        self.entries.write().insert(key.to_string(), value.into());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_and_reports_missing_keys() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::new(temp.path().join("nested"));

        assert!(store.get("habits").expect("read missing").is_none());
        store.set("habits", "[]").expect("write");
        assert_eq!(store.get("habits").expect("read").as_deref(), Some("[]"));
        assert!(store.path_for("habits").ends_with("habits.json"));

        store.remove("habits").expect("remove");
        store.remove("habits").expect("second remove is a no-op");
        assert!(store.get("habits").expect("read removed").is_none());
    }

    #[test]
    fn memory_store_overwrites_values() {
        let store = MemoryStore::new().with_entry("k", "one");
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        let target = store.path_for("habits");
        fs::create_dir_all(target.join("blocker")).expect("occupy target");

        assert!(store.set("habits", "[]").is_err());
        assert!(!target.with_extension("json.tmp").exists());
        assert!(target.is_dir());
    }
}
