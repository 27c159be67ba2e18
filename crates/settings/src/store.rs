use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::write_atomic_creating_parents;

/// 鍵值儲存的錯誤。 / Errors raised by key-value stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("store {path} is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

/// 工作階段使用的持久化鍵值儲存；內容對呼叫端為不透明位元組。 / Persistent key-value store holding opaque blobs.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&mut self, key: &str, blob: Vec<u8>) -> Result<(), StoreError>;
}

/// 僅存在記憶體中的儲存，主要用於測試。 / Volatile store, mostly useful for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), blob);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// 以單一 JSON 檔保存的鍵值儲存，值以 base64 編碼。 / Key-value store backed by one JSON file with base64 values.
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_file(&self) -> Result<StoreFile, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|err| StoreError::Corrupted {
                    path: self.path.clone(),
                    reason: err.to_string(),
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save_file(&self, file: &StoreFile) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(file).map_err(|err| StoreError::Corrupted {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        write_atomic_creating_parents(&self.path, &payload).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let file = self.load_file()?;
        let Some(encoded) = file.entries.get(key) else {
            return Ok(None);
        };
        BASE64
            .decode(encoded.as_bytes())
            .map(Some)
            .map_err(|err| StoreError::Corrupted {
                path: self.path.clone(),
                reason: format!("entry '{key}': {err}"),
            })
    }

    fn set(&mut self, key: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        // 損毀的檔案直接覆寫，而非阻擋後續儲存。 / A corrupted file is replaced rather than blocking every later save.
        let mut file = match self.load_file() {
            Ok(file) => file,
            Err(StoreError::Corrupted { .. }) => StoreFile::default(),
            Err(err) => return Err(err),
        };
        file.entries.insert(key.to_string(), BASE64.encode(blob));
        self.save_file(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_store_persists_blobs_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = JsonFileStore::new(&path);
        store.set("session", b"\x00\xFFbinary".to_vec()).unwrap();
        store.set("geometry", b"800x600".to_vec()).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("session").unwrap().as_deref(),
            Some(&b"\x00\xFFbinary"[..])
        );
        assert_eq!(
            reopened.get("geometry").unwrap().as_deref(),
            Some(&b"800x600"[..])
        );
        assert!(reopened.get("missing").unwrap().is_none());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.get("session").unwrap().is_none());
    }

    #[test]
    fn corrupted_file_is_reported_then_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get("session"),
            Err(StoreError::Corrupted { .. })
        ));

        store.set("session", b"fresh".to_vec()).unwrap();
        assert_eq!(store.get("session").unwrap(), Some(b"fresh".to_vec()));
    }

    #[test]
    fn memory_store_overwrites_values() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("k", vec![1]).unwrap();
        store.set("k", vec![2]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap(), Some(vec![2]));
    }
}
