//! Key-value persistence for chat history and session data.
//!
//! [`KeyValueStore`] is the raw capability: string values under string keys,
//! every operation fallible. [`SafeStorage`] wraps a store and never fails:
//! reads fall back to a default, writes report success as a `bool`, and
//! every refusal is logged with `warn!`. Callers that only want "remember
//! this if you can" use `SafeStorage`; nothing in the crate treats a storage
//! failure as fatal.

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Key written and removed by [`SafeStorage::is_available`].
const PROBE_KEY: &str = "__storage_test__";

/// Raw string key-value capability.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries()?.clear();
        Ok(())
    }
}

// ── File-backed store ────────────────────────────────────────────────────────

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Atomic write: write to temp, then rename
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Stored {} bytes under '{key}'", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

// ── Safe wrapper ─────────────────────────────────────────────────────────────

/// Infallible JSON facade over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SafeStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SafeStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// In-memory storage, for tests and one-shot runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Whether the backing store accepts a write and a remove.
    pub fn is_available(&self) -> bool {
        self.store
            .set(PROBE_KEY, "test")
            .and_then(|_| self.store.remove(PROBE_KEY))
            .is_ok()
    }

    /// Read and decode `key`, or return `default` when it is missing,
    /// unreadable or not valid JSON for `T`.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        if !self.is_available() {
            return default;
        }

        match self.store.get(key) {
            Ok(None) => default,
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Failed to retrieve '{key}' from storage: {e}");
                default
            }),
            Err(e) => {
                warn!("Failed to retrieve '{key}' from storage: {e}");
                default
            }
        }
    }

    /// Encode and store `value`; `false` when the store refused.
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        if !self.is_available() {
            return false;
        }

        let result = serde_json::to_string(value)
            .map_err(|e| e.to_string())
            .and_then(|s| self.store.set(key, &s).map_err(|e| e.to_string()));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to set '{key}' in storage: {e}");
                false
            }
        }
    }

    pub fn remove_item(&self, key: &str) -> bool {
        if !self.is_available() {
            return false;
        }

        match self.store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove '{key}' from storage: {e}");
                false
            }
        }
    }

    pub fn clear(&self) -> bool {
        if !self.is_available() {
            return false;
        }

        match self.store.clear() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear storage: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// Refuses every operation, like a browser in private mode.
    struct Locked;

    impl KeyValueStore for Locked {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("locked".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".into()))
        }
        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".into()))
        }
    }

    /// Accepts the probe but rejects large values.
    struct Tiny {
        inner: MemoryStore,
    }

    impl KeyValueStore for Tiny {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if value.len() > 16 {
                return Err(StorageError::QuotaExceeded { key: key.into() });
            }
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        level: String,
    }

    #[test]
    fn roundtrip_in_memory() {
        let s = SafeStorage::in_memory();
        assert!(s.is_available());
        assert!(s.set_item("prefs", &Prefs { level: "N3".into() }));
        let p: Prefs = s.get_item("prefs", Prefs { level: "N5".into() });
        assert_eq!(p.level, "N3");
    }

    #[test]
    fn missing_and_corrupt_values_fall_back() {
        let store = Arc::new(MemoryStore::new());
        store.set("bad", "{not json").unwrap();
        let s = SafeStorage::new(store);
        assert_eq!(s.get_item("absent", 7u32), 7);
        assert_eq!(s.get_item("bad", vec![1u8]), vec![1u8]);
    }

    #[test]
    fn locked_store_degrades_quietly() {
        let s = SafeStorage::new(Arc::new(Locked));
        assert!(!s.is_available());
        assert_eq!(s.get_item("k", "default".to_string()), "default");
        assert!(!s.set_item("k", "v"));
        assert!(!s.remove_item("k"));
        assert!(!s.clear());
    }

    #[test]
    fn quota_exceeded_is_false() {
        let s = SafeStorage::new(Arc::new(Tiny {
            inner: MemoryStore::new(),
        }));
        assert!(s.set_item("k", "short"));
        assert!(!s.set_item("k", &"x".repeat(100)));
        assert_eq!(s.get_item("k", String::new()), "short");
    }

    #[test]
    fn json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let s = SafeStorage::new(Arc::new(JsonFileStore::open(dir.path()).unwrap()));
            assert!(s.set_item("formData", &Prefs { level: "N2".into() }));
        }
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.dir().join("formData.json").exists());
        let s = SafeStorage::new(Arc::new(store));
        let p: Prefs = s.get_item("formData", Prefs { level: "N5".into() });
        assert_eq!(p.level, "N2");

        assert!(s.remove_item("formData"));
        assert!(s.remove_item("formData"));
        assert!(!dir.path().join("formData.json").exists());
    }

    #[test]
    fn json_file_store_clear_and_key_sanitising() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.set("a/b", "1").unwrap();
        assert!(dir.path().join("a_b.json").exists());
        store.clear().unwrap();
        assert_eq!(store.get("a/b").unwrap(), None);
    }
}
