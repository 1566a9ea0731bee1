//! Durable key-value stores holding encoded chunks.
//!
//! The streaming core only needs `has`/`get`/`set` over text values keyed by
//! [`ChunkCoord::store_key`](crate::ChunkCoord::store_key). Two backends are
//! provided: [`MemoryStore`] for tests and ephemeral worlds, and [`DirStore`]
//! which keeps one file per key in a directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// File extension used by [`DirStore`].
const DIR_STORE_EXT: &str = "b64";

/// Failures of the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The key cannot be represented by this backend.
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
    /// An I/O error from a file-backed store.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}

/// String-keyed text property store.
pub trait ChunkStore {
    /// Returns `true` if a value exists for `key`.
    fn has(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

impl<S: ChunkStore + ?Sized> ChunkStore for Box<S> {
    fn has(&self, key: &str) -> Result<bool, StoreError> {
        (**self).has(key)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store. Contents vanish with the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: FxHashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over stored keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl ChunkStore for MemoryStore {
    fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DirStore
// ---------------------------------------------------------------------------

/// Directory-backed store: each key becomes `<dir>/<key>.b64`.
///
/// Writes go through a temporary file and a rename so a crash mid-write never
/// leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("Opened chunk store at {}", root.display());
        Ok(Self { root })
    }

    /// Directory holding the values.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ',' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(format!("{key}.{DIR_STORE_EXT}")))
    }
}

impl ChunkStore for DirStore {
    fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_has() {
        let mut store = MemoryStore::new();
        assert!(!store.has("chunk_0,0,0").unwrap());
        assert_eq!(store.get("chunk_0,0,0").unwrap(), None);

        store.set("chunk_0,0,0", "abc".to_string()).unwrap();
        assert!(store.has("chunk_0,0,0").unwrap());
        assert_eq!(store.get("chunk_0,0,0").unwrap().as_deref(), Some("abc"));
        assert_eq!(store.len(), 1);

        store.set("chunk_0,0,0", "def".to_string()).unwrap();
        assert_eq!(store.get("chunk_0,0,0").unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_dir_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = DirStore::open(dir.path()).unwrap();
            store.set("chunk_-1,0,2", "payload".to_string()).unwrap();
        }
        let store = DirStore::open(dir.path()).unwrap();
        assert!(store.has("chunk_-1,0,2").unwrap());
        assert_eq!(
            store.get("chunk_-1,0,2").unwrap().as_deref(),
            Some("payload")
        );
        assert!(dir.path().join("chunk_-1,0,2.b64").is_file());
    }

    #[test]
    fn test_dir_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert!(!store.has("chunk_9,9,9").unwrap());
        assert_eq!(store.get("chunk_9,9,9").unwrap(), None);
    }

    #[test]
    fn test_dir_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set("../escape", String::new()),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.has(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_boxed_store_forwards() {
        let mut store: Box<dyn ChunkStore> = Box::new(MemoryStore::new());
        store.set("k", "v".to_string()).unwrap();
        assert!(store.has("k").unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
