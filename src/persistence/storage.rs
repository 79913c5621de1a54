//! Storage Media
//!
//! The synchronous string store the cache persists into, with an in-memory
//! implementation for tests and embedding and a directory-backed one for
//! durable use.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PersistenceError;

// == Key Value Storage ==
/// A bounded string-keyed medium, in the manner of browser local storage.
///
/// `get_item` returns `Ok(None)` on a miss. `set_item` may fail when the
/// medium is full.
pub trait KeyValueStorage: Send + Sync + Debug {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

// == Memory Storage ==
/// In-process storage. Clones share the same items, so a cache can be
/// rebuilt over the medium another cache wrote to.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
    /// Total bytes (keys plus values) the medium accepts
    capacity: Option<usize>,
}

impl MemoryStorage {
    /// Creates an unbounded medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a medium that rejects writes past `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Bytes currently held, keys included.
    pub fn used_bytes(&self) -> usize {
        self.items
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut items = self.items.lock();

        if let Some(capacity) = self.capacity {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > capacity {
                return Err(PersistenceError::QuotaExceeded { needed, capacity });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// == File Storage ==
/// One file per key inside a directory. Writes go through a temporary file
/// and a rename so a crash never leaves a half-written item.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    /// Largest single item accepted, in bytes
    max_item_bytes: Option<usize>,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_item_bytes: None,
        })
    }

    /// Rejects items larger than `max_item_bytes`.
    pub fn with_max_item_bytes(mut self, max_item_bytes: usize) -> Self {
        self.max_item_bytes = Some(max_item_bytes);
        self
    }

    /// File names are the hex-encoded key, so distinct keys never share a file
    /// and no key can address a path outside `dir`.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if let Some(capacity) = self.max_item_bytes {
            if value.len() > capacity {
                return Err(PersistenceError::QuotaExceeded {
                    needed: value.len(),
                    capacity,
                });
            }
        }

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
