//! Volatile in-process store
//!
//! Used for flag-supplied credentials that must never reach disk. Records are
//! held as the same JSON bytes the persistent backends write, so values read
//! back are identical across backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::store::{SecretStore, record_label};

/// Map shared by every store opened from one in-memory backend.
pub type SharedMemory = Arc<Mutex<HashMap<(String, String), Vec<u8>>>>;

pub struct MemoryStore {
    namespace: String,
    key: String,
    memory: SharedMemory,
}

impl MemoryStore {
    /// A store backed by its own private map.
    pub fn new(namespace: &str, key: &str) -> Self {
        Self::with_memory(namespace, key, SharedMemory::default())
    }

    /// A store backed by `memory`, visible to other stores sharing it.
    pub fn with_memory(namespace: &str, key: &str, memory: SharedMemory) -> Self {
        Self {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            memory,
        }
    }

    fn slot(&self) -> (String, String) {
        (self.namespace.clone(), self.key.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<(String, String), Vec<u8>>>> {
        self.memory
            .lock()
            .map_err(|_| Error::Io("in-memory store lock poisoned".into()))
    }
}

impl SecretStore for MemoryStore {
    fn exists(&self) -> bool {
        self.lock()
            .map(|m| m.contains_key(&self.slot()))
            .unwrap_or(false)
    }

    fn get_raw(&self) -> Result<Vec<u8>> {
        self.lock()?
            .get(&self.slot())
            .cloned()
            .ok_or_else(|| Error::NotFound(record_label(&self.namespace, &self.key)))
    }

    fn set_raw(&self, data: &[u8]) -> Result<()> {
        self.lock()?.insert(self.slot(), data.to_vec());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.lock()?
            .remove(&self.slot())
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(record_label(&self.namespace, &self.key)))
    }
}
