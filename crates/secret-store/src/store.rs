//! The storage contract shared by every backend

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// One opaque record addressed by `(namespace, key)`.
///
/// Implementations do no internal locking beyond what their medium needs;
/// callers serialize access to the same record.
pub trait SecretStore: Send + Sync {
    /// Whether a record is currently stored.
    fn exists(&self) -> bool;

    /// Read the raw record. Fails with [`Error::NotFound`] when absent.
    fn get_raw(&self) -> Result<Vec<u8>>;

    /// Replace the record.
    fn set_raw(&self, data: &[u8]) -> Result<()>;

    /// Remove the record. Fails with [`Error::NotFound`] when absent.
    fn delete(&self) -> Result<()>;
}

/// Typed access on top of [`SecretStore`], JSON-encoded on every backend.
pub trait SecretStoreExt: SecretStore {
    fn get<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.get_raw()?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Serialization(format!("decoding record: {e}")))
    }

    fn set<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_vec(value)
            .map_err(|e| Error::Serialization(format!("encoding record: {e}")))?;
        self.set_raw(&raw)
    }
}

impl<S: SecretStore + ?Sized> SecretStoreExt for S {}

/// Display label for a record, used in errors and logs.
pub(crate) fn record_label(namespace: &str, key: &str) -> String {
    format!("{namespace}/{key}")
}
