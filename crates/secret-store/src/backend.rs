//! Backend selection
//!
//! One [`StoreBackend`] is chosen at process start and every record store is
//! opened through it. Selection order:
//! 1. an explicit driver name wins;
//! 2. otherwise a configured profile directory selects the file store;
//! 3. otherwise the OS vault is used when its probe succeeds;
//! 4. failing that, the encrypted file store in the default directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::file_store::{self, FileStore};
use crate::keyring_store::KeyringStore;
use crate::memory_store::{MemoryStore, SharedMemory};
use crate::store::SecretStore;
use crate::vault::Vault;

/// Storage driver names accepted from config and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Keyring,
    FileSystem,
    InMemory,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Keyring => "keyring",
            Driver::FileSystem => "filesystem",
            Driver::InMemory => "in-memory",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Driver::Keyring),
            "filesystem" | "file" => Ok(Driver::FileSystem),
            "in-memory" | "memory" => Ok(Driver::InMemory),
            other => Err(Error::UnknownDriver(other.to_owned())),
        }
    }
}

/// A configured storage backend that opens per-record stores.
#[derive(Clone)]
pub enum StoreBackend {
    Keyring { vault: Arc<dyn Vault> },
    FileSystem { dir: PathBuf, vault: Arc<dyn Vault> },
    InMemory { memory: SharedMemory },
}

impl fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Keyring { .. } => f.write_str("StoreBackend::Keyring"),
            StoreBackend::FileSystem { dir, .. } => f
                .debug_struct("StoreBackend::FileSystem")
                .field("dir", dir)
                .finish(),
            StoreBackend::InMemory { .. } => f.write_str("StoreBackend::InMemory"),
        }
    }
}

impl StoreBackend {
    pub fn keyring(vault: Arc<dyn Vault>) -> Self {
        StoreBackend::Keyring { vault }
    }

    /// File store rooted at `dir`. The directory is created and checked for
    /// write access immediately.
    pub fn file_system(dir: impl Into<PathBuf>, vault: Arc<dyn Vault>) -> Result<Self> {
        let dir = dir.into();
        file_store::prepare_dir(&dir)?;
        Ok(StoreBackend::FileSystem { dir, vault })
    }

    /// Process-local backend. All stores opened from it (and from its
    /// clones) share one map.
    pub fn in_memory() -> Self {
        StoreBackend::InMemory {
            memory: SharedMemory::default(),
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            StoreBackend::Keyring { .. } => Driver::Keyring,
            StoreBackend::FileSystem { .. } => Driver::FileSystem,
            StoreBackend::InMemory { .. } => Driver::InMemory,
        }
    }

    /// Whether records survive the process.
    pub fn is_persistent(&self) -> bool {
        self.driver() != Driver::InMemory
    }

    /// Open the store for one record.
    pub fn open(&self, namespace: &str, key: &str) -> Result<Box<dyn SecretStore>> {
        match self {
            StoreBackend::Keyring { vault } => {
                Ok(Box::new(KeyringStore::new(namespace, key, vault.clone())))
            }
            StoreBackend::FileSystem { dir, vault } => {
                Ok(Box::new(FileStore::new(dir, namespace, key, vault.clone())?))
            }
            StoreBackend::InMemory { memory } => Ok(Box::new(MemoryStore::with_memory(
                namespace,
                key,
                memory.clone(),
            ))),
        }
    }

    /// Pick the backend for this process.
    pub fn select(
        driver: Option<&str>,
        profile_dir: Option<&Path>,
        namespace: &str,
        vault: Arc<dyn Vault>,
    ) -> Result<Self> {
        Self::select_with(driver, profile_dir, namespace, vault, file_store::default_dir)
    }

    /// [`StoreBackend::select`] with the file store fallback directory
    /// supplied by `default_dir`, consulted only when no profile directory
    /// is configured.
    fn select_with(
        driver: Option<&str>,
        profile_dir: Option<&Path>,
        namespace: &str,
        vault: Arc<dyn Vault>,
        default_dir: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let dir = || match profile_dir {
            Some(dir) => Ok(dir.to_path_buf()),
            None => default_dir(),
        };
        let backend = match driver.map(Driver::from_str).transpose()? {
            Some(Driver::Keyring) => Self::keyring(vault),
            Some(Driver::InMemory) => Self::in_memory(),
            Some(Driver::FileSystem) => Self::file_system(dir()?, vault)?,
            None if profile_dir.is_some() => Self::file_system(dir()?, vault)?,
            None if vault.is_available(namespace) => Self::keyring(vault),
            None => Self::file_system(dir()?, vault)?,
        };
        info!(driver = %backend.driver(), "selected profile store backend");
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretStoreExt;
    use crate::vault::MockVault;

    /// A vault whose availability probe always fails.
    struct UnavailableVault;

    impl Vault for UnavailableVault {
        fn get(&self, _: &str, _: &str) -> Result<Option<String>> {
            Err(Error::Vault("no keychain".into()))
        }
        fn set(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Err(Error::Vault("no keychain".into()))
        }
        fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(Error::Vault("no keychain".into()))
        }
        fn is_available(&self, _: &str) -> bool {
            false
        }
    }

    #[test]
    fn driver_parsing_is_case_insensitive() {
        assert_eq!("KEYRING".parse::<Driver>().unwrap(), Driver::Keyring);
        assert_eq!("FileSystem".parse::<Driver>().unwrap(), Driver::FileSystem);
        assert_eq!(" in-memory ".parse::<Driver>().unwrap(), Driver::InMemory);
        assert!(matches!("s3".parse::<Driver>(), Err(Error::UnknownDriver(_))));
    }

    #[test]
    fn config_driver_names_all_parse() {
        for name in common::STORE_DRIVERS {
            assert!(name.parse::<Driver>().is_ok(), "{name}");
        }
    }

    #[test]
    fn driver_display_roundtrips() {
        for driver in [Driver::Keyring, Driver::FileSystem, Driver::InMemory] {
            assert_eq!(driver.to_string().parse::<Driver>().unwrap(), driver);
        }
    }

    #[test]
    fn explicit_driver_wins() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::select(
            Some("in-memory"),
            Some(dir.path()),
            "platformctl",
            Arc::new(MockVault::new()),
        )
        .unwrap();
        assert_eq!(backend.driver(), Driver::InMemory);
        assert!(!backend.is_persistent());
    }

    #[test]
    fn profile_dir_selects_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::select(
            None,
            Some(dir.path()),
            "platformctl",
            Arc::new(MockVault::new()),
        )
        .unwrap();
        assert_eq!(backend.driver(), Driver::FileSystem);
    }

    #[test]
    fn available_vault_selects_keyring() {
        let backend =
            StoreBackend::select(None, None, "platformctl", Arc::new(MockVault::new())).unwrap();
        assert_eq!(backend.driver(), Driver::Keyring);
    }

    #[test]
    fn unavailable_vault_falls_back_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("profiles");
        let backend = StoreBackend::select_with(
            None,
            None,
            "platformctl",
            Arc::new(UnavailableVault),
            || Ok(fallback.clone()),
        )
        .unwrap();
        assert_eq!(backend.driver(), Driver::FileSystem);
        assert!(matches!(&backend, StoreBackend::FileSystem { dir, .. } if *dir == fallback));
        assert!(fallback.is_dir());
    }

    #[test]
    fn available_vault_never_touches_fallback_dir() {
        let backend = StoreBackend::select_with(
            None,
            None,
            "platformctl",
            Arc::new(MockVault::new()),
            || Err(Error::Directory("fallback dir consulted".into())),
        )
        .unwrap();
        assert_eq!(backend.driver(), Driver::Keyring);
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let err = StoreBackend::select(
            Some("carrier-pigeon"),
            None,
            "platformctl",
            Arc::new(MockVault::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownDriver(_)));
    }

    #[test]
    fn in_memory_clones_share_records() {
        let backend = StoreBackend::in_memory();
        let other = backend.clone();

        backend.open("ns", "k").unwrap().set(&"value").unwrap();
        let back: String = other.open("ns", "k").unwrap().get().unwrap();
        assert_eq!(back, "value");
    }

    #[test]
    fn backends_return_identical_values() {
        let dir = tempfile::tempdir().unwrap();
        let vault: Arc<dyn Vault> = Arc::new(MockVault::new());
        let backends = [
            StoreBackend::keyring(vault.clone()),
            StoreBackend::file_system(dir.path(), vault.clone()).unwrap(),
            StoreBackend::in_memory(),
        ];

        let value = serde_json::json!({"p": "dev", "e": "https://h:443", "t": false});
        for backend in &backends {
            let store = backend.open("platformctl", "profile-dev").unwrap();
            store.set(&value).unwrap();
            let back: serde_json::Value = store.get().unwrap();
            assert_eq!(back, value, "{backend:?}");
            store.delete().unwrap();
            assert!(!store.exists());
        }
    }
}
