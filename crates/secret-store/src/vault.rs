//! Access to the OS credential vault
//!
//! [`OsVault`] talks to the platform keychain through `keyring`. [`MockVault`]
//! keeps entries in process memory and stands in for the OS vault in tests
//! and on hosts without a keychain.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{Error, Result};

/// A string secret store keyed by `(service, account)`.
pub trait Vault: Send + Sync {
    /// Read an entry. `Ok(None)` when nothing is stored under the id.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// Remove an entry. Fails with [`Error::NotFound`] when absent.
    fn delete(&self, service: &str, account: &str) -> Result<()>;

    /// Whether the vault can be used at all on this host.
    fn is_available(&self, _service: &str) -> bool {
        true
    }
}

/// The platform credential vault (Keychain, Credential Manager, kernel keyring).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsVault;

const PROBE_ACCOUNT: &str = "__availability_probe__";

fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(service, account)
        .map_err(|e| Error::Vault(format!("opening entry {service}/{account}: {e}")))
}

impl Vault for OsVault {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        match entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Vault(format!(
                "reading entry {service}/{account}: {e}"
            ))),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        entry(service, account)?
            .set_password(secret)
            .map_err(|e| Error::Vault(format!("writing entry {service}/{account}: {e}")))
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        match entry(service, account)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                Err(Error::NotFound(format!("vault entry {service}/{account}")))
            }
            Err(e) => Err(Error::Vault(format!(
                "deleting entry {service}/{account}: {e}"
            ))),
        }
    }

    /// A lookup that ends in anything other than found/not-found means the
    /// platform vault is missing or locked.
    fn is_available(&self, service: &str) -> bool {
        let available = match keyring::Entry::new(service, PROBE_ACCOUNT) {
            Ok(entry) => matches!(entry.get_password(), Ok(_) | Err(keyring::Error::NoEntry)),
            Err(_) => false,
        };
        debug!(service, available, "probed OS credential vault");
        available
    }
}

/// In-process vault.
#[derive(Debug, Default)]
pub struct MockVault {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MockVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Vault("mock vault lock poisoned".into()))
    }
}

impl Vault for MockVault {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        let entries = self.lock()?;
        Ok(entries
            .get(&(service.to_owned(), account.to_owned()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert((service.to_owned(), account.to_owned()), secret.to_owned());
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        let mut entries = self.lock()?;
        entries
            .remove(&(service.to_owned(), account.to_owned()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("vault entry {service}/{account}")))
    }
}
