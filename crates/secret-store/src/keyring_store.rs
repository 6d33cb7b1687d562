//! Store records directly in the credential vault
//!
//! The JSON record is kept as a single opaque string entry under
//! `(namespace, key)`. Vault entries are size-limited on some platforms, so
//! this backend suits small records such as the profile registry.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{SecretStore, record_label};
use crate::vault::Vault;

pub struct KeyringStore {
    namespace: String,
    key: String,
    vault: Arc<dyn Vault>,
}

impl KeyringStore {
    pub fn new(namespace: &str, key: &str, vault: Arc<dyn Vault>) -> Self {
        Self {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            vault,
        }
    }
}

impl SecretStore for KeyringStore {
    fn exists(&self) -> bool {
        matches!(self.vault.get(&self.namespace, &self.key), Ok(Some(s)) if !s.is_empty())
    }

    fn get_raw(&self) -> Result<Vec<u8>> {
        match self.vault.get(&self.namespace, &self.key)? {
            Some(value) if !value.is_empty() => Ok(value.into_bytes()),
            _ => Err(Error::NotFound(record_label(&self.namespace, &self.key))),
        }
    }

    fn set_raw(&self, data: &[u8]) -> Result<()> {
        let value = std::str::from_utf8(data)
            .map_err(|e| Error::Serialization(format!("vault records must be UTF-8: {e}")))?;
        self.vault.set(&self.namespace, &self.key, value)?;
        debug!(
            namespace = self.namespace,
            key = self.key,
            bytes = data.len(),
            "stored record in vault"
        );
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.vault.delete(&self.namespace, &self.key)?;
        debug!(namespace = self.namespace, key = self.key, "deleted record from vault");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretStoreExt;
    use crate::vault::MockVault;
    use std::collections::BTreeMap;

    fn store(vault: &Arc<MockVault>, key: &str) -> KeyringStore {
        KeyringStore::new("platformctl", key, vault.clone())
    }

    #[test]
    fn roundtrip_through_vault() {
        let vault = Arc::new(MockVault::new());
        let s = store(&vault, "global");

        let mut value = BTreeMap::new();
        value.insert("defaultProfile".to_string(), "dev".to_string());
        s.set(&value).unwrap();

        assert!(s.exists());
        let back: BTreeMap<String, String> = s.get().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn record_is_stored_compactly() {
        let vault = Arc::new(MockVault::new());
        let s = store(&vault, "profile-dev");
        s.set(&serde_json::json!({"p": "dev", "t": false})).unwrap();

        let raw = vault.get("platformctl", "profile-dev").unwrap().unwrap();
        assert!(!raw.contains('\n'));
        assert!(!raw.contains(": "));
    }

    #[test]
    fn absent_record_fails_distinctly() {
        let vault = Arc::new(MockVault::new());
        let s = store(&vault, "absent");
        assert!(!s.exists());
        let err = s.get::<String>().unwrap_err();
        assert!(err.is_not_found(), "got: {err}");
    }

    #[test]
    fn empty_entry_does_not_count_as_existing() {
        let vault = Arc::new(MockVault::new());
        vault.set("platformctl", "blank", "").unwrap();
        let s = store(&vault, "blank");
        assert!(!s.exists());
        assert!(s.get_raw().unwrap_err().is_not_found());
    }

    #[test]
    fn vault_read_failure_propagates() {
        struct LockedVault;

        impl Vault for LockedVault {
            fn get(&self, _: &str, _: &str) -> Result<Option<String>> {
                Err(Error::Vault("locked".into()))
            }
            fn set(&self, _: &str, _: &str, _: &str) -> Result<()> {
                Err(Error::Vault("locked".into()))
            }
            fn delete(&self, _: &str, _: &str) -> Result<()> {
                Err(Error::Vault("locked".into()))
            }
        }

        let s = KeyringStore::new("platformctl", "global", Arc::new(LockedVault));
        let err = s.get_raw().unwrap_err();
        assert!(matches!(err, Error::Vault(_)), "got: {err}");
    }

    #[test]
    fn delete_removes_entry() {
        let vault = Arc::new(MockVault::new());
        let s = store(&vault, "profile-dev");
        s.set(&1u32).unwrap();
        s.delete().unwrap();
        assert!(vault.is_empty());
        assert!(s.delete().unwrap_err().is_not_found());
    }
}
