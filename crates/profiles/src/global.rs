//! Profile registry
//!
//! The registry lists every known profile and names the default. It lives
//! in its own record, separate from the profiles, and is written after
//! every mutation.

use secret_store::{SecretStore, SecretStoreExt, StoreBackend};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::GLOBAL_KEY;
use crate::error::{Error, Result};

/// Persisted registry: `{profiles, defaultProfile}`.
///
/// `default_profile` is empty or a member of `profiles`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub default_profile: String,
}

impl GlobalConfig {
    pub fn profile_exists(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p == name)
    }

    pub fn default_profile(&self) -> Option<&str> {
        Some(self.default_profile.as_str()).filter(|d| !d.is_empty())
    }
}

pub struct GlobalStore {
    store: Box<dyn SecretStore>,
    config: GlobalConfig,
}

impl GlobalStore {
    /// Load the registry, creating and persisting an empty one on first run.
    ///
    /// Only a missing record counts as a first run. Any other read failure
    /// is returned so a temporarily unreadable registry is never replaced.
    pub fn load_or_create(backend: &StoreBackend, namespace: &str) -> Result<Self> {
        let store = backend.open(namespace, GLOBAL_KEY)?;
        match store.get::<GlobalConfig>() {
            Ok(config) => {
                debug!(profiles = config.profiles.len(), "loaded profile registry");
                return Ok(Self { store, config });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let global = Self {
            store,
            config: GlobalConfig::default(),
        };
        global.save()?;
        info!("created empty profile registry");
        Ok(global)
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn save(&self) -> Result<()> {
        self.store.set(&self.config)?;
        Ok(())
    }

    pub fn profile_exists(&self, name: &str) -> bool {
        self.config.profile_exists(name)
    }

    pub fn list_profiles(&self) -> &[String] {
        &self.config.profiles
    }

    pub fn default_profile(&self) -> Option<&str> {
        self.config.default_profile()
    }

    /// Register `name`. Fails if it is already registered.
    pub fn add_profile(&mut self, name: &str) -> Result<()> {
        if self.profile_exists(name) {
            return Err(Error::ProfileAlreadyExists(name.to_owned()));
        }
        self.config.profiles.push(name.to_owned());
        self.save()
    }

    /// Unregister `name`, clearing the default pointer if it pointed there.
    pub fn remove_profile(&mut self, name: &str) -> Result<()> {
        if !self.profile_exists(name) {
            return Err(Error::ProfileDoesNotExist(name.to_owned()));
        }
        self.config.profiles.retain(|p| p != name);
        if self.config.default_profile == name {
            self.config.default_profile.clear();
        }
        self.save()
    }

    /// Point the default at `name`. Unregistered names are refused and
    /// leave the registry unchanged.
    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        if !self.profile_exists(name) {
            return Err(Error::ProfileDoesNotExist(name.to_owned()));
        }
        self.config.default_profile = name.to_owned();
        self.save()
    }

    /// Remove the registry record itself.
    pub(crate) fn delete(self) -> Result<()> {
        self.store.delete()?;
        Ok(())
    }

    /// Replace the whole registry and persist it.
    pub(crate) fn replace(&mut self, config: GlobalConfig) -> Result<()> {
        self.config = config;
        self.save()
    }
}
