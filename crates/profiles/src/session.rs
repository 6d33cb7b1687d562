//! Profile session for one CLI invocation
//!
//! [`Session`] owns the storage backend, the registry and the currently
//! active profile. It is created once per process and passed to command
//! handlers; there is no global "current profile".
//!
//! Registry invariant: every registered name has a readable profile
//! record. Adds write the profile before registering it, deletes remove the
//! record before unregistering it, and [`Session::new`] prunes names whose
//! record has gone missing (e.g. after an interrupted delete).

use secret_store::StoreBackend;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::global::{GlobalConfig, GlobalStore};
use crate::profile::ProfileStore;

pub struct Session {
    backend: StoreBackend,
    namespace: String,
    global: GlobalStore,
    current: Option<ProfileStore>,
}

impl Session {
    /// Open a session under the application namespace.
    pub fn new(backend: StoreBackend) -> Result<Self> {
        Self::with_namespace(backend, common::APP_NAME)
    }

    /// Open a session under `namespace`, loading (or creating) the registry
    /// and reconciling it against the stored profiles.
    pub fn with_namespace(backend: StoreBackend, namespace: &str) -> Result<Self> {
        let global = GlobalStore::load_or_create(&backend, namespace)?;
        let mut session = Self {
            backend,
            namespace: namespace.to_owned(),
            global,
            current: None,
        };
        session.reconcile()?;
        Ok(session)
    }

    fn reconcile(&mut self) -> Result<()> {
        let config = self.global.config();
        let mut repaired = GlobalConfig {
            profiles: Vec::with_capacity(config.profiles.len()),
            default_profile: config.default_profile.clone(),
        };
        for name in &config.profiles {
            if ProfileStore::exists(&self.backend, &self.namespace, name)? {
                repaired.profiles.push(name.clone());
            } else {
                warn!(profile = name, "registered profile has no stored record, unregistering");
            }
        }
        let default = &repaired.default_profile;
        if !default.is_empty() && !repaired.profile_exists(default) {
            warn!(profile = default, "default profile is not registered, clearing");
            repaired.default_profile.clear();
        }

        if &repaired != config {
            self.global.replace(repaired)?;
            info!("profile registry repaired");
        }
        Ok(())
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn global(&self) -> &GlobalConfig {
        self.global.config()
    }

    pub fn list_profiles(&self) -> &[String] {
        self.global.list_profiles()
    }

    pub fn profile_exists(&self, name: &str) -> bool {
        self.global.profile_exists(name)
    }

    /// Create and register a profile, optionally making it the default.
    ///
    /// The profile record is written before the registry entry.
    pub fn add_profile(
        &mut self,
        name: &str,
        endpoint: &str,
        tls_no_verify: bool,
        set_default: bool,
    ) -> Result<()> {
        let profile =
            ProfileStore::new(&self.backend, &self.namespace, name, endpoint, tls_no_verify)?;
        if self.global.profile_exists(name) {
            return Err(Error::ProfileAlreadyExists(name.to_owned()));
        }

        profile.save()?;
        self.global.add_profile(name)?;
        if set_default {
            self.global.set_default_profile(name)?;
        }
        info!(profile = name, endpoint = profile.endpoint(), set_default, "profile added");
        Ok(())
    }

    /// Load a registered profile without making it current.
    pub fn get_profile(&self, name: &str) -> Result<ProfileStore> {
        if !self.global.profile_exists(name) {
            return Err(Error::ProfileDoesNotExist(name.to_owned()));
        }
        ProfileStore::load(&self.backend, &self.namespace, name)
    }

    /// Make `name` the current profile.
    ///
    /// Already current: returned as is, without reloading.
    pub fn use_profile(&mut self, name: &str) -> Result<&mut ProfileStore> {
        let is_current = self.current.as_ref().is_some_and(|p| p.name() == name);
        if !is_current {
            let profile = self.get_profile(name)?;
            debug!(profile = name, "profile loaded");
            self.current = Some(profile);
        }
        self.current.as_mut().ok_or(Error::NoProfileLoaded)
    }

    /// Make the default profile current.
    pub fn use_default_profile(&mut self) -> Result<&mut ProfileStore> {
        let name = self
            .global
            .default_profile()
            .ok_or(Error::DefaultProfileUndefined)?
            .to_owned();
        self.use_profile(&name)
    }

    pub fn current_profile(&mut self) -> Result<&mut ProfileStore> {
        self.current.as_mut().ok_or(Error::NoProfileLoaded)
    }

    /// Delete a profile's record and unregister it.
    ///
    /// The default profile cannot be deleted; point the default elsewhere
    /// first.
    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        if !self.global.profile_exists(name) {
            return Err(Error::ProfileDoesNotExist(name.to_owned()));
        }
        if self.global.default_profile() == Some(name) {
            return Err(Error::DeletingDefaultProfile(name.to_owned()));
        }

        let profile = ProfileStore::load(&self.backend, &self.namespace, name)?;
        profile.delete()?;
        self.global.remove_profile(name)?;

        if self.current.as_ref().is_some_and(|p| p.name() == name) {
            self.current = None;
        }
        info!(profile = name, "profile deleted");
        Ok(())
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        self.global.set_default_profile(name)?;
        info!(profile = name, "default profile set");
        Ok(())
    }

    pub fn default_profile(&self) -> Result<&str> {
        self.global
            .default_profile()
            .ok_or(Error::DefaultProfileUndefined)
    }
}
