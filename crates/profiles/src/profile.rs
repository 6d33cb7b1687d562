//! Profile records
//!
//! A [`ProfileStore`] owns one profile's configuration and the secret-store
//! record it lives in. Every setter persists immediately.

use secret_store::{SecretStore, SecretStoreExt, StoreBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::AuthCredentials;
use crate::error::{Error, Result};
use crate::profile_key;
use crate::validate::{normalize_endpoint, validate_profile_name};

/// Name given to profiles built from command-line flags.
pub const EPHEMERAL_PROFILE: &str = "ephemeral";

/// One profile as persisted: `{p, e, t, a}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(rename = "p")]
    pub name: String,
    /// Normalized, always with an explicit port.
    #[serde(rename = "e")]
    pub endpoint: String,
    #[serde(rename = "t", default)]
    pub tls_no_verify: bool,
    #[serde(rename = "a", default)]
    pub auth_credentials: AuthCredentials,
}

pub struct ProfileStore {
    store: Box<dyn SecretStore>,
    config: ProfileConfig,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProfileStore {
    /// Build a new, unsaved profile. Validates the name and normalizes the
    /// endpoint.
    pub fn new(
        backend: &StoreBackend,
        namespace: &str,
        name: &str,
        endpoint: &str,
        tls_no_verify: bool,
    ) -> Result<Self> {
        validate_profile_name(name)?;
        let endpoint = normalize_endpoint(endpoint)?;
        Ok(Self {
            store: backend.open(namespace, &profile_key(name))?,
            config: ProfileConfig {
                name: name.to_owned(),
                endpoint,
                tls_no_verify,
                auth_credentials: AuthCredentials::Unconfigured,
            },
        })
    }

    /// Load a stored profile.
    ///
    /// Any storage or decode failure comes back as
    /// [`Error::ProfileUnreadable`].
    pub fn load(backend: &StoreBackend, namespace: &str, name: &str) -> Result<Self> {
        validate_profile_name(name)?;
        let unreadable = |source| Error::ProfileUnreadable {
            name: name.to_owned(),
            source,
        };
        let store = backend.open(namespace, &profile_key(name)).map_err(unreadable)?;
        let config: ProfileConfig = store.get().map_err(unreadable)?;
        Ok(Self { store, config })
    }

    /// Whether a record for `name` exists in `backend`.
    ///
    /// `Ok(false)` only when the backend reports the record missing; read
    /// failures are returned as errors.
    pub fn exists(backend: &StoreBackend, namespace: &str, name: &str) -> Result<bool> {
        let store = backend.open(namespace, &profile_key(name))?;
        match store.get_raw() {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// A profile held only in process memory, for flag-supplied endpoints
    /// and credentials. Nothing is written to disk or the OS vault.
    pub fn ephemeral(
        endpoint: &str,
        tls_no_verify: bool,
        credentials: AuthCredentials,
    ) -> Result<Self> {
        let backend = StoreBackend::in_memory();
        let mut profile = Self::new(
            &backend,
            common::APP_NAME,
            EPHEMERAL_PROFILE,
            endpoint,
            tls_no_verify,
        )?;
        profile.config.auth_credentials = credentials;
        profile.save()?;
        Ok(profile)
    }

    pub fn save(&self) -> Result<()> {
        self.store.set(&self.config)?;
        debug!(profile = self.config.name, "profile saved");
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        self.store.delete()?;
        debug!(profile = self.config.name, "profile record deleted");
        Ok(())
    }

    /// Write this profile, unchanged, into another backend.
    pub(crate) fn copy_to(&self, backend: &StoreBackend, namespace: &str) -> Result<ProfileStore> {
        let copy = Self {
            store: backend.open(namespace, &profile_key(&self.config.name))?,
            config: self.config.clone(),
        };
        copy.save()?;
        Ok(copy)
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        self.config.endpoint = normalize_endpoint(endpoint)?;
        self.save()
    }

    pub fn tls_no_verify(&self) -> bool {
        self.config.tls_no_verify
    }

    pub fn set_tls_no_verify(&mut self, tls_no_verify: bool) -> Result<()> {
        self.config.tls_no_verify = tls_no_verify;
        self.save()
    }

    pub fn auth_credentials(&self) -> &AuthCredentials {
        &self.config.auth_credentials
    }

    /// Store credentials. Only the two configured variants are accepted;
    /// use [`ProfileStore::clear_auth_credentials`] to unset.
    pub fn set_auth_credentials(&mut self, credentials: AuthCredentials) -> Result<()> {
        if !credentials.is_configured() {
            return Err(Error::InvalidAuthType(
                "credentials must be client-credentials or access-token".into(),
            ));
        }
        self.config.auth_credentials = credentials;
        self.save()
    }

    /// Drop stored credentials, returning the profile to unconfigured.
    pub fn clear_auth_credentials(&mut self) -> Result<()> {
        self.config.auth_credentials = AuthCredentials::Unconfigured;
        self.save()
    }
}
