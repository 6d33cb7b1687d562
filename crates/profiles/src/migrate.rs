//! Moving profiles between storage backends

use secret_store::StoreBackend;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::global::GlobalStore;
use crate::profile::ProfileStore;

/// Copy every profile registered in `from` into `to`, keeping the default
/// pointer, then remove the source records and registry.
///
/// Names already registered in `to` abort the migration before anything is
/// written. Returns the number of profiles moved.
pub fn migrate(from: &StoreBackend, to: &StoreBackend, namespace: &str) -> Result<usize> {
    let source = GlobalStore::load_or_create(from, namespace)?;
    let names = source.list_profiles().to_vec();
    if names.is_empty() {
        debug!(from = %from.driver(), "no profiles to migrate");
        return Ok(0);
    }

    let mut target = GlobalStore::load_or_create(to, namespace)?;
    if let Some(taken) = names.iter().find(|n| target.profile_exists(n)) {
        return Err(Error::ProfileAlreadyExists(taken.clone()));
    }

    let default = source.default_profile().map(str::to_owned);
    debug!(count = names.len(), from = %from.driver(), to = %to.driver(), "migrating profiles");

    let mut profiles = Vec::with_capacity(names.len());
    for name in &names {
        let profile = ProfileStore::load(from, namespace, name)?;
        profile.copy_to(to, namespace)?;
        target.add_profile(name)?;
        let set_default = default.as_deref() == Some(name.as_str());
        if set_default {
            target.set_default_profile(name)?;
        }
        debug!(profile = name, set_default, "migrated profile");
        profiles.push(profile);
    }

    for profile in &profiles {
        profile.delete()?;
    }
    source.delete()?;

    info!(count = names.len(), from = %from.driver(), to = %to.driver(), "migration complete");
    Ok(names.len())
}
