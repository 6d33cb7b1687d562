//! Named connection profiles and their credentials
//!
//! A profile is `{name, endpoint, tls_no_verify, auth_credentials}` kept in
//! a `secret_store` record. The registry (`GlobalConfig`) lists every
//! profile name and the default, in a record of its own. [`Session`] ties
//! the two together for one CLI invocation.
//!
//! Credential lifecycle per profile:
//! 1. `Unconfigured` after `Session::add_profile`
//! 2. `ClientCredentials` after an explicit id/secret is stored, or
//!    `AccessToken` after a successful interactive login
//! 3. `auth::validate_profile_auth_credentials` checks liveness (grant)
//!    or freshness (expiry) on demand
//! 4. Logout clears the credentials back to `Unconfigured`

pub mod auth;
pub mod credentials;
pub mod error;
pub mod global;
pub mod migrate;
pub mod profile;
pub mod session;
pub mod validate;

pub use auth::{
    AuthOption, get_sdk_auth_option_from_profile, get_token_with_profile,
    validate_profile_auth_credentials,
};
pub use credentials::{AuthCredentials, AuthType, ClientCredentials};
pub use error::{Error, Result};
pub use global::{GlobalConfig, GlobalStore};
pub use migrate::migrate;
pub use profile::{ProfileConfig, ProfileStore};
pub use session::Session;
pub use validate::{normalize_endpoint, validate_profile_name};

/// Store key of the registry record.
pub const GLOBAL_KEY: &str = "global";

/// Store key of a profile record.
pub fn profile_key(name: &str) -> String {
    format!("profile-{name}")
}
