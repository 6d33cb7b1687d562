//! OAuth constants for the platform login flows
//!
//! None of these are secrets. Tokens and client secrets are owned by the
//! caller and never stored by this crate.

use std::time::Duration;

/// Path of the platform's discovery document, relative to its base URL.
pub const WELL_KNOWN_PATH: &str = "/.well-known/opentdf-configuration";

/// Path the identity provider redirects back to on the local listener.
pub const CALLBACK_PATH: &str = "/callback";

/// Path the browser is sent to first; it sets the flow cookie and
/// redirects to the authorization endpoint.
pub const LOGIN_PATH: &str = "/login";

/// Scopes requested during interactive login.
pub const SCOPES: &str = "openid profile email";

/// Allowed clock skew when checking an ID token's issued-at claim.
pub const ISSUED_AT_SKEW: Duration = Duration::from_secs(5);

/// Tokens are treated as expired this long before their actual expiry.
pub const EXPIRY_DELTA: Duration = Duration::from_secs(10);

/// Size of each per-flow cookie key (hash key and encrypt key).
pub const COOKIE_KEY_LEN: usize = 16;

/// Name of the cookie carrying the sealed state and PKCE verifier.
pub const FLOW_COOKIE: &str = "platformctl_login";

/// How long the callback listener may take to drain after the flow ends.
pub const LISTENER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
