//! Error types for platform authentication

/// Errors from discovery and the OAuth2 flows.
///
/// Each failure cause is its own variant so callers can tell an unreachable
/// platform from an incomplete configuration or rejected credentials.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("platform unreachable: {0}")]
    PlatformUnreachable(String),

    #[error("platform configuration incomplete, missing: {}", missing.join(", "))]
    PlatformConfig { missing: Vec<String> },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("credentials rejected: {0}")]
    CredentialsRejected(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token revocation failed: {0}")]
    Revocation(String),

    #[error("callback port {0} is already in use")]
    CallbackPortInUse(u16),

    #[error("login timed out after {0}s waiting for the browser callback")]
    LoginTimedOut(u64),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("login callback failed: {0}")]
    Callback(String),

    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    #[error("invalid access token: {0}")]
    InvalidAccessToken(String),

    #[error("invalid client configuration: {0}")]
    InvalidClientConfig(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
