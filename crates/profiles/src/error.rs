//! Error types for profile and credential operations

/// Errors from the profile registry, profile records and the auth façade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no credentials found for the profile; run login or set client credentials")]
    CredentialsNotFound,

    #[error("invalid auth type: {0}")]
    InvalidAuthType(String),

    #[error("access token expired; log in again")]
    AccessTokenExpired,

    #[error("access token not found")]
    AccessTokenNotFound,

    #[error("profile {0} already exists")]
    ProfileAlreadyExists(String),

    #[error("profile {0} does not exist")]
    ProfileDoesNotExist(String),

    #[error("profile {name} could not be read: {source}")]
    ProfileUnreadable {
        name: String,
        #[source]
        source: secret_store::Error,
    },

    #[error("no default profile is set")]
    DefaultProfileUndefined,

    #[error("cannot delete the default profile {0}; set another default first")]
    DeletingDefaultProfile(String),

    #[error("invalid profile name: {0}")]
    InvalidProfileName(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("no profile loaded")]
    NoProfileLoaded,

    #[error("client credentials error: {0}")]
    ClientCredentials(String),

    #[error(transparent)]
    Storage(#[from] secret_store::Error),

    #[error(transparent)]
    Auth(#[from] platform_auth::Error),
}

/// Result alias for profile operations.
pub type Result<T> = std::result::Result<T, Error>;
