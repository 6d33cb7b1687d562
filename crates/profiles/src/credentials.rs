//! Authentication credentials stored with a profile
//!
//! On the wire the credentials are a flat record tagged by `authType`:
//!
//! ```json
//! {"authType":"client-credentials","clientId":"svc","clientSecret":"..."}
//! {"authType":"access-token","clientId":"cli",
//!  "accessToken":{"accessToken":"...","refreshToken":"...","expiration":1700000000}}
//! {"authType":"","clientId":""}
//! ```
//!
//! In memory they are a sum type, so a record can only ever carry the
//! fields of its own variant. Decoding rejects unknown tags and records
//! missing their variant's fields.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The two configured credential kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    ClientCredentials,
    AccessToken,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::ClientCredentials => "client-credentials",
            AuthType::AccessToken => "access-token",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client-credentials" => Ok(AuthType::ClientCredentials),
            "access-token" => Ok(AuthType::AccessToken),
            other => Err(Error::InvalidAuthType(format!("{other:?}"))),
        }
    }
}

/// Credentials of one profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCredentials", into = "WireCredentials")]
pub enum AuthCredentials {
    /// Nothing configured yet.
    #[default]
    Unconfigured,
    /// Machine-to-machine id/secret pair.
    ClientCredentials {
        client_id: String,
        client_secret: Secret<String>,
    },
    /// Tokens from an interactive login.
    AccessToken {
        client_id: String,
        access_token: Secret<String>,
        refresh_token: Secret<String>,
        /// Unix seconds.
        expiration: i64,
    },
}

impl AuthCredentials {
    pub fn client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        AuthCredentials::ClientCredentials {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
        }
    }

    pub fn access_token(
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiration: i64,
    ) -> Self {
        AuthCredentials::AccessToken {
            client_id: client_id.into(),
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            expiration,
        }
    }

    /// Build the access-token variant from a login result.
    pub fn from_token(client_id: impl Into<String>, token: &platform_auth::Token) -> Self {
        Self::access_token(
            client_id,
            token.access_token.clone(),
            token.refresh_token.clone().unwrap_or_default(),
            token.expiry_unix(),
        )
    }

    /// `None` when unconfigured.
    pub fn auth_type(&self) -> Option<AuthType> {
        match self {
            AuthCredentials::Unconfigured => None,
            AuthCredentials::ClientCredentials { .. } => Some(AuthType::ClientCredentials),
            AuthCredentials::AccessToken { .. } => Some(AuthType::AccessToken),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        match self {
            AuthCredentials::Unconfigured => None,
            AuthCredentials::ClientCredentials { client_id, .. }
            | AuthCredentials::AccessToken { client_id, .. } => Some(client_id),
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, AuthCredentials::Unconfigured)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCredentials {
    #[serde(default)]
    auth_type: String,
    #[serde(default)]
    client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<WireAccessToken>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAccessToken {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expiration: i64,
}

impl TryFrom<WireCredentials> for AuthCredentials {
    type Error = Error;

    fn try_from(wire: WireCredentials) -> Result<Self> {
        if wire.auth_type.is_empty() {
            return Ok(AuthCredentials::Unconfigured);
        }
        match wire.auth_type.parse::<AuthType>()? {
            AuthType::ClientCredentials => {
                let client_secret = wire.client_secret.filter(|s| !s.is_empty()).ok_or_else(|| {
                    Error::InvalidAuthType("client-credentials record without clientSecret".into())
                })?;
                Ok(Self::client_credentials(wire.client_id, client_secret))
            }
            AuthType::AccessToken => {
                let token = wire.access_token.ok_or_else(|| {
                    Error::InvalidAuthType("access-token record without accessToken".into())
                })?;
                Ok(Self::access_token(
                    wire.client_id,
                    token.access_token,
                    token.refresh_token,
                    token.expiration,
                ))
            }
        }
    }
}

impl From<AuthCredentials> for WireCredentials {
    fn from(credentials: AuthCredentials) -> Self {
        match credentials {
            AuthCredentials::Unconfigured => WireCredentials {
                auth_type: String::new(),
                client_id: String::new(),
                client_secret: None,
                access_token: None,
            },
            AuthCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => WireCredentials {
                auth_type: AuthType::ClientCredentials.as_str().to_owned(),
                client_id,
                client_secret: Some(client_secret.expose().clone()),
                access_token: None,
            },
            AuthCredentials::AccessToken {
                client_id,
                access_token,
                refresh_token,
                expiration,
            } => WireCredentials {
                auth_type: AuthType::AccessToken.as_str().to_owned(),
                client_id,
                client_secret: None,
                access_token: Some(WireAccessToken {
                    access_token: access_token.expose().clone(),
                    refresh_token: refresh_token.expose().clone(),
                    expiration,
                }),
            },
        }
    }
}

/// Client id/secret pair as supplied in a credentials file or JSON string:
/// `{"clientId": "...", "clientSecret": "..."}`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ClientCredentials {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::ClientCredentials(format!("failed to decode credentials JSON: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ClientCredentials(format!(
                "failed to open credentials file {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::ClientCredentials(format!(
                "failed to decode credentials file {}: {e}",
                path.display()
            ))
        })
    }

    pub fn into_auth_credentials(self) -> AuthCredentials {
        AuthCredentials::client_credentials(self.client_id, self.client_secret)
    }
}
