//! Per-platform entry point for the OAuth2 flows

use std::time::Duration;

use tracing::{debug, info};

use crate::discovery::{self, Field, PlatformConfiguration};
use crate::endpoint::normalize_endpoint;
use crate::error::{Error, Result};
use crate::http::build_client;
use crate::login::{self, LoginOptions};
use crate::token::{self, Token};

/// One platform endpoint plus the HTTP client its calls go through.
///
/// Discovery runs on every call; nothing is cached between operations.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    endpoint: String,
    http: reqwest::Client,
}

impl PlatformClient {
    /// Normalize `endpoint` and build a client honoring `tls_no_verify`.
    pub fn new(endpoint: &str, tls_no_verify: bool, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: normalize_endpoint(endpoint)?,
            http: build_client(tls_no_verify, timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn discover(&self) -> Result<PlatformConfiguration> {
        discovery::discover(&self.http, &self.endpoint).await
    }

    /// Obtain a token with the client-credentials grant.
    pub async fn client_credentials_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Token> {
        check_client(client_id, Some(client_secret))?;
        let config = self.discover().await?;
        let token_endpoint = config.field(Field::TokenEndpoint)?;
        token::client_credentials_grant(&self.http, token_endpoint, client_id, client_secret).await
    }

    /// Run the interactive authorization code + PKCE login.
    ///
    /// Discovery completes before any listener is bound or browser opened.
    pub async fn login(&self, options: &LoginOptions) -> Result<Token> {
        let config = self.discover().await?;
        let mut required = vec![Field::AuthorizationEndpoint, Field::TokenEndpoint];
        if options.client_id.is_none() {
            required.push(Field::PublicClientId);
        }
        config.require(&required)?;

        let client_id = match options.client_id.as_deref() {
            Some(id) => id,
            None => config.field(Field::PublicClientId)?,
        };
        check_client(client_id, None)?;

        let token = login::run(
            &self.http,
            client_id,
            config.field(Field::AuthorizationEndpoint)?,
            config.field(Field::TokenEndpoint)?,
            options,
        )
        .await?;
        info!(endpoint = self.endpoint, "interactive login completed");
        Ok(token)
    }

    /// Revoke a refresh token as the public client `client_id`.
    pub async fn revoke(&self, client_id: &str, refresh_token: &str) -> Result<()> {
        check_client(client_id, None)?;
        let config = self.discover().await?;
        let revocation_endpoint = config.field(Field::RevocationEndpoint)?;
        debug!(endpoint = self.endpoint, "revoking refresh token");
        token::revoke_token(
            &self.http,
            revocation_endpoint,
            client_id,
            refresh_token,
            "refresh_token",
        )
        .await
    }
}

/// Every client needs an id; confidential clients also need a secret.
fn check_client(client_id: &str, client_secret: Option<&str>) -> Result<()> {
    if client_id.trim().is_empty() {
        return Err(Error::InvalidClientConfig("client ID is required".into()));
    }
    if let Some(secret) = client_secret {
        if secret.is_empty() {
            return Err(Error::InvalidClientConfig(
                "client secret is required".into(),
            ));
        }
    }
    Ok(())
}
