//! OAuth token endpoint interactions
//!
//! Three calls against the identity provider:
//! 1. Client-credentials grant (machine-to-machine)
//! 2. Authorization code exchange (end of interactive login)
//! 3. Token revocation (logout)
//!
//! All are plain form POSTs. Nothing is cached here; every call goes to
//! the network.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{EXPIRY_DELTA, ISSUED_AT_SKEW};
use crate::error::{Error, Result};
use crate::http::transport_error;

/// An OAuth2 bearer token.
#[derive(Clone, PartialEq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    /// Absolute expiry. `None` means the token does not expire.
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Whether the token can still be used: non-empty and not within
    /// [`EXPIRY_DELTA`] of its expiry.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            None => true,
            Some(expiry) => now + chrono::Duration::seconds(EXPIRY_DELTA.as_secs() as i64) < expiry,
        }
    }

    /// Expiry as unix seconds, 0 when the token does not expire.
    pub fn expiry_unix(&self) -> i64 {
        self.expiry.map(|e| e.timestamp()).unwrap_or(0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Successful token endpoint response.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Convert to a [`Token`], anchoring `expires_in` at `now`.
    ///
    /// Without a positive `expires_in` the expiry comes from the access
    /// token's `exp` claim. An opaque token with neither has no expiry, and
    /// once stored on a profile it reads as expired.
    pub fn into_token(self, now: DateTime<Utc>) -> Token {
        let expiry = self
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .or_else(|| {
                access_token_expiration(&self.access_token)
                    .ok()
                    .and_then(|exp| DateTime::from_timestamp(exp, 0))
            });
        let token_type = if self.token_type.is_empty() {
            "Bearer".to_owned()
        } else {
            self.token_type
        };
        Token {
            access_token: self.access_token,
            token_type,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expiry,
        }
    }
}

/// Run the client-credentials grant against `token_endpoint`.
///
/// The client authenticates with HTTP basic auth. A 400/401 answer means
/// the identity provider rejected the id/secret pair.
pub async fn client_credentials_grant(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<Token> {
    let response = client
        .post(token_endpoint)
        .basic_auth(client_id, Some(client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| transport_error("client credentials request", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(Error::CredentialsRejected(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let parsed = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
    debug!(client_id, "client credentials grant succeeded");
    Ok(parsed.into_token(Utc::now()))
}

/// Exchange an authorization code for tokens.
///
/// The PKCE verifier proves this client started the flow. When the
/// response carries an ID token its issued-at claim is checked against
/// [`ISSUED_AT_SKEW`].
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<Token> {
    let response = client
        .post(token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| transport_error("token exchange request", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let parsed = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    let now = Utc::now();
    if let Some(id_token) = parsed.id_token.as_deref() {
        check_issued_at(id_token, now)?;
    }
    Ok(parsed.into_token(now))
}

/// Revoke `token` at `revocation_endpoint` (RFC 7009) as a public client.
pub async fn revoke_token(
    client: &reqwest::Client,
    revocation_endpoint: &str,
    client_id: &str,
    token: &str,
    token_type_hint: &str,
) -> Result<()> {
    let response = client
        .post(revocation_endpoint)
        .form(&[
            ("token", token),
            ("token_type_hint", token_type_hint),
            ("client_id", client_id),
        ])
        .send()
        .await
        .map_err(|e| transport_error("revocation request", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Revocation(format!(
            "revocation endpoint returned {status}: {body}"
        )));
    }
    debug!(client_id, "token revoked");
    Ok(())
}

#[derive(Deserialize)]
struct JwtClaims {
    iat: Option<i64>,
    exp: Option<i64>,
}

/// Decode a JWT payload without verifying its signature.
fn unverified_claims(jwt: &str) -> std::result::Result<JwtClaims, String> {
    let payload = jwt.split('.').nth(1).ok_or("not a JWT")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| format!("payload is not base64url: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("payload is not JSON: {e}"))
}

/// Reject an ID token issued further in the future than the allowed skew.
///
/// Only the `iat` claim is read; the signature is not verified here.
pub fn check_issued_at(id_token: &str, now: DateTime<Utc>) -> Result<()> {
    let iat = unverified_claims(id_token)
        .map_err(Error::InvalidIdToken)?
        .iat
        .ok_or_else(|| Error::InvalidIdToken("missing iat claim".into()))?;

    let latest = now.timestamp() + ISSUED_AT_SKEW.as_secs() as i64;
    if iat > latest {
        return Err(Error::InvalidIdToken(format!(
            "issued at {iat}, more than {}s in the future",
            ISSUED_AT_SKEW.as_secs()
        )));
    }
    Ok(())
}

/// The `exp` claim of a JWT access token, read without verification.
pub fn access_token_expiration(access_token: &str) -> Result<i64> {
    unverified_claims(access_token)
        .map_err(Error::InvalidAccessToken)?
        .exp
        .ok_or_else(|| Error::InvalidAccessToken("missing exp claim".into()))
}
