//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! The verifier stays on this machine, sealed in the flow cookie, and is
//! sent only during code exchange. The S256 challenge travels in the
//! authorization URL so the identity provider can tie the exchange back to
//! the party that started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::constants::SCOPES;
use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 random bytes encoded as URL-safe base64 without padding, which gives
/// 43 characters: the minimum length RFC 7636 allows, at full entropy.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the authorization URL for the code flow.
///
/// Existing query parameters on `authorization_endpoint` are kept; the
/// OAuth parameters are appended with proper form encoding.
pub fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| {
        Error::InvalidEndpoint(format!(
            "authorization endpoint {authorization_endpoint}: {e}"
        ))
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPES)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state);
    Ok(url.into())
}
