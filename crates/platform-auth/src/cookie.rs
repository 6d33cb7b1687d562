//! Sealing of the transient login-flow cookie
//!
//! The state value and PKCE verifier ride in a browser cookie between the
//! `/login` redirect and the callback. Two random 128-bit keys are drawn per
//! login: the encrypt key seals the cookie with AES-128-GCM and the hash key
//! is bound in as associated data. Both die with the flow and have nothing
//! to do with the at-rest keys of the profile store.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::constants::COOKIE_KEY_LEN;
use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// What the flow cookie carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCookie {
    pub state: String,
    pub verifier: String,
}

/// Per-flow cookie keys.
pub struct CookieKeys {
    hash_key: Secret<[u8; COOKIE_KEY_LEN]>,
    encrypt_key: Secret<[u8; COOKIE_KEY_LEN]>,
}

impl CookieKeys {
    /// Draw two independent random keys.
    pub fn generate() -> Self {
        let mut hash_key = [0u8; COOKIE_KEY_LEN];
        let mut encrypt_key = [0u8; COOKIE_KEY_LEN];
        let mut rng = rand::rng();
        rng.fill(&mut hash_key);
        rng.fill(&mut encrypt_key);
        Self {
            hash_key: Secret::new(hash_key),
            encrypt_key: Secret::new(encrypt_key),
        }
    }

    /// Seal `cookie` into a URL-safe string.
    pub fn seal(&self, cookie: &FlowCookie) -> Result<String> {
        let plaintext = serde_json::to_vec(cookie)
            .map_err(|e| Error::Crypto(format!("encoding flow cookie: {e}")))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce);
        let cipher = Aes128Gcm::new(self.encrypt_key.expose().into());
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: self.hash_key.expose(),
                },
            )
            .map_err(|e| Error::Crypto(format!("sealing flow cookie: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Open a value produced by [`CookieKeys::seal`] with the same keys.
    pub fn open(&self, value: &str) -> Result<FlowCookie> {
        let data = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|e| Error::Crypto(format!("flow cookie is not base64url: {e}")))?;
        if data.len() < NONCE_LEN {
            return Err(Error::Crypto("flow cookie too short".into()));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let cipher = Aes128Gcm::new(self.encrypt_key.expose().into());
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: self.hash_key.expose(),
                },
            )
            .map_err(|_| Error::Crypto("flow cookie failed authentication".into()))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Crypto(format!("decoding flow cookie: {e}")))
    }
}

/// Find cookie `name` in a `Cookie` request header value.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
