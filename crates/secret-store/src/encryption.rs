//! AES-256-GCM encryption for records at rest
//!
//! Ciphertext layout is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! A fresh random nonce is drawn for every encryption. The 256-bit key is
//! generated once per record and kept hex-encoded in the credential vault.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use common::Secret;
use rand::RngExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::vault::Vault;

/// Algorithm name recorded in file metadata.
pub const ALGORITHM: &str = "AES-256-GCM";

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// A 256-bit record key, zeroized on drop.
pub type EncryptionKey = Secret<[u8; KEY_LEN]>;

/// Generate a random 256-bit key.
pub fn generate_key() -> EncryptionKey {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill(&mut key);
    Secret::new(key)
}

/// Encrypt `plaintext`, returning the nonce-prefixed ciphertext.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.expose().into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt nonce-prefixed ciphertext. Any modification of the data fails the
/// tag check.
pub fn decrypt(key: &EncryptionKey, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(Error::Decryption(format!(
            "ciphertext too short: {} bytes",
            data.len()
        )));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.expose().into());

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| Error::Decryption("authentication tag mismatch".into()))
}

/// Fetch the record key from the vault.
///
/// With `create` set, a missing key is generated and stored; otherwise a
/// missing key is reported as [`Error::NotFound`].
pub fn vault_key(
    vault: &dyn Vault,
    service: &str,
    account: &str,
    create: bool,
) -> Result<EncryptionKey> {
    match vault.get(service, account)? {
        Some(encoded) => decode_key(&encoded),
        None if create => {
            let key = generate_key();
            vault.set(service, account, &hex::encode(key.expose()))?;
            debug!(service, account, "generated record encryption key");
            Ok(key)
        }
        None => Err(Error::NotFound(format!(
            "encryption key {service}/{account}"
        ))),
    }
}

fn decode_key(encoded: &str) -> Result<EncryptionKey> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| Error::Vault(format!("stored encryption key is not hex: {e}")))?;
    let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        Error::Vault(format!(
            "stored encryption key has {} bytes, expected {KEY_LEN}",
            bytes.len()
        ))
    })?;
    Ok(Secret::new(key))
}
