//! Error types for secret storage operations

/// Errors from any storage backend: vault, filesystem, crypto or codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("credential vault error: {0}")]
    Vault(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("storage directory unusable: {0}")]
    Directory(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown store driver: {0}")]
    UnknownDriver(String),
}

impl Error {
    /// Whether the error means the record is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
