//! Pluggable secret storage for profile records
//!
//! Every backend implements the same [`SecretStore`] contract over one
//! opaque record addressed by `(namespace, key)`:
//! - [`KeyringStore`] keeps the record in the OS credential vault.
//! - [`FileStore`] keeps an AES-256-GCM encrypted file on disk, with the
//!   per-record key held in the vault.
//! - [`MemoryStore`] keeps the record in process memory only.
//!
//! Records are JSON on every backend, so a value read back is identical
//! regardless of where it was stored. [`StoreBackend`] picks the backend at
//! process start and opens stores for callers.

pub mod backend;
pub mod encryption;
pub mod error;
pub mod file_store;
pub mod keyring_store;
pub mod memory_store;
pub mod store;
pub mod vault;

pub use backend::{Driver, StoreBackend};
pub use error::{Error, Result};
pub use file_store::{FileMetadata, FileStore};
pub use keyring_store::KeyringStore;
pub use memory_store::MemoryStore;
pub use store::{SecretStore, SecretStoreExt};
pub use vault::{MockVault, OsVault, Vault};
