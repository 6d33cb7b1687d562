//! Encrypted file store
//!
//! Each record lives in `<dir>/<sha256(namespace:key)>.enc` so file names do
//! not leak profile names. A plaintext sidecar `<hash>.nfo` carries only the
//! record name, creation time and algorithm. The 256-bit record key is kept
//! in the credential vault, never next to the ciphertext.
//!
//! All writes use atomic temp-file + rename with 0600 permissions; the store
//! directory is created 0700.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::encryption::{self, ALGORITHM};
use crate::error::{Error, Result};
use crate::store::{SecretStore, record_label};
use crate::vault::Vault;

const PROBE_FILE: &str = ".tmp_profile_rw_test";

/// Unencrypted metadata written next to each encrypted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub profile_name: String,
    /// RFC 3339 timestamp of the first write.
    pub created_at: String,
    pub encryption_alg: String,
}

pub struct FileStore {
    namespace: String,
    key: String,
    file_path: PathBuf,
    metadata_path: PathBuf,
    vault: Arc<dyn Vault>,
}

impl FileStore {
    /// Open the record `(namespace, key)` under `dir`.
    ///
    /// Creates the directory if needed and verifies it is writable before
    /// returning, so a misconfigured location fails here with the path in
    /// the message instead of on first save.
    pub fn new(dir: &Path, namespace: &str, key: &str, vault: Arc<dyn Vault>) -> Result<Self> {
        prepare_dir(dir)?;
        let stem = hashed_name(namespace, key);
        Ok(Self {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            file_path: dir.join(format!("{stem}.enc")),
            metadata_path: dir.join(format!("{stem}.nfo")),
            vault,
        })
    }

    /// Path of the encrypted record.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Path of the plaintext sidecar.
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Read the plaintext sidecar.
    pub fn metadata(&self) -> Result<FileMetadata> {
        let data = fs::read(&self.metadata_path).map_err(|e| self.io_error("reading metadata", e))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::Serialization(format!("parsing metadata: {e}")))
    }

    fn key_account(&self) -> String {
        format!("{}:{}:encryption-key", self.namespace, self.key)
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::NotFound {
            Error::NotFound(record_label(&self.namespace, &self.key))
        } else {
            Error::Io(format!("{action} for {}: {e}", record_label(&self.namespace, &self.key)))
        }
    }

    fn write_metadata(&self) -> Result<()> {
        // Keep the original creation time when rewriting a record.
        let created_at = self
            .metadata()
            .map(|m| m.created_at)
            .unwrap_or_else(|_| chrono::Utc::now().to_rfc3339());
        let metadata = FileMetadata {
            profile_name: self.key.clone(),
            created_at,
            encryption_alg: ALGORITHM.to_owned(),
        };
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| Error::Serialization(format!("serializing metadata: {e}")))?;
        write_atomic(&self.metadata_path, &json)
    }
}

impl SecretStore for FileStore {
    fn exists(&self) -> bool {
        self.file_path.is_file()
    }

    /// A record file whose key has left the vault is unreadable, not absent.
    fn get_raw(&self) -> Result<Vec<u8>> {
        let encrypted = fs::read(&self.file_path).map_err(|e| self.io_error("reading record", e))?;
        let account = self.key_account();
        let key = encryption::vault_key(self.vault.as_ref(), &self.namespace, &account, false)
            .map_err(|e| match e {
                Error::NotFound(what) => {
                    Error::Vault(format!("{what} is missing for a stored record"))
                }
                other => other,
            })?;
        encryption::decrypt(&key, &encrypted)
    }

    fn set_raw(&self, data: &[u8]) -> Result<()> {
        let account = self.key_account();
        let key = encryption::vault_key(self.vault.as_ref(), &self.namespace, &account, true)?;
        let encrypted = encryption::encrypt(&key, data)?;
        write_atomic(&self.file_path, &encrypted)?;
        self.write_metadata()?;
        debug!(path = %self.file_path.display(), key = self.key, "persisted encrypted record");
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        fs::remove_file(&self.file_path).map_err(|e| self.io_error("removing record", e))?;
        fs::remove_file(&self.metadata_path).map_err(|e| self.io_error("removing metadata", e))?;

        if let Err(e) = self.vault.delete(&self.namespace, &self.key_account()) {
            warn!(
                key = self.key,
                error = %e,
                "record removed but its encryption key could not be deleted"
            );
        }
        debug!(path = %self.file_path.display(), key = self.key, "deleted encrypted record");
        Ok(())
    }
}

/// File stem for a record: hex SHA-256 of `namespace:key`.
pub fn hashed_name(namespace: &str, key: &str) -> String {
    let hash = Sha256::digest(format!("{namespace}:{key}").as_bytes());
    hex::encode(hash)
}

/// Default store directory: `profiles/` next to the running executable.
pub fn default_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::Directory(format!("unable to locate the executable: {e}")))?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::Directory("executable path has no parent directory".into()))?;
    Ok(dir.join("profiles"))
}

/// Create `dir` with owner-only permissions and check that files can be
/// created and removed in it.
pub fn prepare_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| {
        Error::Directory(format!(
            "failed to create profile directory {}: {e}; check directory permissions",
            dir.display()
        ))
    })?;

    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"").map_err(|e| {
        Error::Directory(format!(
            "unable to write to profile directory {}: {e}; ensure write permission is granted",
            dir.display()
        ))
    })?;
    fs::remove_file(&probe).map_err(|e| {
        Error::Directory(format!(
            "unable to delete files in profile directory {}: {e}; \
             ensure delete permission is granted",
            dir.display()
        ))
    })?;
    Ok(())
}

/// Write `data` to `path` atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets permissions to 0600 before the rename so the record is
/// never visible with wider access.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("record path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    fs::write(&tmp_path, data).map_err(|e| Error::Io(format!("writing temp file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting file permissions: {e}")))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| Error::Io(format!("renaming temp file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretStoreExt;
    use crate::vault::MockVault;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        p: String,
        e: String,
        t: bool,
    }

    fn record() -> Record {
        Record {
            p: "dev".into(),
            e: "https://api.example.com:443".into(),
            t: true,
        }
    }

    fn open(dir: &Path, vault: &Arc<MockVault>, key: &str) -> FileStore {
        FileStore::new(dir, "platformctl", key, vault.clone()).unwrap()
    }

    #[test]
    fn roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());

        open(dir.path(), &vault, "profile-dev").set(&record()).unwrap();

        // A fresh store for the same record stands in for a process restart.
        let reopened = open(dir.path(), &vault, "profile-dev");
        assert!(reopened.exists());
        let back: Record = reopened.get().unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn file_name_hides_record_name() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();

        let name = store.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains("dev"));
        assert_eq!(name, format!("{}.enc", hashed_name("platformctl", "profile-dev")));
    }

    #[test]
    fn ciphertext_does_not_contain_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();

        let raw = fs::read(store.path()).unwrap();
        let needle = b"api.example.com";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();

        let mut raw = fs::read(store.path()).unwrap();
        raw[20] ^= 0xff;
        fs::write(store.path(), &raw).unwrap();

        let err = store.get::<Record>().unwrap_err();
        assert!(matches!(err, Error::Decryption(_)), "got: {err}");
    }

    #[test]
    fn metadata_sidecar_has_no_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();

        let metadata = store.metadata().unwrap();
        assert_eq!(metadata.profile_name, "profile-dev");
        assert_eq!(metadata.encryption_alg, "AES-256-GCM");
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());

        let sidecar = fs::read_to_string(store.metadata_path()).unwrap();
        assert!(!sidecar.contains("api.example.com"));
    }

    #[test]
    fn rewrite_keeps_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();
        let created = store.metadata().unwrap().created_at;

        let mut updated = record();
        updated.t = false;
        store.set(&updated).unwrap();

        assert_eq!(store.metadata().unwrap().created_at, created);
        assert_eq!(store.get::<Record>().unwrap(), updated);
    }

    #[test]
    fn key_is_generated_once_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        open(dir.path(), &vault, "profile-a").set(&record()).unwrap();
        open(dir.path(), &vault, "profile-a").set(&record()).unwrap();
        assert_eq!(vault.len(), 1);

        open(dir.path(), &vault, "profile-b").set(&record()).unwrap();
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn delete_removes_both_files_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();

        store.delete().unwrap();
        assert!(!store.path().exists());
        assert!(!store.metadata_path().exists());
        assert!(vault.is_empty());
        assert!(!store.exists());
    }

    #[test]
    fn delete_fails_when_record_missing() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "absent");
        assert!(store.delete().unwrap_err().is_not_found());
    }

    #[test]
    fn delete_fails_when_sidecar_missing() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let store = open(dir.path(), &vault, "profile-dev");
        store.set(&record()).unwrap();
        fs::remove_file(store.metadata_path()).unwrap();

        assert!(store.delete().is_err());
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        let err = open(dir.path(), &vault, "absent").get::<Record>().unwrap_err();
        assert!(err.is_not_found(), "got: {err}");
    }

    #[test]
    fn record_without_key_is_a_vault_error() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(MockVault::new());
        open(dir.path(), &vault, "global").set(&record()).unwrap();

        // Same files, but a vault that never saw the key.
        let err = open(dir.path(), &Arc::new(MockVault::new()), "global")
            .get::<Record>()
            .unwrap_err();
        assert!(matches!(err, Error::Vault(_)), "got: {err}");
    }

    #[test]
    fn creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let vault = Arc::new(MockVault::new());
        open(&nested, &vault, "profile-dev").set(&record()).unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join(PROBE_FILE).exists());
    }

    #[test]
    fn unusable_directory_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();
        let vault: Arc<dyn Vault> = Arc::new(MockVault::new());

        let err = FileStore::new(&blocker.join("profiles"), "platformctl", "k", vault)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Directory(_)), "got: {err}");
        assert!(err.to_string().contains("not-a-dir"));
    }

    #[cfg(unix)]
    #[test]
    fn permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        let vault = Arc::new(MockVault::new());
        let store = open(&profiles, &vault, "profile-dev");
        store.set(&record()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "record file must be 0600, got {mode:o}");
        let mode = fs::metadata(store.metadata_path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "sidecar must be 0600, got {mode:o}");
        let mode = fs::metadata(&profiles).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700, "directory must be 0700, got {mode:o}");
    }
}
