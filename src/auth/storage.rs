//! Credential stores for the signed-in identity.
//!
//! The identity (including its password token and cookies) is sensitive and
//! lives in one of:
//! - the system keychain ([`KeyringCredentialStore`], the default),
//! - an encrypted file under the config directory
//!   ([`EncryptedFileCredentialStore`]), keyed by `IPAFETCH_MASTER_KEY` or a
//!   key held in the keychain,
//! - memory ([`MemoryCredentialStore`]), for tests and one-shot runs.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::Account;

/// Keychain service name for the persisted identity.
pub const KEYCHAIN_SERVICE: &str = "ipafetch.service";

/// Keychain account name for the persisted identity.
pub const KEYCHAIN_ACCOUNT: &str = "account";

/// Environment variable holding the file-store encryption key.
pub const MASTER_KEY_ENV: &str = "IPAFETCH_MASTER_KEY";

const APP_DIR_NAME: &str = "ipafetch";
const ACCOUNT_FILE_NAME: &str = "account.enc";
const MASTER_KEY_ENTRY: &str = "account-master-key-v1";
const MAGIC: &[u8; 4] = b"IPF1";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Errors from credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The system keychain could not be used.
    #[error("system keychain unavailable: {0}")]
    KeychainUnavailable(String),
    /// Stored encrypted payload is malformed.
    #[error("persisted account payload is invalid")]
    InvalidPayload,
    /// Encryption failed.
    #[error("failed to encrypt persisted account")]
    EncryptionFailed,
    /// Decryption failed (wrong key or tampered file).
    #[error("failed to decrypt persisted account; check {MASTER_KEY_ENV}")]
    DecryptionFailed,
}

/// Persistence for the single saved identity.
pub trait CredentialStore: Send + Sync {
    /// Saves `account`, replacing any previous identity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store rejects the write.
    fn save(&self, account: &Account) -> Result<(), StorageError>;

    /// Loads the saved identity, or `None` when nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store is unreadable or corrupt.
    fn load(&self) -> Result<Option<Account>, StorageError>;

    /// Deletes the saved identity. Returns `true` when one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store rejects the delete.
    fn delete(&self) -> Result<bool, StorageError>;
}

/// Returns the per-user config directory (`$XDG_CONFIG_HOME/ipafetch`).
///
/// # Errors
///
/// Returns [`StorageError::ConfigDirUnavailable`] if no usable directory is found.
pub fn config_dir() -> Result<PathBuf, StorageError> {
    resolve_config_dir(
        non_blank_path(env::var_os("XDG_CONFIG_HOME")),
        non_blank_path(env::var_os("HOME")),
        non_blank_path(env::var_os("APPDATA")),
    )
}

fn non_blank_path(value: Option<OsString>) -> Option<PathBuf> {
    value
        .filter(|value| !value.to_string_lossy().trim().is_empty())
        .map(PathBuf::from)
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, StorageError> {
    xdg_config_home
        .map(|xdg| xdg.join(APP_DIR_NAME))
        .or_else(|| home.map(|home| home.join(".config").join(APP_DIR_NAME)))
        .or_else(|| app_data.map(|app_data| app_data.join(APP_DIR_NAME)))
        .ok_or(StorageError::ConfigDirUnavailable)
}

// ---- keychain ----

fn keyring_entry(service: &str, user: &str) -> Result<keyring::Entry, StorageError> {
    catch_unwind(|| keyring::Entry::new(service, user))
        .map_err(|_| StorageError::KeychainUnavailable("keychain backend panicked".to_string()))?
        .map_err(|error| StorageError::KeychainUnavailable(error.to_string()))
}

/// Runs a keychain call, shielding the caller from backend panics.
fn guarded<T>(
    operation: impl FnOnce() -> keyring::Result<T>,
) -> Result<keyring::Result<T>, StorageError> {
    catch_unwind(AssertUnwindSafe(operation))
        .map_err(|_| StorageError::KeychainUnavailable("keychain backend panicked".to_string()))
}

/// Stores the identity as JSON in the system keychain.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    user: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
    }
}

impl KeyringCredentialStore {
    /// Creates a store for an explicit keychain service and account.
    #[must_use]
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, account: &Account) -> Result<(), StorageError> {
        let payload = serde_json::to_string(account)?;
        let entry = keyring_entry(&self.service, &self.user)?;
        guarded(|| entry.set_password(&payload))?
            .map_err(|error| StorageError::KeychainUnavailable(error.to_string()))?;
        debug!(service = %self.service, "saved identity to keychain");
        Ok(())
    }

    fn load(&self) -> Result<Option<Account>, StorageError> {
        let entry = keyring_entry(&self.service, &self.user)?;
        match guarded(|| entry.get_password())? {
            Ok(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(StorageError::KeychainUnavailable(error.to_string())),
        }
    }

    fn delete(&self) -> Result<bool, StorageError> {
        let entry = keyring_entry(&self.service, &self.user)?;
        match guarded(|| entry.delete_credential())? {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(error) => Err(StorageError::KeychainUnavailable(error.to_string())),
        }
    }
}

// ---- encrypted file ----

#[derive(Debug, Clone)]
enum KeySource {
    EnvOrKeychain,
    Explicit(String),
}

/// Stores the identity encrypted at rest with XChaCha20-Poly1305.
///
/// File layout: 4-byte magic, 24-byte nonce, ciphertext. The file is
/// written with owner-only permissions on unix.
#[derive(Debug, Clone)]
pub struct EncryptedFileCredentialStore {
    path: PathBuf,
    key_source: KeySource,
}

impl EncryptedFileCredentialStore {
    /// Creates a store at `path` keyed by `IPAFETCH_MASTER_KEY` or the keychain.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_source: KeySource::EnvOrKeychain,
        }
    }

    /// Creates a store at `path` keyed by explicit key material.
    #[must_use]
    pub fn with_key(path: impl Into<PathBuf>, key_material: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key_source: KeySource::Explicit(key_material.into()),
        }
    }

    /// Creates a store at the default location (`<config dir>/account.enc`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConfigDirUnavailable`] if no config dir is found.
    pub fn at_default_location() -> Result<Self, StorageError> {
        Ok(Self::new(config_dir()?.join(ACCOUNT_FILE_NAME)))
    }

    /// Path of the encrypted file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_material(&self) -> Result<String, StorageError> {
        match &self.key_source {
            KeySource::Explicit(key) => Ok(key.clone()),
            KeySource::EnvOrKeychain => load_or_create_master_key(),
        }
    }
}

impl CredentialStore for EncryptedFileCredentialStore {
    fn save(&self, account: &Account) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(account)?;
        let sealed = seal(&plaintext, &self.key_material()?)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, sealed)?;
        restrict_to_owner(&self.path)?;
        debug!(path = %self.path.display(), "saved identity to encrypted file");
        Ok(())
    }

    fn load(&self) -> Result<Option<Account>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let sealed = fs::read(&self.path)?;
        let plaintext = open(&sealed, &self.key_material()?)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    fn delete(&self) -> Result<bool, StorageError> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

fn load_or_create_master_key() -> Result<String, StorageError> {
    if let Some(from_env) = env::var_os(MASTER_KEY_ENV) {
        let key = from_env.to_string_lossy().trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let entry = keyring_entry(KEYCHAIN_SERVICE, MASTER_KEY_ENTRY)?;
    match stored_master_key(guarded(|| entry.get_password())?)? {
        Some(existing) => Ok(existing),
        None => {
            let generated = generate_key_material();
            guarded(|| entry.set_password(&generated))?
                .map_err(|error| StorageError::KeychainUnavailable(error.to_string()))?;
            debug!("generated new master key");
            Ok(generated)
        }
    }
}

/// Interprets the keychain read for the master key.
///
/// `None` means no key exists yet and a new one may be written. Any other
/// keychain failure is an error; an existing key is never replaced.
fn stored_master_key(read: keyring::Result<String>) -> Result<Option<String>, StorageError> {
    match read {
        Ok(existing) if !existing.trim().is_empty() => Ok(Some(existing)),
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
        Err(error) => Err(StorageError::KeychainUnavailable(error.to_string())),
    }
}

fn generate_key_material() -> String {
    let mut bytes = [0_u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn cipher_for(key_material: &str) -> XChaCha20Poly1305 {
    let digest = Sha256::digest(key_material.as_bytes());
    XChaCha20Poly1305::new(Key::from_slice(&digest[..KEY_LEN]))
}

fn seal(plaintext: &[u8], key_material: &str) -> Result<Vec<u8>, StorageError> {
    let mut nonce = [0_u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher_for(key_material)
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| StorageError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(MAGIC);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(sealed: &[u8], key_material: &str) -> Result<Vec<u8>, StorageError> {
    let Some(rest) = sealed.strip_prefix(MAGIC.as_slice()) else {
        return Err(StorageError::InvalidPayload);
    };
    if rest.len() < NONCE_LEN {
        return Err(StorageError::InvalidPayload);
    }
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    cipher_for(key_material)
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| StorageError::DecryptionFailed)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

// ---- memory ----

/// Keeps the identity in memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Account>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, account: &Account) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(account.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Account>, StorageError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn delete(&self) -> Result<bool, StorageError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample_account() -> Account {
        Account::new("ada@example.com", "8000001", "token-secret", "143441-1,29")
            .with_cookies(vec!["mz_at0=abc; domain=.apple.com; path=/".to_string()])
    }

    #[test]
    fn test_encrypted_file_round_trip() {
        let tempdir = TempDir::new().unwrap();
        let store = EncryptedFileCredentialStore::with_key(tempdir.path().join("a.enc"), "k1");

        assert!(store.load().unwrap().is_none());
        store.save(&sample_account()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, sample_account());
        assert_eq!(loaded.password_token(), "token-secret");
    }

    #[test]
    fn test_encrypted_file_does_not_contain_plaintext() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("a.enc");
        let store = EncryptedFileCredentialStore::with_key(&path, "k1");
        store.save(&sample_account()).unwrap();

        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(MAGIC));
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("token-secret"));
        assert!(!text.contains("ada@example.com"));
    }

    #[test]
    fn test_encrypted_file_wrong_key_fails() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("a.enc");
        EncryptedFileCredentialStore::with_key(&path, "k1")
            .save(&sample_account())
            .unwrap();

        let result = EncryptedFileCredentialStore::with_key(&path, "k2").load();
        assert!(matches!(result, Err(StorageError::DecryptionFailed)));
    }

    #[test]
    fn test_encrypted_file_invalid_payload() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("a.enc");
        fs::write(&path, b"IPF1short").unwrap();
        let result = EncryptedFileCredentialStore::with_key(&path, "k1").load();
        assert!(matches!(result, Err(StorageError::InvalidPayload)));

        fs::write(&path, b"not-encrypted-data-at-all-not-encrypted").unwrap();
        let result = EncryptedFileCredentialStore::with_key(&path, "k1").load();
        assert!(matches!(result, Err(StorageError::InvalidPayload)));
    }

    #[test]
    fn test_encrypted_file_delete() {
        let tempdir = TempDir::new().unwrap();
        let store = EncryptedFileCredentialStore::with_key(tempdir.path().join("a.enc"), "k1");
        assert!(!store.delete().unwrap());
        store.save(&sample_account()).unwrap();
        assert!(store.delete().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_encrypted_file_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("nested").join("a.enc");
        EncryptedFileCredentialStore::with_key(&path, "k1")
            .save(&sample_account())
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_memory_store_save_load_delete() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&sample_account()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_account()));
        assert!(store.delete().unwrap());
        assert!(!store.delete().unwrap());
    }

    #[test]
    fn test_resolve_config_dir_precedence() {
        let xdg = resolve_config_dir(
            Some(PathBuf::from("/tmp/xdg")),
            Some(PathBuf::from("/tmp/home")),
            None,
        )
        .unwrap();
        assert_eq!(xdg, PathBuf::from("/tmp/xdg/ipafetch"));

        let home = resolve_config_dir(None, Some(PathBuf::from("/tmp/home")), None).unwrap();
        assert_eq!(home, PathBuf::from("/tmp/home/.config/ipafetch"));

        let app_data = resolve_config_dir(None, None, Some(PathBuf::from("/tmp/ad"))).unwrap();
        assert_eq!(app_data, PathBuf::from("/tmp/ad/ipafetch"));

        assert!(matches!(
            resolve_config_dir(None, None, None),
            Err(StorageError::ConfigDirUnavailable)
        ));
    }

    #[test]
    fn test_non_blank_path_rejects_whitespace() {
        assert!(non_blank_path(Some(OsString::from("  "))).is_none());
        assert!(non_blank_path(None).is_none());
        assert_eq!(
            non_blank_path(Some(OsString::from("/x"))),
            Some(PathBuf::from("/x"))
        );
    }

    #[test]
    fn test_generated_key_material_is_hex() {
        let key = generate_key_material();
        assert_eq!(key.len(), KEY_LEN * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_missing_or_blank_master_key_allows_generation() {
        assert!(matches!(stored_master_key(Err(keyring::Error::NoEntry)), Ok(None)));
        assert!(matches!(stored_master_key(Ok("  ".to_string())), Ok(None)));
    }

    #[test]
    fn test_existing_master_key_is_kept() {
        let key = stored_master_key(Ok("abc123".to_string())).unwrap();
        assert_eq!(key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_keychain_failure_is_not_treated_as_missing_key() {
        let locked = stored_master_key(Err(keyring::Error::NoStorageAccess(
            "keychain is locked".into(),
        )));
        assert!(matches!(locked, Err(StorageError::KeychainUnavailable(_))));

        let platform = stored_master_key(Err(keyring::Error::PlatformFailure(
            "backend unavailable".into(),
        )));
        assert!(matches!(platform, Err(StorageError::KeychainUnavailable(_))));
    }
}
