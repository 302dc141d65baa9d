//! Signature Vault - Key Store
//!
//! A single symmetric key persisted as raw bytes at a well-known path.
//! Losing the file permanently strands every asset encrypted under it,
//! so the store never rotates or regenerates an existing key.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

use crate::error::{VaultError, VaultResult};
use crate::secure_fs;

/// Key length for AES-256 / XChaCha20
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Nonce length for XChaCha20
pub const XCHACHA_NONCE_LEN: usize = 24;

/// Secure key wrapper, zeroized on drop
pub struct VaultKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Build a key from a slice, checking its length
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::new(array))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Short SHA-256 fingerprint, safe to display
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.expose());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Persistent key store
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted key, creating and persisting a fresh one on first run
    ///
    /// An existing key file is read verbatim and never replaced, even when it
    /// is malformed: regenerating would strand every asset encrypted so far.
    pub fn get_or_create_key(&self) -> VaultResult<VaultKey> {
        if self.path.exists() {
            let bytes = secure_fs::read_secret(&self.path).map_err(|source| self.io_error(source))?;
            let key = VaultKey::from_slice(&bytes)?;
            log::debug!("Loaded key {} from {}", key.fingerprint(), self.path.display());
            return Ok(key);
        }

        let key = VaultKey::generate();
        secure_fs::write_atomic(&self.path, key.expose()).map_err(|source| self.io_error(source))?;
        log::info!(
            "Created new key {} at {}; back it up, assets are unrecoverable without it",
            key.fingerprint(),
            self.path.display()
        );
        Ok(key)
    }

    fn io_error(&self, source: std::io::Error) -> VaultError {
        VaultError::KeyStore {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Generate a random nonce for XChaCha20
pub fn generate_xchacha_nonce() -> [u8; XCHACHA_NONCE_LEN] {
    let mut nonce = [0u8; XCHACHA_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_created_once_then_reloaded() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("encryption.key"));

        let created = store.get_or_create_key().unwrap();
        assert!(store.path().exists());
        assert_eq!(std::fs::read(store.path()).unwrap(), created.expose().to_vec());

        let loaded = store.get_or_create_key().unwrap();
        assert_eq!(created.expose(), loaded.expose());
        assert_eq!(created.fingerprint(), loaded.fingerprint());
    }

    #[test]
    fn test_malformed_key_is_not_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encryption.key");
        std::fs::write(&path, b"short").unwrap();

        let store = KeyStore::new(&path);
        let result = store.get_or_create_key();
        assert!(matches!(
            result,
            Err(VaultError::InvalidKeyLength { expected: 32, actual: 5 })
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn test_unreadable_key_path_is_fatal() {
        let dir = tempdir().unwrap();
        // A directory where the key file should be
        let path = dir.path().join("encryption.key");
        std::fs::create_dir(&path).unwrap();

        let err = KeyStore::new(&path).get_or_create_key().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_generated_keys_differ() {
        let k1 = VaultKey::generate();
        let k2 = VaultKey::generate();
        assert_ne!(k1.expose(), k2.expose());
        assert_eq!(k1.fingerprint().len(), 16);
        assert!(!format!("{:?}", k1).contains(&hex::encode(k1.expose())));
    }
}
