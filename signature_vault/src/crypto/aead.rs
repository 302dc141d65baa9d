//! Signature Vault - AEAD Cipher Codec
//!
//! Wire format is `nonce || ciphertext || tag` with no header, so an
//! encrypted asset carries nothing that marks it as such on disk.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::keys::{generate_nonce, generate_xchacha_nonce, VaultKey, NONCE_LEN, XCHACHA_NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Authentication tag length, identical for both suites
pub const TAG_LEN: usize = 16;

/// AEAD suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CipherSuite {
    /// AES-256-GCM (12-byte nonce)
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// XChaCha20-Poly1305 (24-byte nonce)
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
}

impl CipherSuite {
    pub fn nonce_len(&self) -> usize {
        match self {
            Self::Aes256Gcm => NONCE_LEN,
            Self::XChaCha20Poly1305 => XCHACHA_NONCE_LEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::XChaCha20Poly1305 => "XChaCha20-Poly1305",
        }
    }
}

/// Encrypted data with nonce prepended
pub struct EncryptedData {
    /// Nonce (12 or 24 bytes depending on suite)
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Split raw bytes into nonce and ciphertext for the given suite
    pub fn from_bytes(suite: CipherSuite, data: &[u8]) -> VaultResult<Self> {
        let nonce_len = suite.nonce_len();
        if data.len() < nonce_len + TAG_LEN {
            return Err(VaultError::DecryptionFailed("Data too short".into()));
        }

        Ok(Self {
            nonce: data[..nonce_len].to_vec(),
            ciphertext: data[nonce_len..].to_vec(),
        })
    }
}

/// Binds the vault key to an AEAD suite
///
/// Every encryption draws a fresh random nonce, so encrypting the same
/// payload twice yields unrelated ciphertexts.
pub struct CipherCodec {
    key: VaultKey,
    suite: CipherSuite,
}

impl CipherCodec {
    pub fn new(key: VaultKey, suite: CipherSuite) -> Self {
        Self { key, suite }
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn key_fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Encrypt a payload, returning `nonce || ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let sealed = match self.suite {
            CipherSuite::Aes256Gcm => encrypt_aes_gcm(&self.key, plaintext)?,
            CipherSuite::XChaCha20Poly1305 => encrypt_xchacha(&self.key, plaintext)?,
        };
        Ok(sealed.to_bytes())
    }

    /// Decrypt and authenticate `nonce || ciphertext`
    ///
    /// Fails with `DecryptionFailed` on tampered data, data sealed under
    /// another key, and bytes that were never ciphertext at all.
    pub fn decrypt(&self, data: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
        let sealed = EncryptedData::from_bytes(self.suite, data)?;
        let plaintext = match self.suite {
            CipherSuite::Aes256Gcm => decrypt_aes_gcm(&self.key, &sealed)?,
            CipherSuite::XChaCha20Poly1305 => decrypt_xchacha(&self.key, &sealed)?,
        };
        Ok(Zeroizing::new(plaintext))
    }

    /// True when `data` authenticates under the current key
    pub fn is_sealed(&self, data: &[u8]) -> bool {
        self.decrypt(data).is_ok()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AES-256-GCM
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt data with AES-256-GCM
pub fn encrypt_aes_gcm(key: &VaultKey, plaintext: &[u8]) -> VaultResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt data with AES-256-GCM
pub fn decrypt_aes_gcm(key: &VaultKey, encrypted: &EncryptedData) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    if encrypted.nonce.len() != NONCE_LEN {
        return Err(VaultError::DecryptionFailed("Invalid nonce length".into()));
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_slice())
        .map_err(|_| VaultError::DecryptionFailed("Authentication failed".into()))
}

// ═══════════════════════════════════════════════════════════════════════════
// XChaCha20-Poly1305
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt data with XChaCha20-Poly1305
pub fn encrypt_xchacha(key: &VaultKey, plaintext: &[u8]) -> VaultResult<EncryptedData> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_xchacha_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt data with XChaCha20-Poly1305
pub fn decrypt_xchacha(key: &VaultKey, encrypted: &EncryptedData) -> VaultResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    if encrypted.nonce.len() != XCHACHA_NONCE_LEN {
        return Err(VaultError::DecryptionFailed("Invalid nonce length".into()));
    }

    let nonce = XNonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_slice())
        .map_err(|_| VaultError::DecryptionFailed("Authentication failed".into()))
}
