//! Signature Vault - Error Types

use std::fmt;

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // KEY STORE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Key store unavailable at {path}: {source}")]
    KeyStore {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Asset is already encrypted under the current key: {0}")]
    AlreadyEncrypted(String),

    // ═══════════════════════════════════════════════════════════════
    // ASSET ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Signature image is missing: {0}")]
    MissingAsset(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`VaultError`], cheap to copy and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    KeyStore,
    Encryption,
    Decryption,
    ImageDecode,
    MissingAsset,
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::KeyStore => "key store error",
            ErrorKind::Encryption => "encryption error",
            ErrorKind::Decryption => "decryption error",
            ErrorKind::ImageDecode => "image decode error",
            ErrorKind::MissingAsset => "missing asset",
            ErrorKind::Config => "configuration error",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(label)
    }
}

impl VaultError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::KeyStore { .. } | VaultError::InvalidKeyLength { .. } => ErrorKind::KeyStore,
            VaultError::EncryptionFailed(_) | VaultError::AlreadyEncrypted(_) => ErrorKind::Encryption,
            VaultError::DecryptionFailed(_) => ErrorKind::Decryption,
            VaultError::ImageDecode(_) => ErrorKind::ImageDecode,
            VaultError::MissingAsset(_) => ErrorKind::MissingAsset,
            VaultError::InvalidConfig(_) | VaultError::Serialization(_) => ErrorKind::Config,
            VaultError::Io(_) => ErrorKind::Io,
        }
    }

    /// Check if this is a security-critical error
    ///
    /// A failed encryption may leave plaintext on disk; a key store failure
    /// strands every asset encrypted under the lost key.
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::EncryptionFailed(_)
                | VaultError::KeyStore { .. }
                | VaultError::InvalidKeyLength { .. }
        )
    }

    /// Key store failures abort the process: no asset operation can run without a key
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::KeyStore
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
