//! Signature Vault - Configuration
//!
//! Loaded once at bootstrap; read-only afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::CipherSuite;
use crate::error::{VaultError, VaultResult};

/// Default match threshold on the 0-100 scale
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Default key file, relative to the working directory
pub const DEFAULT_KEY_FILE: &str = "encryption.key";

/// Default normalization canvas (square)
pub const DEFAULT_CANVAS_SIZE: u32 = 300;

/// Largest canvas the similarity engine will allocate tables for
pub const MAX_CANVAS_SIZE: u32 = 4096;

/// Default SSIM sliding window side length
pub const DEFAULT_WINDOW_SIZE: u32 = 7;

/// What to do when re-encrypting an asset fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionFailurePolicy {
    /// Report the failure as the verification outcome
    #[default]
    Propagate,
    /// Keep the classified score, log the exposed asset
    LogAndContinue,
}

/// Verifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Key file location
    pub key_path: PathBuf,
    /// Minimum score classified as a match
    pub threshold: f64,
    /// Side of the square canvas both images are resized to
    pub canvas_size: u32,
    /// SSIM window side (odd)
    pub window_size: u32,
    /// AEAD suite used for assets
    pub cipher: CipherSuite,
    /// Re-encryption failure handling
    pub on_encryption_failure: EncryptionFailurePolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from(DEFAULT_KEY_FILE),
            threshold: DEFAULT_THRESHOLD,
            canvas_size: DEFAULT_CANVAS_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            cipher: CipherSuite::default(),
            on_encryption_failure: EncryptionFailurePolicy::default(),
        }
    }
}

impl VerifierConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the similarity engine or classifier cannot honor
    pub fn validate(&self) -> VaultResult<()> {
        validate_threshold(self.threshold)?;

        if self.window_size < 3 || self.window_size % 2 == 0 {
            return Err(VaultError::InvalidConfig(format!(
                "window_size must be odd and at least 3, got {}",
                self.window_size
            )));
        }

        if self.canvas_size < self.window_size {
            return Err(VaultError::InvalidConfig(format!(
                "canvas_size {} is smaller than window_size {}",
                self.canvas_size, self.window_size
            )));
        }

        if self.canvas_size > MAX_CANVAS_SIZE {
            return Err(VaultError::InvalidConfig(format!(
                "canvas_size {} exceeds the maximum of {}",
                self.canvas_size, MAX_CANVAS_SIZE
            )));
        }

        Ok(())
    }
}

/// Threshold must be a finite value on the 0-100 scale
pub fn validate_threshold(threshold: f64) -> VaultResult<()> {
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(VaultError::InvalidConfig(format!(
            "threshold must be within 0..=100, got {}",
            threshold
        )));
    }
    Ok(())
}
