//! Signature Vault - Bootstrap and Entry Point
//!
//! `SignatureVault::bootstrap` is the only place the key is loaded or
//! created. The key is handed to the codec, the codec to the asset
//! manager, and both engines to the orchestrator; nothing is global.

use std::path::Path;

use crate::assets::{Asset, AssetManager, AssetState, Encrypted};
use crate::config::VerifierConfig;
use crate::crypto::{CipherCodec, KeyStore};
use crate::error::VaultResult;
use crate::orchestrator::{Outcome, VerificationOrchestrator, VerificationReport};
use crate::similarity::SimilarityEngine;

/// Signature Vault - Main entry point
pub struct SignatureVault {
    config: VerifierConfig,
    orchestrator: VerificationOrchestrator,
}

impl SignatureVault {
    /// Validate the configuration, load or create the key, wire the components
    ///
    /// A key store failure here is fatal for the caller: no asset operation
    /// can proceed without the key.
    pub fn bootstrap(config: VerifierConfig) -> VaultResult<Self> {
        config.validate()?;

        let key = KeyStore::new(&config.key_path).get_or_create_key()?;
        let codec = CipherCodec::new(key, config.cipher);
        log::info!(
            "Signature vault ready: key {} ({})",
            codec.key_fingerprint(),
            config.cipher.name()
        );

        let engine = SimilarityEngine::from_config(&config)?;
        let orchestrator = VerificationOrchestrator::new(
            AssetManager::new(codec),
            engine,
            config.on_encryption_failure,
        );

        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn key_fingerprint(&self) -> String {
        self.orchestrator.assets().codec().key_fingerprint()
    }

    pub fn assets(&self) -> &AssetManager {
        self.orchestrator.assets()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACQUISITION
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt a newly acquired signature image in place
    pub fn enroll(&self, path: &Path) -> VaultResult<Asset<Encrypted>> {
        self.assets().enroll(path)
    }

    /// Encrypt `source` into a new asset at `dest`
    pub fn enroll_copy(&self, source: &Path, dest: &Path) -> VaultResult<Asset<Encrypted>> {
        self.assets().enroll_copy(source, dest)
    }

    /// Infer whether a file is currently ciphertext under this vault's key
    pub fn status(&self, path: &Path) -> VaultResult<AssetState> {
        self.assets().probe(path)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VERIFICATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Verify two assets against the configured threshold
    pub fn verify(&self, a: &Path, b: &Path) -> Outcome {
        self.orchestrator.verify(a, b, self.config.threshold)
    }

    pub fn verify_with_threshold(&self, a: &Path, b: &Path, threshold: f64) -> Outcome {
        self.orchestrator.verify(a, b, threshold)
    }

    pub fn verify_detailed(&self, a: &Path, b: &Path, threshold: f64) -> VerificationReport {
        self.orchestrator.verify_detailed(a, b, threshold)
    }
}
