//! # Signature Vault
//!
//! Encrypted-at-rest signature images with structural-similarity matching.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SIGNATURE VAULT                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  KEY STORE  │─▶│ CIPHER CODEC│─▶│ ASSET MANAGER   │  │
//! │  │  (one key)  │  │  AES-GCM /  │  │ typed, atomic   │  │
//! │  │             │  │  XChaCha20  │  │ in-place rewrite│  │
//! │  └─────────────┘  └─────────────┘  └────────┬────────┘  │
//! │                                             │           │
//! │  ┌─────────────────┐   ┌───────────────────┴────────┐  │
//! │  │ SIMILARITY      │──▶│ VERIFICATION ORCHESTRATOR  │  │
//! │  │ ENGINE (SSIM)   │   │ decrypt → compare → re-enc │  │
//! │  └─────────────────┘   └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Signature images are ciphertext on disk outside an active comparison
//! - Authenticated encryption with a fresh nonce per write
//! - Every file rewrite is temp-file + rename
//! - Assets that reached plaintext are re-encrypted on every exit path
//! - Plaintext buffers zeroized after use

pub mod error;
pub mod config;
pub mod crypto;
pub mod secure_fs;
pub mod assets;
pub mod similarity;
pub mod orchestrator;
pub mod vault;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ErrorKind, VaultError, VaultResult};
pub use config::{EncryptionFailurePolicy, VerifierConfig};
pub use crypto::{CipherCodec, CipherSuite, KeyStore, VaultKey};
pub use assets::{Asset, AssetManager, AssetState, Encrypted, Plaintext, TransitionError};
pub use similarity::SimilarityEngine;
pub use orchestrator::{Outcome, VerificationOrchestrator, VerificationPhase, VerificationReport};
pub use vault::SignatureVault;

/// Signature Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
