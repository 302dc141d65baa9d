//! Signature Vault - Verification Orchestrator
//!
//! Sequences decrypt -> compare -> re-encrypt over two assets:
//!
//! ```text
//! Idle -> Decrypting -> Comparing -> ReEncrypting -> Succeeded
//!            |              |              |
//!            +--------------+--------------+------> Failed
//! ```
//!
//! Whatever happens after the first successful decryption, every asset that
//! reached plaintext is re-encrypted before the outcome is returned.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::assets::{Asset, AssetManager, Plaintext};
use crate::config::{validate_threshold, EncryptionFailurePolicy};
use crate::error::{ErrorKind, VaultError};
use crate::similarity::SimilarityEngine;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPhase {
    Idle,
    Decrypting,
    Comparing,
    ReEncrypting,
    Succeeded,
    Failed,
}

/// Classified verification result
#[derive(Debug)]
pub enum Outcome {
    Match(f64),
    NoMatch(f64),
    Error(VaultError),
}

impl Outcome {
    /// `score >= threshold` is a match
    pub fn classify(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Outcome::Match(score)
        } else {
            Outcome::NoMatch(score)
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Outcome::Match(score) | Outcome::NoMatch(score) => Some(*score),
            Outcome::Error(_) => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Error(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Match(score) => write!(f, "Signatures match ({:.2}% similar)", score),
            Outcome::NoMatch(score) => write!(f, "Signatures do not match ({:.2}% similar)", score),
            Outcome::Error(e) => write!(f, "Verification failed ({}): {}", e.kind(), e),
        }
    }
}

/// Outcome plus what happened on the way there
#[derive(Debug)]
pub struct VerificationReport {
    pub outcome: Outcome,
    /// Every phase entered, in order
    pub trail: Vec<VerificationPhase>,
    /// Assets that could not be re-encrypted and remain plaintext on disk
    pub unrestored: Vec<PathBuf>,
    pub verified_at: DateTime<Utc>,
}

impl VerificationReport {
    /// True when no asset was left in plaintext
    pub fn at_rest(&self) -> bool {
        self.unrestored.is_empty()
    }

    pub fn final_phase(&self) -> VerificationPhase {
        self.trail.last().copied().unwrap_or(VerificationPhase::Idle)
    }
}

struct Run {
    trail: Vec<VerificationPhase>,
    unrestored: Vec<PathBuf>,
}

impl Run {
    fn new() -> Self {
        Self {
            trail: vec![VerificationPhase::Idle],
            unrestored: Vec::new(),
        }
    }

    fn enter(&mut self, phase: VerificationPhase) {
        log::debug!("Verification phase: {:?}", phase);
        self.trail.push(phase);
    }
}

/// Runs verifications against assets encrypted under one key
pub struct VerificationOrchestrator {
    assets: AssetManager,
    engine: SimilarityEngine,
    policy: EncryptionFailurePolicy,
}

impl VerificationOrchestrator {
    pub fn new(assets: AssetManager, engine: SimilarityEngine, policy: EncryptionFailurePolicy) -> Self {
        Self {
            assets,
            engine,
            policy,
        }
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Compare two encrypted signature assets against `threshold`
    pub fn verify(&self, a: &Path, b: &Path, threshold: f64) -> Outcome {
        self.verify_detailed(a, b, threshold).outcome
    }

    /// Like [`verify`](Self::verify), with the phase trail and restoration status
    pub fn verify_detailed(&self, a: &Path, b: &Path, threshold: f64) -> VerificationReport {
        let mut run = Run::new();
        let outcome = self.execute(&mut run, a, b, threshold);

        match &outcome {
            Outcome::Error(e) => {
                log::warn!("Verification of {} / {} failed: {}", a.display(), b.display(), e);
                run.enter(VerificationPhase::Failed);
            }
            _ => {
                log::info!("Verification of {} / {}: {}", a.display(), b.display(), outcome);
                run.enter(VerificationPhase::Succeeded);
            }
        }

        VerificationReport {
            outcome,
            trail: run.trail,
            unrestored: run.unrestored,
            verified_at: Utc::now(),
        }
    }

    fn execute(&self, run: &mut Run, a: &Path, b: &Path, threshold: f64) -> Outcome {
        // Nothing below this point may run before both checks pass: no mutation yet
        if let Err(e) = validate_threshold(threshold) {
            return Outcome::Error(e);
        }
        for path in [a, b] {
            if !path.is_file() {
                return Outcome::Error(VaultError::MissingAsset(path.display().to_string()));
            }
        }
        let same_asset = is_same_file(a, b);

        run.enter(VerificationPhase::Decrypting);
        let first = match self.assets.decrypt_asset(Asset::encrypted(a)) {
            Ok(asset) => asset,
            Err(e) => return Outcome::Error(e.error),
        };
        let second = if same_asset {
            None
        } else {
            match self.assets.decrypt_asset(Asset::encrypted(b)) {
                Ok(asset) => Some(asset),
                Err(e) => {
                    run.enter(VerificationPhase::ReEncrypting);
                    self.restore(run, vec![first]);
                    return Outcome::Error(e.error);
                }
            }
        };

        run.enter(VerificationPhase::Comparing);
        let other = second.as_ref().unwrap_or(&first);
        let compared = self.engine.compare(first.path(), other.path());

        run.enter(VerificationPhase::ReEncrypting);
        let mut plaintext = vec![first];
        plaintext.extend(second);
        let restore_failure = self.restore(run, plaintext);

        let score = match compared {
            Ok(score) => score,
            Err(e) => return Outcome::Error(e),
        };

        settle(score, threshold, restore_failure, self.policy)
    }

    /// Re-encrypt every plaintext asset; returns the first failure
    fn restore(&self, run: &mut Run, assets: Vec<Asset<Plaintext>>) -> Option<VaultError> {
        let mut first_failure = None;

        for asset in assets {
            match self.assets.encrypt_asset(asset) {
                Ok(restored) => log::info!("Re-encrypted {}", restored.path().display()),
                Err(e) => {
                    let (asset, error) = e.into_parts();
                    log::error!(
                        "Asset {} left in plaintext after failed re-encryption: {}",
                        asset.path().display(),
                        error
                    );
                    run.unrestored.push(asset.into_path());
                    first_failure.get_or_insert(error);
                }
            }
        }

        first_failure
    }
}

/// Classify a computed score, letting a re-encryption failure override it under `Propagate`
fn settle(
    score: f64,
    threshold: f64,
    restore_failure: Option<VaultError>,
    policy: EncryptionFailurePolicy,
) -> Outcome {
    match (restore_failure, policy) {
        (Some(e), EncryptionFailurePolicy::Propagate) => Outcome::Error(e),
        _ => Outcome::classify(score, threshold),
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherCodec, CipherSuite, VaultKey};
    use crate::secure_fs;
    use crate::test_support::{blank_image, noise_image, png_bytes, signature_image, write_png};
    use std::io;
    use tempfile::{tempdir, TempDir};

    use super::VerificationPhase::*;

    fn orchestrator() -> VerificationOrchestrator {
        let codec = CipherCodec::new(VaultKey::generate(), CipherSuite::Aes256Gcm);
        VerificationOrchestrator::new(
            AssetManager::new(codec),
            SimilarityEngine::new(300, 7).unwrap(),
            EncryptionFailurePolicy::Propagate,
        )
    }

    fn enrolled(orc: &VerificationOrchestrator, dir: &TempDir, name: &str, img: &image::DynamicImage) -> PathBuf {
        let path = write_png(dir.path(), name, img);
        orc.assets().enroll(&path).unwrap();
        path
    }

    /// Every non-PNG write to `target` fails; everything else hits the disk
    fn reencryption_fails_for(target: PathBuf, policy: EncryptionFailurePolicy) -> VerificationOrchestrator {
        let codec = CipherCodec::new(VaultKey::generate(), CipherSuite::Aes256Gcm);
        let assets = AssetManager::with_writer(codec, move |path, data| {
            if path == target.as_path() && !data.starts_with(b"\x89PNG\r\n\x1a\n") {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only filesystem"));
            }
            secure_fs::write_atomic(path, data)
        });
        VerificationOrchestrator::new(assets, SimilarityEngine::new(300, 7).unwrap(), policy)
    }

    fn sealed_png(orc: &VerificationOrchestrator, path: &Path, img: &image::DynamicImage) -> Vec<u8> {
        let plain = png_bytes(img);
        std::fs::write(path, orc.assets().codec().encrypt(&plain).unwrap()).unwrap();
        plain
    }

    fn assert_encrypted(orc: &VerificationOrchestrator, path: &Path) {
        let data = std::fs::read(path).unwrap();
        assert!(orc.assets().codec().decrypt(&data).is_ok(), "{} is not ciphertext", path.display());
    }

    #[test]
    fn test_identical_signatures_match_at_100() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(1, 400, 160));
        let b = enrolled(&orc, &dir, "sig2.png", &signature_image(1, 400, 160));

        let report = orc.verify_detailed(&a, &b, 80.0);
        assert!(matches!(report.outcome, Outcome::Match(score) if score == 100.0));
        assert_eq!(report.trail, vec![Idle, Decrypting, Comparing, ReEncrypting, Succeeded]);
        assert!(report.at_rest());
        assert_encrypted(&orc, &a);
        assert_encrypted(&orc, &b);
    }

    #[test]
    fn test_unrelated_images_do_not_match() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "blank.png", &blank_image(300, 300));
        let b = enrolled(&orc, &dir, "noise.png", &noise_image(11, 300, 300));

        match orc.verify(&a, &b, 80.0) {
            Outcome::NoMatch(score) => assert!(score < 20.0, "score was {}", score),
            other => panic!("expected NoMatch, got {:?}", other),
        }
        assert_encrypted(&orc, &a);
        assert_encrypted(&orc, &b);
    }

    #[test]
    fn test_missing_asset_mutates_nothing() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(1, 200, 100));
        let before = std::fs::read(&a).unwrap();

        let report = orc.verify_detailed(&a, &dir.path().join("absent.png"), 80.0);
        assert_eq!(report.outcome.error_kind(), Some(ErrorKind::MissingAsset));
        assert_eq!(report.trail, vec![Idle, Failed]);
        assert_eq!(std::fs::read(&a).unwrap(), before);
    }

    #[test]
    fn test_partial_decryption_failure_reencrypts_first() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(1, 200, 100));
        // Never enrolled: still plaintext
        let b = write_png(dir.path(), "sig2.png", &signature_image(2, 200, 100));
        let b_before = std::fs::read(&b).unwrap();

        let report = orc.verify_detailed(&a, &b, 80.0);
        assert_eq!(report.outcome.error_kind(), Some(ErrorKind::Decryption));
        assert_eq!(report.trail, vec![Idle, Decrypting, ReEncrypting, Failed]);
        assert!(report.at_rest());
        assert_encrypted(&orc, &a);
        assert_eq!(std::fs::read(&b).unwrap(), b_before);
    }

    #[test]
    fn test_first_decryption_failure_touches_nothing() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = write_png(dir.path(), "sig1.png", &signature_image(1, 200, 100));
        let b = enrolled(&orc, &dir, "sig2.png", &signature_image(2, 200, 100));
        let b_before = std::fs::read(&b).unwrap();

        let outcome = orc.verify(&a, &b, 80.0);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Decryption));
        assert_eq!(std::fs::read(&b).unwrap(), b_before);
    }

    #[test]
    fn test_decode_failure_still_reencrypts_both() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(1, 200, 100));
        let b = dir.path().join("sig2.png");
        std::fs::write(&b, b"not an image at all").unwrap();
        orc.assets().encrypt_path(&b).unwrap();

        let report = orc.verify_detailed(&a, &b, 80.0);
        assert_eq!(report.outcome.error_kind(), Some(ErrorKind::ImageDecode));
        assert_eq!(report.trail, vec![Idle, Decrypting, Comparing, ReEncrypting, Failed]);
        assert_encrypted(&orc, &a);
        assert_encrypted(&orc, &b);
    }

    #[test]
    fn test_reencryption_failure_is_reported() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("sig1.png");
        let b = dir.path().join("sig2.png");
        let orc = reencryption_fails_for(a.clone(), EncryptionFailurePolicy::Propagate);
        let a_plain = sealed_png(&orc, &a, &signature_image(1, 300, 120));
        sealed_png(&orc, &b, &signature_image(1, 300, 120));

        let report = orc.verify_detailed(&a, &b, 80.0);
        assert_eq!(report.outcome.error_kind(), Some(ErrorKind::Encryption));
        assert_eq!(report.trail, vec![Idle, Decrypting, Comparing, ReEncrypting, Failed]);
        assert_eq!(report.unrestored, vec![a.clone()]);
        assert!(!report.at_rest());
        assert_eq!(std::fs::read(&a).unwrap(), a_plain);
        assert_encrypted(&orc, &b);
    }

    #[test]
    fn test_reencryption_failure_can_keep_score() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("sig1.png");
        let b = dir.path().join("sig2.png");
        let orc = reencryption_fails_for(a.clone(), EncryptionFailurePolicy::LogAndContinue);
        sealed_png(&orc, &a, &signature_image(1, 300, 120));
        sealed_png(&orc, &b, &signature_image(1, 300, 120));

        let report = orc.verify_detailed(&a, &b, 80.0);
        assert!(matches!(report.outcome, Outcome::Match(score) if score == 100.0));
        assert_eq!(report.final_phase(), Succeeded);
        assert_eq!(report.unrestored, vec![a]);
        assert!(!report.at_rest());
        assert_encrypted(&orc, &b);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_asset_stays_linked() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let real = enrolled(&orc, &dir, "real.png", &signature_image(2, 300, 120));
        let b = enrolled(&orc, &dir, "sig2.png", &signature_image(2, 300, 120));
        let link = dir.path().join("link.png");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(orc.verify(&link, &b, 80.0).is_match());
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_encrypted(&orc, &real);
    }

    #[test]
    fn test_same_path_twice_matches_itself() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(5, 240, 120));

        let outcome = orc.verify(&a, &a, 80.0);
        assert!(matches!(outcome, Outcome::Match(score) if score == 100.0));
        assert_encrypted(&orc, &a);
    }

    #[test]
    fn test_invalid_threshold_is_rejected_before_mutation() {
        let dir = tempdir().unwrap();
        let orc = orchestrator();
        let a = enrolled(&orc, &dir, "sig1.png", &signature_image(1, 200, 100));
        let before = std::fs::read(&a).unwrap();

        let outcome = orc.verify(&a, &a, 150.0);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Config));
        assert_eq!(std::fs::read(&a).unwrap(), before);
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(matches!(Outcome::classify(80.0, 80.0), Outcome::Match(_)));
        assert!(matches!(Outcome::classify(79.99, 80.0), Outcome::NoMatch(_)));
        assert!(matches!(Outcome::classify(100.0, 100.0), Outcome::Match(_)));
        assert!(matches!(Outcome::classify(0.0, 0.0), Outcome::Match(_)));
        assert_eq!(Outcome::classify(79.99, 80.0).score(), Some(79.99));
    }

    #[test]
    fn test_encryption_failure_policy() {
        let failure = || Some(VaultError::EncryptionFailed("sig.png: disk full".into()));

        let outcome = settle(91.0, 80.0, failure(), EncryptionFailurePolicy::Propagate);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Encryption));

        let outcome = settle(91.0, 80.0, failure(), EncryptionFailurePolicy::LogAndContinue);
        assert!(matches!(outcome, Outcome::Match(score) if score == 91.0));

        let outcome = settle(42.0, 80.0, None, EncryptionFailurePolicy::Propagate);
        assert!(matches!(outcome, Outcome::NoMatch(_)));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            Outcome::Match(85.0).to_string(),
            "Signatures match (85.00% similar)"
        );
        assert_eq!(
            Outcome::NoMatch(12.346).to_string(),
            "Signatures do not match (12.35% similar)"
        );
        let err = Outcome::Error(VaultError::MissingAsset("sig.png".into()));
        assert!(err.to_string().contains("missing asset"));
    }
}
