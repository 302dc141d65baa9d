//! Signature Vault - Asset Encryption Manager
//!
//! An asset is a signature image on disk whose bytes are either a
//! decodable image or opaque ciphertext. Nothing on disk says which, so
//! the state travels with the handle instead: `Asset<Plaintext>` and
//! `Asset<Encrypted>` only convert into each other through the manager.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::crypto::CipherCodec;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs;

/// Runtime view of an asset's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Plaintext,
    Encrypted,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetState::Plaintext => f.pad("plaintext"),
            AssetState::Encrypted => f.pad("encrypted"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-level asset state
pub trait StateMarker: sealed::Sealed {
    const STATE: AssetState;
}

/// Marker: file holds image bytes
#[derive(Debug)]
pub enum Plaintext {}

/// Marker: file holds ciphertext under the current key
#[derive(Debug)]
pub enum Encrypted {}

impl sealed::Sealed for Plaintext {}
impl sealed::Sealed for Encrypted {}

impl StateMarker for Plaintext {
    const STATE: AssetState = AssetState::Plaintext;
}

impl StateMarker for Encrypted {
    const STATE: AssetState = AssetState::Encrypted;
}

/// A signature image path tagged with its at-rest state
#[derive(Debug)]
pub struct Asset<S: StateMarker> {
    path: PathBuf,
    _state: PhantomData<S>,
}

impl<S: StateMarker> Asset<S> {
    fn tagged(path: PathBuf) -> Self {
        Self {
            path,
            _state: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> AssetState {
        S::STATE
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl Asset<Plaintext> {
    /// Claim that `path` currently holds image bytes
    pub fn plaintext<P: Into<PathBuf>>(path: P) -> Self {
        Self::tagged(path.into())
    }
}

impl Asset<Encrypted> {
    /// Claim that `path` currently holds ciphertext
    pub fn encrypted<P: Into<PathBuf>>(path: P) -> Self {
        Self::tagged(path.into())
    }
}

/// A rejected state transition; the asset comes back with its state unchanged
pub struct TransitionError<S: StateMarker> {
    pub asset: Asset<S>,
    pub error: VaultError,
}

impl<S: StateMarker> TransitionError<S> {
    pub fn into_parts(self) -> (Asset<S>, VaultError) {
        (self.asset, self.error)
    }
}

impl<S: StateMarker> fmt::Debug for TransitionError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionError")
            .field("path", &self.asset.path)
            .field("state", &S::STATE)
            .field("error", &self.error)
            .finish()
    }
}

impl<S: StateMarker> fmt::Display for TransitionError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} asset {} left unchanged: {}",
            S::STATE,
            self.asset.path.display(),
            self.error
        )
    }
}

impl<S: StateMarker> StdError for TransitionError<S> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

impl<S: StateMarker> From<TransitionError<S>> for VaultError {
    fn from(e: TransitionError<S>) -> Self {
        e.error
    }
}

/// Whole-file replacement used for every asset write
type WriteFn = dyn Fn(&Path, &[u8]) -> io::Result<()> + Send + Sync;

/// Applies the cipher codec to whole asset files in place
pub struct AssetManager {
    codec: CipherCodec,
    write: Box<WriteFn>,
}

impl AssetManager {
    pub fn new(codec: CipherCodec) -> Self {
        Self {
            codec,
            write: Box::new(secure_fs::write_atomic),
        }
    }

    /// Route asset writes through `write` instead of the atomic file writer
    #[cfg(test)]
    pub(crate) fn with_writer<F>(codec: CipherCodec, write: F) -> Self
    where
        F: Fn(&Path, &[u8]) -> io::Result<()> + Send + Sync + 'static,
    {
        Self {
            codec,
            write: Box::new(write),
        }
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TYPED TRANSITIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Plaintext -> Encrypted
    pub fn encrypt_asset(
        &self,
        asset: Asset<Plaintext>,
    ) -> Result<Asset<Encrypted>, TransitionError<Plaintext>> {
        match self.encrypt_path(asset.path()) {
            Ok(()) => Ok(Asset::tagged(asset.into_path())),
            Err(error) => Err(TransitionError { asset, error }),
        }
    }

    /// Encrypted -> Plaintext
    pub fn decrypt_asset(
        &self,
        asset: Asset<Encrypted>,
    ) -> Result<Asset<Plaintext>, TransitionError<Encrypted>> {
        match self.decrypt_path(asset.path()) {
            Ok(()) => Ok(Asset::tagged(asset.into_path())),
            Err(error) => Err(TransitionError { asset, error }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PATH OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt the file at `path` in place
    ///
    /// Refuses with `AlreadyEncrypted` when the bytes already authenticate
    /// under the current key, so a second call cannot double-wrap the asset.
    pub fn encrypt_path(&self, path: &Path) -> VaultResult<()> {
        let plaintext = read_asset(path)?;

        if self.codec.is_sealed(&plaintext) {
            return Err(VaultError::AlreadyEncrypted(path.display().to_string()));
        }

        self.seal_into(&plaintext, path)?;
        log::debug!("Encrypted asset {}", path.display());
        Ok(())
    }

    /// Decrypt the file at `path` in place
    pub fn decrypt_path(&self, path: &Path) -> VaultResult<()> {
        let sealed = read_asset(path)?;

        let plaintext = self.codec.decrypt(&sealed).map_err(|e| match e {
            VaultError::DecryptionFailed(reason) => {
                VaultError::DecryptionFailed(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;

        (self.write)(path, plaintext.as_slice())?;
        log::debug!("Decrypted asset {}", path.display());
        Ok(())
    }

    /// Infer the state of an untagged file without touching it
    pub fn probe(&self, path: &Path) -> VaultResult<AssetState> {
        let data = read_asset(path)?;
        Ok(if self.codec.is_sealed(&data) {
            AssetState::Encrypted
        } else {
            AssetState::Plaintext
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENROLMENT
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt a freshly acquired signature image in place
    pub fn enroll(&self, path: &Path) -> VaultResult<Asset<Encrypted>> {
        let plaintext = read_asset(path)?;
        self.check_enrollable(&plaintext, path)?;
        self.seal_into(&plaintext, path)?;
        log::info!("Enrolled signature {}", path.display());
        Ok(Asset::encrypted(path))
    }

    /// Encrypt `source` into a new asset at `dest`; plaintext never lands at `dest`
    pub fn enroll_copy(&self, source: &Path, dest: &Path) -> VaultResult<Asset<Encrypted>> {
        let plaintext = read_asset(source)?;
        self.check_enrollable(&plaintext, source)?;
        self.seal_into(&plaintext, dest)?;
        log::info!("Enrolled signature {} as {}", source.display(), dest.display());
        Ok(Asset::encrypted(dest))
    }

    fn check_enrollable(&self, data: &[u8], path: &Path) -> VaultResult<()> {
        if self.codec.is_sealed(data) {
            return Err(VaultError::AlreadyEncrypted(path.display().to_string()));
        }
        image::guess_format(data)
            .map_err(|e| VaultError::ImageDecode(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    fn seal_into(&self, plaintext: &[u8], dest: &Path) -> VaultResult<()> {
        let sealed = self.codec.encrypt(plaintext)?;
        (self.write)(dest, sealed.as_slice())
            .map_err(|e| VaultError::EncryptionFailed(format!("{}: {}", dest.display(), e)))
    }
}

fn read_asset(path: &Path) -> VaultResult<zeroize::Zeroizing<Vec<u8>>> {
    secure_fs::read_secret(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::MissingAsset(path.display().to_string()),
        _ => VaultError::Io(e),
    })
}
