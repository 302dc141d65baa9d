//! Signature Vault - Cryptographic Core
//!
//! Key store plus the AEAD codec applied to signature assets.

pub mod keys;
pub mod aead;

pub use keys::*;
pub use aead::*;
