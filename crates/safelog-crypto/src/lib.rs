//! SafeLog Cryptographic Primitives
//!
//! Building blocks for the hybrid envelope-encryption protocol. Functions
//! that need randomness take the caller's RNG so tests can run with seeded
//! generators.
//!
//! # Key Hierarchy
//!
//! ```text
//! Recipient KEM public key
//!        │
//!        ▼
//! Encapsulate → 32-byte shared secret (one per wrap)
//!        │
//!        ▼
//! AEAD seal → wrapped session key
//!        │
//!        ▼
//! Session key → AEAD seal → message ciphertext
//! ```
//!
//! Two primitive suites implement the same adapter traits:
//!
//! - [`PqKem`] / [`PqSigner`]: ML-KEM-768 + ML-DSA-44, keypairs generated
//!   locally and held in the vault.
//! - [`EciesKem`] / [`Ed25519Signer`]: X25519 ephemeral ECDH + Ed25519,
//!   compatible with externally supplied (wallet) key material.
//!
//! # Security
//!
//! - Shared secrets are used directly as AEAD keys and never surface as
//!   application data.
//! - Malformed key material is rejected with
//!   [`CryptoError::InvalidKeyMaterial`] before any primitive runs; no input
//!   can panic the adapter.
//! - AEAD decryption fails closed: a tag mismatch yields
//!   [`CryptoError::AuthenticationFailed`], never partial plaintext.
//! - Secret material ([`SharedSecret`], derived vault keys) is zeroized on
//!   drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
mod error;
pub mod kdf;
pub mod kem;
pub mod sign;

pub use aead::{NONCE_SIZE, SealedBox, open, seal};
pub use error::CryptoError;
pub use kdf::{SALT_SIZE, VAULT_KDF_ITERATIONS, derive_vault_key, derive_vault_key_with_iterations};
pub use kem::{
    ECIES_PUBLIC_KEY_SIZE, EciesKem, KeyEncapsulation, KeyPair, MLKEM_CIPHERTEXT_SIZE,
    MLKEM_PUBLIC_KEY_SIZE, PqKem, SHARED_SECRET_SIZE, SharedSecret,
};
pub use sign::{
    ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, Ed25519Signer, MLDSA_PUBLIC_KEY_SIZE,
    MLDSA_SIGNATURE_SIZE, PqSigner, SignatureScheme,
};
