//! Error type for primitive adapter and AEAD operations.

use thiserror::Error;

/// Errors from the primitive adapters and the AEAD helper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key bytes have the wrong length or encoding for the primitive.
    ///
    /// Raised before any cryptographic operation is attempted.
    #[error("invalid key material for {context}: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial {
        /// Which key was malformed (e.g. "ML-KEM-768 public key").
        context: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length supplied.
        actual: usize,
    },

    /// AEAD authentication tag did not verify.
    ///
    /// Tampering or a wrong key. Callers must treat this as a hard
    /// decryption failure; no plaintext is ever returned alongside it.
    #[error("authentication failed: ciphertext tag mismatch")]
    AuthenticationFailed,

    /// Input bytes are not valid for the expected encoding (bad hex,
    /// truncated nonce, undersized ciphertext).
    #[error("malformed {context}")]
    Malformed {
        /// What failed to decode.
        context: &'static str,
    },

    /// The signing primitive reported a failure.
    #[error("signing failed: {0}")]
    SigningFailed(&'static str),

    /// Keypair generation failed in the underlying library.
    #[error("key generation failed: {0}")]
    KeyGenFailed(&'static str),
}
