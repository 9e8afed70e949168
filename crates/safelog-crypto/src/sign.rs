//! Signature scheme adapters.
//!
//! [`PqSigner`] wraps ML-DSA-44 (FIPS 204) for locally generated identities;
//! [`Ed25519Signer`] covers wallet-style identities whose keys originate
//! outside the system. Both verify with `Ok(false)` for a well-formed but
//! wrong signature and `Err` only for malformed key or signature bytes.

use ed25519_dalek::Verifier;
use fips204::ml_dsa_44;
use fips204::traits::{SerDes, Signer as _, Verifier as _};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::kem::KeyPair;

/// ML-DSA-44 public key length.
pub const MLDSA_PUBLIC_KEY_SIZE: usize = ml_dsa_44::PK_LEN;

/// ML-DSA-44 private key length.
pub const MLDSA_PRIVATE_KEY_SIZE: usize = ml_dsa_44::SK_LEN;

/// ML-DSA-44 signature length.
pub const MLDSA_SIGNATURE_SIZE: usize = ml_dsa_44::SIG_LEN;

/// Ed25519 public key length.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature length.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Detached-signature scheme adapter.
pub trait SignatureScheme {
    /// Sign `message` with `private_key`, returning the detached signature.
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a detached signature.
    ///
    /// `Ok(false)` means the signature is well formed but does not match;
    /// `Err` means the key or signature bytes themselves are malformed.
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, CryptoError>;
}

/// ML-DSA-44 adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PqSigner;

impl PqSigner {
    /// Generate a fresh ML-DSA-44 keypair.
    pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> Result<KeyPair, CryptoError> {
        let (pk, sk) = ml_dsa_44::try_keygen_with_rng(rng)
            .map_err(CryptoError::KeyGenFailed)?;
        Ok(KeyPair { public: pk.into_bytes().to_vec(), private: sk.into_bytes().to_vec() })
    }
}

impl SignatureScheme for PqSigner {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut sk_bytes: [u8; MLDSA_PRIVATE_KEY_SIZE] =
            private_key.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                context: "ML-DSA-44 private key",
                expected: MLDSA_PRIVATE_KEY_SIZE,
                actual: private_key.len(),
            })?;
        let sk = ml_dsa_44::PrivateKey::try_from_bytes(sk_bytes)
            .map_err(|_| CryptoError::Malformed { context: "ML-DSA-44 private key" })?;
        sk_bytes.zeroize();

        let sig = sk.try_sign(message, &[]).map_err(CryptoError::SigningFailed)?;
        Ok(sig.to_vec())
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, CryptoError> {
        let pk_bytes: [u8; MLDSA_PUBLIC_KEY_SIZE] =
            public_key.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                context: "ML-DSA-44 public key",
                expected: MLDSA_PUBLIC_KEY_SIZE,
                actual: public_key.len(),
            })?;
        let pk = ml_dsa_44::PublicKey::try_from_bytes(pk_bytes)
            .map_err(|_| CryptoError::Malformed { context: "ML-DSA-44 public key" })?;

        let sig: [u8; MLDSA_SIGNATURE_SIZE] = match signature.try_into() {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        Ok(pk.verify(message, &sig, &[]))
    }
}

/// Ed25519 adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
        let signing = ed25519_dalek::SigningKey::generate(rng);
        KeyPair {
            public: signing.verifying_key().to_bytes().to_vec(),
            private: signing.to_bytes().to_vec(),
        }
    }
}

impl SignatureScheme for Ed25519Signer {
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut sk_bytes: [u8; 32] =
            private_key.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                context: "Ed25519 private key",
                expected: 32,
                actual: private_key.len(),
            })?;
        let signing = ed25519_dalek::SigningKey::from_bytes(&sk_bytes);
        sk_bytes.zeroize();

        let sig = ed25519_dalek::Signer::sign(&signing, message);
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, CryptoError> {
        let pk_bytes: [u8; ED25519_PUBLIC_KEY_SIZE] =
            public_key.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                context: "Ed25519 public key",
                expected: ED25519_PUBLIC_KEY_SIZE,
                actual: public_key.len(),
            })?;
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&pk_bytes)
            .map_err(|_| CryptoError::Malformed { context: "Ed25519 public key" })?;

        let sig_bytes: [u8; ED25519_SIGNATURE_SIZE] = match signature.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        Ok(verifying.verify(message, &sig).is_ok())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn mldsa_sign_verify_roundtrip() {
        let mut rng = StdRng::seed_from_u64(30);
        let pair = PqSigner::generate_keypair(&mut rng).unwrap();

        let sig = PqSigner.sign(b"release request", &pair.private).unwrap();
        assert_eq!(sig.len(), MLDSA_SIGNATURE_SIZE);
        assert!(PqSigner.verify(b"release request", &sig, &pair.public).unwrap());
    }

    #[test]
    fn mldsa_rejects_modified_message() {
        let mut rng = StdRng::seed_from_u64(31);
        let pair = PqSigner::generate_keypair(&mut rng).unwrap();

        let sig = PqSigner.sign(b"original", &pair.private).unwrap();
        assert!(!PqSigner.verify(b"tampered", &sig, &pair.public).unwrap());
    }

    #[test]
    fn mldsa_wrong_length_signature_is_false_not_error() {
        let mut rng = StdRng::seed_from_u64(32);
        let pair = PqSigner::generate_keypair(&mut rng).unwrap();
        assert!(!PqSigner.verify(b"msg", &[0u8; 10], &pair.public).unwrap());
    }

    #[test]
    fn mldsa_bad_public_key_length_is_error() {
        let result = PqSigner.verify(b"msg", &[0u8; MLDSA_SIGNATURE_SIZE], &[0u8; 99]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial { actual: 99, .. })));
    }

    #[test]
    fn ed25519_sign_verify_roundtrip() {
        let mut rng = StdRng::seed_from_u64(40);
        let pair = Ed25519Signer::generate_keypair(&mut rng);

        let sig = Ed25519Signer.sign(b"approve", &pair.private).unwrap();
        assert_eq!(sig.len(), ED25519_SIGNATURE_SIZE);
        assert!(Ed25519Signer.verify(b"approve", &sig, &pair.public).unwrap());
        assert!(!Ed25519Signer.verify(b"deny", &sig, &pair.public).unwrap());
    }

    #[test]
    fn ed25519_cross_key_verification_fails() {
        let mut rng = StdRng::seed_from_u64(41);
        let alice = Ed25519Signer::generate_keypair(&mut rng);
        let bob = Ed25519Signer::generate_keypair(&mut rng);

        let sig = Ed25519Signer.sign(b"msg", &alice.private).unwrap();
        assert!(!Ed25519Signer.verify(b"msg", &sig, &bob.public).unwrap());
    }
}
